//! Test doubles: an in-memory tree store and a scripted analyzer.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use capsule_llm::{Analyzer, AnalyzerError, InsightRecord};
use capsule_store::{
    Block, BlockInsert, BlockKind, BlockPatch, Document, Position, StoreError, TreeStore,
};

// ── In-memory tree store ─────────────────────────────────────────────────────

struct State {
    documents: Vec<Document>,
    trees: Vec<Block>,
    next_id: u64,
}

/// Tree store holding whole documents in memory. Ids are assigned on
/// insert, insertion order is preserved, fetches honor `max_depth`.
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                documents: Vec::new(),
                trees: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Creates a document and returns its id.
    pub fn add_document(&self, title: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("doc-{}", state.next_id);
        state.next_id += 1;
        state.documents.push(Document {
            id: id.clone(),
            title: title.to_string(),
            is_deleted: false,
        });
        state.trees.push(Block {
            id: Some(id.clone()),
            kind: BlockKind::Page {
                markdown: Some(title.to_string()),
            },
            list_style: None,
            indentation_level: None,
            content: Vec::new(),
        });
        id
    }

    /// Direct count of root children matching a predicate, for invariant
    /// assertions that should not go through the store API under test.
    pub fn count_root_children(&self, root_id: &str, predicate: impl Fn(&Block) -> bool) -> usize {
        let state = self.state.lock().unwrap();
        find(&state.trees, root_id)
            .map(|root| root.content.iter().filter(|block| predicate(block)).count())
            .unwrap_or(0)
    }

    fn materialize(state: &mut State, insert: &BlockInsert) -> Block {
        let id = format!("blk-{}", state.next_id);
        state.next_id += 1;
        let kind = match insert.kind.as_deref() {
            Some("code") => BlockKind::Code {
                raw_code: insert.raw_code.clone().unwrap_or_default(),
                language: insert.language.clone(),
            },
            Some("line") => BlockKind::Line,
            _ => BlockKind::Text {
                markdown: insert.markdown.clone(),
                text_style: insert.text_style,
            },
        };
        let content = insert
            .content
            .iter()
            .map(|child| Self::materialize(state, child))
            .collect();
        Block {
            id: Some(id),
            kind,
            list_style: insert.list_style,
            indentation_level: insert.indentation_level,
            content,
        }
    }
}

fn find<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Block> {
    for block in blocks {
        if block.id.as_deref() == Some(id) {
            return Some(block);
        }
        if let Some(found) = find(&block.content, id) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(blocks: &'a mut [Block], id: &str) -> Option<&'a mut Block> {
    for block in blocks {
        if block.id.as_deref() == Some(id) {
            return Some(block);
        }
        if let Some(found) = find_mut(&mut block.content, id) {
            return Some(found);
        }
    }
    None
}

fn prune(block: &mut Block, depth: i32) {
    if depth == 0 {
        block.content.clear();
        return;
    }
    for child in &mut block.content {
        prune(child, if depth < 0 { depth } else { depth - 1 });
    }
}

fn remove_ids(blocks: &mut Vec<Block>, ids: &[String]) {
    blocks.retain(|block| {
        block
            .id
            .as_ref()
            .map(|id| !ids.contains(id))
            .unwrap_or(true)
    });
    for block in blocks {
        remove_ids(&mut block.content, ids);
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::Api {
        status: 404,
        body: format!("block {id} not found"),
    }
}

#[async_trait]
impl TreeStore for InMemoryStore {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.state.lock().unwrap().documents.clone())
    }

    async fn get_block(&self, id: &str, max_depth: i32) -> Result<Block, StoreError> {
        let state = self.state.lock().unwrap();
        let mut block = find(&state.trees, id).cloned().ok_or_else(|| not_found(id))?;
        prune(&mut block, max_depth);
        Ok(block)
    }

    async fn insert_blocks(
        &self,
        target_id: &str,
        blocks: Vec<BlockInsert>,
        position: Position,
    ) -> Result<Vec<Block>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let materialized: Vec<Block> = blocks
            .iter()
            .map(|insert| Self::materialize(&mut state, insert))
            .collect();

        let target = find_mut(&mut state.trees, target_id).ok_or_else(|| not_found(target_id))?;
        match position {
            Position::End => target.content.extend(materialized.clone()),
            Position::Start => {
                let mut combined = materialized.clone();
                combined.extend(target.content.drain(..));
                target.content = combined;
            }
            // Relative positions are unused by the engine; treat them as end.
            Position::Before | Position::After => target.content.extend(materialized.clone()),
        }
        Ok(materialized)
    }

    async fn update_block(&self, id: &str, patch: BlockPatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let block = find_mut(&mut state.trees, id).ok_or_else(|| not_found(id))?;
        if let Some(new_markdown) = patch.markdown {
            match &mut block.kind {
                BlockKind::Text { markdown, .. } | BlockKind::Page { markdown } => {
                    *markdown = Some(new_markdown);
                }
                _ => {}
            }
        }
        if let Some(new_raw) = patch.raw_code {
            if let BlockKind::Code { raw_code, .. } = &mut block.kind {
                *raw_code = new_raw;
            }
        }
        Ok(())
    }

    async fn delete_blocks(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        for tree in &mut state.trees {
            remove_ids(&mut tree.content, ids);
        }
        Ok(())
    }
}

// ── Scripted analyzer ────────────────────────────────────────────────────────

/// Analyzer returning queued results in order. Draining the queue is a test
/// bug and panics.
pub struct ScriptedAnalyzer {
    responses: Mutex<VecDeque<Result<InsightRecord, AnalyzerError>>>,
}

impl ScriptedAnalyzer {
    pub fn new(responses: Vec<Result<InsightRecord, AnalyzerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<InsightRecord, AnalyzerError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted analyzer ran out of responses")
    }
}

pub fn insight(mood: f64, themes: &[&str]) -> InsightRecord {
    InsightRecord {
        summary: format!("summary at mood {mood}"),
        mood,
        stress: 4.0,
        emotion: "steady".to_string(),
        themes: themes.iter().map(|theme| theme.to_string()).collect(),
        gratitude: "small things".to_string(),
        reflection_questions: vec!["q1".to_string(), "q2".to_string(), "q3".to_string()],
        tomorrow_suggestions: vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
        growth_signal: true,
    }
}

/// A journal root with one page entry per `(date, paragraphs)` pair.
/// Returns the store and the root document id.
pub async fn journal_with_entries(entries: &[(&str, &[&str])]) -> (InMemoryStore, String) {
    let store = InMemoryStore::new();
    let root_id = store.add_document("Journals");
    for (date, paragraphs) in entries {
        let children = paragraphs
            .iter()
            .map(|text| BlockInsert::text(*text))
            .collect();
        let entry = BlockInsert::page(*date).with_content(children);
        store
            .insert_blocks(&root_id, vec![entry], Position::End)
            .await
            .unwrap();
    }
    (store, root_id)
}
