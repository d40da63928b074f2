//! Per-entry processing and sequential batch runs.
//!
//! The pipeline for one entry: fetch → flatten to text → analyze → append
//! the insight fragment → fold into the aggregate. The fragment write is
//! the durable success condition; the aggregate merge is best-effort and
//! its failure never fails the entry.
//!
//! Batch runs are strictly sequential, with a fixed pacing delay after each
//! successful entry. The aggregate merge is a non-transactional
//! read-modify-write, so the run must never be parallelized without adding
//! a locking discipline around [`AggregateStore::merge`].

use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use capsule_llm::{Analyzer, InsightRecord};
use capsule_store::{Block, Document, Position, TreeStore};

use crate::aggregate::AggregateStore;
use crate::classify;
use crate::codec;
use crate::extract;
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Title of the document holding the journal entries.
    pub root_title: String,
    /// Fetch depth for an entry subtree before extraction.
    pub entry_fetch_depth: i32,
    /// Pause after each successfully processed entry in a batch.
    pub pace: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            root_title: "Journals".to_string(),
            entry_fetch_depth: 5,
            pace: Duration::from_millis(500),
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
}

/// One root child as the CLI presents it: entry id, title, processing
/// state, and the mood score when an insight is already attached.
#[derive(Debug, Clone)]
pub struct EntryStatus {
    pub id: String,
    pub title: String,
    pub processed: bool,
    pub mood: Option<f64>,
}

pub struct Processor<S, A> {
    store: S,
    analyzer: A,
    options: ProcessorOptions,
}

impl<S: TreeStore, A: Analyzer> Processor<S, A> {
    pub fn new(store: S, analyzer: A, options: ProcessorOptions) -> Self {
        Self {
            store,
            analyzer,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The journal root: first non-deleted document with the configured
    /// title. Its absence requires user action, so it is a distinct error.
    pub async fn find_journal_root(&self) -> EngineResult<Document> {
        let documents = self.store.list_documents().await?;
        documents
            .into_iter()
            .find(|doc| doc.title == self.options.root_title && !doc.is_deleted)
            .ok_or_else(|| EngineError::RootNotFound(self.options.root_title.clone()))
    }

    /// Today's canonical local-date string, the format entry titles use.
    pub fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    /// Today's entry, if one exists under the journal root.
    pub async fn find_today_entry(&self) -> EngineResult<Option<Block>> {
        let root = self.find_journal_root().await?;
        let root_block = self.store.get_block(&root.id, 2).await?;
        Ok(classify::find_by_date(&root_block.content, &Self::today()).cloned())
    }

    /// Snapshot of the unprocessed entries under the journal root.
    pub async fn list_unprocessed(&self, root_id: &str) -> EngineResult<Vec<Block>> {
        let root_block = self.store.get_block(root_id, 2).await?;
        Ok(classify::list_unprocessed(&root_block.content)
            .into_iter()
            .cloned()
            .collect())
    }

    /// All entries under the root with their processing state and a mood
    /// peek decoded from any attached insight fragment.
    pub async fn list_entries(&self, root_id: &str) -> EngineResult<Vec<EntryStatus>> {
        // Depth 3 so a legacy nested data block (root → entry → marker →
        // data) is visible for the mood peek.
        let root_block = self.store.get_block(root_id, 3).await?;
        Ok(root_block
            .content
            .iter()
            .filter(|block| classify::is_entry_block(block))
            .map(|entry| EntryStatus {
                id: entry.id.clone().unwrap_or_default(),
                title: entry.label().unwrap_or("Untitled").to_string(),
                processed: classify::is_processed(entry),
                mood: codec::decode_insight(&entry.content).map(|record| record.mood),
            })
            .collect())
    }

    /// Processes one entry: extract, analyze, embed the insight fragment,
    /// then fold the result into the aggregate.
    ///
    /// Analyzer and fragment-write failures propagate; an aggregate failure
    /// is logged and swallowed so a dashboard hiccup never loses an
    /// already-written insight.
    pub async fn process_entry(
        &self,
        entry_id: &str,
        root_hint: Option<&str>,
    ) -> EngineResult<InsightRecord> {
        let entry = self
            .store
            .get_block(entry_id, self.options.entry_fetch_depth)
            .await?;
        let text = extract::extract_text(&entry.content);

        let insight = self.analyzer.analyze(&text).await?;

        let fragment = codec::encode_insight(&insight)?;
        self.store
            .insert_blocks(entry_id, fragment, Position::End)
            .await?;

        let entry_date = entry
            .label()
            .map(str::to_string)
            .unwrap_or_else(Self::today);
        if let Err(err) = self.update_aggregate(root_hint, &insight, &entry_date).await {
            warn!(
                entry = entry_id,
                error = %err,
                "aggregate update failed; insight fragment already written"
            );
        }

        Ok(insight)
    }

    async fn update_aggregate(
        &self,
        root_hint: Option<&str>,
        insight: &InsightRecord,
        entry_date: &str,
    ) -> EngineResult<()> {
        let root_id = match root_hint {
            Some(id) => id.to_string(),
            None => self.find_journal_root().await?.id,
        };
        AggregateStore::new(&self.store, &root_id)
            .merge(insight, entry_date)
            .await?;
        Ok(())
    }

    /// Sequential batch over a snapshotted candidate list. One entry's
    /// failure is recorded and the run continues; a fixed pacing delay
    /// follows each success to respect upstream rate limits.
    pub async fn process_all(&self, candidates: &[Block], root_hint: Option<&str>) -> BatchReport {
        let snapshot: Vec<(String, String)> = candidates
            .iter()
            .filter_map(|block| {
                let id = block.id.clone()?;
                Some((id, block.label().unwrap_or("Untitled").to_string()))
            })
            .collect();

        let total = snapshot.len();
        let mut report = BatchReport {
            attempted: 0,
            succeeded: 0,
        };

        for (id, title) in snapshot {
            report.attempted += 1;
            info!(entry = %title, number = report.attempted, total, "processing entry");

            match self.process_entry(&id, root_hint).await {
                Ok(_) => {
                    report.succeeded += 1;
                    tokio::time::sleep(self.options.pace).await;
                }
                Err(err) => {
                    warn!(entry = %id, error = %err, "entry failed; continuing with next");
                }
            }
        }

        report
    }
}
