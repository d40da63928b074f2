//! Dataset import: turns `{date, text}` records into journal entry blocks.

use serde::Deserialize;

use capsule_store::{BlockInsert, Position, StoreError, TreeStore};

#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub date: String,
    pub text: String,
}

/// One page-styled block per entry, titled with the date, with each
/// blank-line-separated paragraph as a nested text child.
pub fn build_entry_blocks(entries: &[SeedEntry]) -> Vec<BlockInsert> {
    entries
        .iter()
        .map(|entry| {
            let paragraphs: Vec<BlockInsert> = entry
                .text
                .split("\n\n")
                .map(str::trim)
                .filter(|paragraph| !paragraph.is_empty())
                .map(BlockInsert::text)
                .collect();
            BlockInsert::page(&entry.date).with_content(paragraphs)
        })
        .collect()
}

/// Inserts all entries under the journal root in a single batch call.
/// Returns how many entries were sent.
pub async fn seed_entries<S: TreeStore + ?Sized>(
    store: &S,
    root_id: &str,
    entries: &[SeedEntry],
) -> Result<usize, StoreError> {
    let blocks = build_entry_blocks(entries);
    if blocks.is_empty() {
        return Ok(0);
    }
    let count = blocks.len();
    store.insert_blocks(root_id, blocks, Position::End).await?;
    Ok(count)
}
