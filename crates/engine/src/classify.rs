//! Entry classification over a journal root's children.
//!
//! Every decision here is an explicit predicate over the block variant's
//! tag and declared fields, never a probe of whatever optional fields
//! happen to be present.

use capsule_store::{Block, BlockKind, TextStyle};

use crate::codec::INSIGHT_MARKER;

/// A journal entry is any page-like child of the root: a real page block,
/// or a text block styled as a page.
pub fn is_entry_block(block: &Block) -> bool {
    match &block.kind {
        BlockKind::Page { .. } => true,
        BlockKind::Text { text_style, .. } => *text_style == Some(TextStyle::Page),
        _ => false,
    }
}

/// Marker blocks anchor embedded structured data: a text- or page-kind
/// block whose label contains the sentinel phrase (substring match, to
/// tolerate incidental surrounding text) with collapsible list style.
pub fn is_marker(block: &Block, sentinel: &str) -> bool {
    matches!(
        block.kind,
        BlockKind::Text { .. } | BlockKind::Page { .. }
    ) && block.has_toggle_style()
        && block.label().is_some_and(|label| label.contains(sentinel))
}

pub fn is_insight_marker(block: &Block) -> bool {
    is_marker(block, INSIGHT_MARKER)
}

/// An entry is processed once an insight marker exists among its direct
/// children. The data block is not required; a marker alone is enough to
/// keep the entry out of the unprocessed queue.
pub fn is_processed(entry: &Block) -> bool {
    entry.content.iter().any(is_insight_marker)
}

pub fn list_unprocessed(root_children: &[Block]) -> Vec<&Block> {
    root_children
        .iter()
        .filter(|block| is_entry_block(block) && !is_processed(block))
        .collect()
}

/// First entry whose label equals `date` exactly. No fuzzy matching; the
/// caller supplies a canonical local-date string.
pub fn find_by_date<'a>(root_children: &'a [Block], date: &str) -> Option<&'a Block> {
    root_children
        .iter()
        .find(|block| is_entry_block(block) && block.label() == Some(date))
}
