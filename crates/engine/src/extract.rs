//! Flattens a block subtree into plain text for analysis.

use capsule_store::{Block, BlockKind};

/// Depth-first concatenation of every text block's markdown, each followed
/// by its recursed children, joined by line breaks in document order.
///
/// Non-text blocks contribute nothing themselves but their children are
/// still visited. Pure function over already-fetched data; an empty
/// subtree yields an empty string.
pub fn extract_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            let own = match &block.kind {
                BlockKind::Text { markdown, .. } => markdown.clone().unwrap_or_default(),
                _ => String::new(),
            };
            let children = extract_text(&block.content);
            format!("{own}\n{children}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
