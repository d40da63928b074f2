//! Encoding and decoding of insight fragments inside an entry's block tree.
//!
//! An insight fragment is a marker block (sentinel label, collapsible list
//! style) plus a data block carrying the record as JSON. The writer emits
//! the flat layout: marker and data block appended together as children of
//! the entry, so the data block lands as the marker's next sibling. Two
//! historical layouts must decode: the data block as the marker's first
//! child (legacy nested) or as the marker's next sibling (flat).

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use capsule_llm::InsightRecord;
use capsule_store::{Block, BlockInsert, BlockKind, ListStyle, TextStyle};

use crate::classify;

/// Sentinel phrase for per-entry insight markers, matched by substring.
pub const INSIGHT_MARKER: &str = "Memory Capsule Insights";

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```json\n([\s\S]*?)\n```").expect("fence regex compiles"))
}

/// Wraps a JSON payload in the fenced envelope used when structured data is
/// stored inside a text block's markdown.
pub fn wrap_fenced(json: &str) -> String {
    format!("```json\n{json}\n```")
}

/// Extracts the first fenced JSON span, if any.
pub fn strip_fence(text: &str) -> Option<&str> {
    fence_regex()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str())
}

/// The structured payload carried by a data block: the raw code of a code
/// block (stripping a fence if one was pasted in), or the fenced span of a
/// text block. Both historical encodings decode losslessly.
pub fn payload_of(block: &Block) -> Option<String> {
    match &block.kind {
        BlockKind::Code { raw_code, .. } => {
            Some(strip_fence(raw_code).unwrap_or(raw_code).to_string())
        }
        BlockKind::Text {
            markdown: Some(markdown),
            ..
        } => strip_fence(markdown).map(str::to_string),
        _ => None,
    }
}

/// Encodes a record as the two-block fragment appended to an entry:
/// the marker, then a json code block indented under it.
pub fn encode_insight(record: &InsightRecord) -> Result<Vec<BlockInsert>, serde_json::Error> {
    let json = serde_json::to_string_pretty(record)?;
    Ok(vec![
        BlockInsert::text(INSIGHT_MARKER)
            .with_text_style(TextStyle::Body)
            .with_list_style(ListStyle::Toggle),
        BlockInsert::code(json, "json").with_indentation(1),
    ])
}

/// Decodes the first insight fragment found among an entry's children, in
/// document order. Absence (no marker, no data block, or a malformed
/// payload) is a normal state, never an error.
pub fn decode_insight(children: &[Block]) -> Option<InsightRecord> {
    split_entry(children).1
}

/// Partitions an entry's children into user-authored text and the decoded
/// insight record. A data block consumed from the flat sibling layout is
/// excluded from the user text, as are all marker blocks.
pub fn split_entry(children: &[Block]) -> (String, Option<InsightRecord>) {
    let mut user_text = String::new();
    let mut record: Option<InsightRecord> = None;
    let mut skip_next = false;

    for (index, child) in children.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }

        if classify::is_insight_marker(child) {
            if record.is_none() {
                // Legacy nested layout: data block as the marker's first child.
                record = child.content.first().and_then(decode_data_block);

                // Flat layout: data block as the marker's next sibling.
                if record.is_none() {
                    if let Some(sibling) = children.get(index + 1) {
                        if looks_like_data_sibling(sibling) {
                            if let Some(decoded) = decode_data_block(sibling) {
                                record = Some(decoded);
                                skip_next = true;
                            }
                        }
                    }
                }
            }
            continue;
        }

        if let BlockKind::Text {
            markdown: Some(markdown),
            ..
        } = &child.kind
        {
            user_text.push_str(markdown);
            user_text.push_str("\n\n");
        }
    }

    (user_text, record)
}

fn looks_like_data_sibling(block: &Block) -> bool {
    match &block.kind {
        BlockKind::Code { language, .. } => language.as_deref() == Some("json"),
        BlockKind::Text {
            markdown: Some(markdown),
            ..
        } => markdown.contains("```json"),
        _ => false,
    }
}

fn decode_data_block(block: &Block) -> Option<InsightRecord> {
    let payload = payload_of(block)?;
    match serde_json::from_str(&payload) {
        Ok(record) => Some(record),
        Err(err) => {
            debug!(error = %err, "insight payload failed to parse; treating as absent");
            None
        }
    }
}
