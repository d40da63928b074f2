//! Wire model for store blocks.
//!
//! Blocks are internally tagged by a `type` field and carry camelCase
//! member names on the wire. Kind-specific payloads live on the
//! [`BlockKind`] variants so that everything driven by block kind
//! (classification, codecs) matches exhaustively instead of probing
//! optional fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    None,
    Bullet,
    Numbered,
    Todo,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    H1,
    H2,
    H3,
    H4,
    Body,
    Caption,
    Card,
    Page,
}

/// Where inserted blocks land relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Start,
    End,
    Before,
    After,
}

/// Kind-specific block payload, tagged by the wire `type` field.
///
/// The kind set is closed; responses carrying an unknown kind fail to
/// decode rather than being silently coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockKind {
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        markdown: Option<String>,
        #[serde(rename = "textStyle", skip_serializing_if = "Option::is_none")]
        text_style: Option<TextStyle>,
    },
    Code {
        // Some store versions echo the payload under `code` instead.
        #[serde(rename = "rawCode", alias = "code", default)]
        raw_code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Page {
        #[serde(skip_serializing_if = "Option::is_none")]
        markdown: Option<String>,
    },
    /// Horizontal separator.
    Line,
    Url {
        #[serde(default)]
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    Video {
        #[serde(skip_serializing_if = "Option::is_none")]
        video: Option<String>,
    },
    File {
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
}

/// A node in the remote tree, as returned by the store.
///
/// `id` is assigned by the store and absent only on payloads we build
/// ourselves. `content` holds the materialized children, in document order,
/// up to whatever depth the fetch requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(rename = "listStyle", skip_serializing_if = "Option::is_none")]
    pub list_style: Option<ListStyle>,
    #[serde(rename = "indentationLevel", skip_serializing_if = "Option::is_none")]
    pub indentation_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Block>,
}

impl Block {
    /// The primary textual payload: markdown for text and page blocks
    /// (where it doubles as the page title), the title for url blocks.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Text { markdown, .. } | BlockKind::Page { markdown } => markdown.as_deref(),
            BlockKind::Url { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    pub fn has_toggle_style(&self) -> bool {
        self.list_style == Some(ListStyle::Toggle)
    }
}

// ── Insert / update payloads ─────────────────────────────────────────────────

/// Loose payload for block insertion.  The store defaults the kind to text
/// when `markdown` is present, so `kind` stays optional.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockInsert {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(rename = "rawCode", skip_serializing_if = "Option::is_none")]
    pub raw_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "textStyle", skip_serializing_if = "Option::is_none")]
    pub text_style: Option<TextStyle>,
    #[serde(rename = "listStyle", skip_serializing_if = "Option::is_none")]
    pub list_style: Option<ListStyle>,
    #[serde(rename = "indentationLevel", skip_serializing_if = "Option::is_none")]
    pub indentation_level: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<BlockInsert>,
}

impl BlockInsert {
    pub fn text(markdown: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            markdown: Some(markdown.into()),
            ..Self::default()
        }
    }

    pub fn code(raw_code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            kind: Some("code".to_string()),
            raw_code: Some(raw_code.into()),
            language: Some(language.into()),
            ..Self::default()
        }
    }

    /// A page-styled text block, the shape journal entries take as
    /// children of the root document.
    pub fn page(title: impl Into<String>) -> Self {
        Self::text(title).with_text_style(TextStyle::Page)
    }

    pub fn separator() -> Self {
        Self {
            kind: Some("line".to_string()),
            ..Self::default()
        }
    }

    pub fn with_text_style(mut self, style: TextStyle) -> Self {
        self.text_style = Some(style);
        self
    }

    pub fn with_list_style(mut self, style: ListStyle) -> Self {
        self.list_style = Some(style);
        self
    }

    pub fn with_indentation(mut self, level: u32) -> Self {
        self.indentation_level = Some(level);
        self
    }

    pub fn with_content(mut self, children: Vec<BlockInsert>) -> Self {
        self.content = children;
        self
    }
}

/// Partial update for an existing block.  Only the set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(rename = "rawCode", skip_serializing_if = "Option::is_none")]
    pub raw_code: Option<String>,
}

impl BlockPatch {
    pub fn markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            ..Self::default()
        }
    }
}
