//! Client for the remote hierarchical document store.
//!
//! The store is a tree of typed blocks behind a REST API: documents at the
//! top, nested blocks below, insertion order preserved. This crate owns the
//! wire model ([`Block`] and friends) and the [`TreeStore`] seam the engine
//! is written against; [`HttpTreeStore`] is the production implementation.

pub mod client;
pub mod model;

pub use client::HttpTreeStore;
pub use model::{Block, BlockInsert, BlockKind, BlockPatch, Document, ListStyle, Position, TextStyle};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Non-2xx response from the store, with whatever body text it sent.
    #[error("store API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// No bearer token configured.  Surfaced before any request is made so
    /// the caller can direct the user to settings rather than retrying.
    #[error("no store token configured")]
    MissingToken,
}

/// The tree-store operations the engine depends on.
///
/// All calls are suspension points; nothing in this workspace runs them
/// concurrently against the same journal root.
#[async_trait]
pub trait TreeStore: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Fetch a block with its children materialized to `max_depth` levels.
    /// `-1` fetches the full subtree.
    async fn get_block(&self, id: &str, max_depth: i32) -> Result<Block, StoreError>;

    async fn insert_blocks(
        &self,
        target_id: &str,
        blocks: Vec<BlockInsert>,
        position: Position,
    ) -> Result<Vec<Block>, StoreError>;

    async fn update_block(&self, id: &str, patch: BlockPatch) -> Result<(), StoreError>;

    async fn delete_blocks(&self, ids: &[String]) -> Result<(), StoreError>;
}
