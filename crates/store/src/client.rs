//! HTTP implementation of [`TreeStore`].
//!
//! Thin wrapper over the store's REST API: bearer credential on every call,
//! JSON bodies, non-2xx surfaced as [`StoreError::Api`] with the response
//! body preserved for the caller. No retries; pacing and failure policy
//! live in the engine.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::model::{Block, BlockInsert, BlockPatch, Document, Position};
use crate::{StoreError, TreeStore};

#[derive(Debug, Clone)]
pub struct HttpTreeStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl HttpTreeStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, StoreError> {
        if self.token.trim().is_empty() {
            return Err(StoreError::MissingToken);
        }

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TreeStore for HttpTreeStore {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let response: ItemsResponse<Document> =
            self.request(Method::GET, "/documents", &[], None).await?;
        Ok(response.items)
    }

    async fn get_block(&self, id: &str, max_depth: i32) -> Result<Block, StoreError> {
        self.request(
            Method::GET,
            "/blocks",
            &[("id", id.to_string()), ("maxDepth", max_depth.to_string())],
            None,
        )
        .await
    }

    async fn insert_blocks(
        &self,
        target_id: &str,
        blocks: Vec<BlockInsert>,
        position: Position,
    ) -> Result<Vec<Block>, StoreError> {
        // The API nests the target under `position`; it accepts nested block
        // ids in `pageId`, not just document ids.
        let payload = json!({
            "blocks": blocks,
            "position": {
                "position": position,
                "pageId": target_id,
            },
        });
        let response: ItemsResponse<Block> = self
            .request(Method::POST, "/blocks", &[], Some(payload))
            .await?;
        Ok(response.items)
    }

    async fn update_block(&self, id: &str, patch: BlockPatch) -> Result<(), StoreError> {
        #[derive(serde::Serialize)]
        struct BlockUpdate<'a> {
            id: &'a str,
            #[serde(flatten)]
            patch: &'a BlockPatch,
        }

        let payload = json!({ "blocks": [BlockUpdate { id, patch: &patch }] });
        let _: ItemsResponse<serde_json::Value> = self
            .request(Method::PUT, "/blocks", &[], Some(payload))
            .await?;
        Ok(())
    }

    async fn delete_blocks(&self, ids: &[String]) -> Result<(), StoreError> {
        let payload = json!({ "blockIds": ids });
        let _: ItemsResponse<serde_json::Value> = self
            .request(Method::DELETE, "/blocks", &[], Some(payload))
            .await?;
        Ok(())
    }
}
