//! Celestials identity change feed.
//!
//! The feed is an append-only log of identity changes. Each change carries a
//! strictly increasing `change_id`; `from_change_id` in a request is
//! exclusive, so passing the last applied id returns only newer changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{SourceClient, SourceConfig};
use super::errors::Result;

/// Public Celestials API.
pub const DEFAULT_BASE_URL: &str = "https://api.celestials.id";

const CHANGES_PATH: &str = "/v1/changes";

/// Body of `POST /v1/changes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesRequest {
    pub chain_id: String,
    /// Exclusive lower bound.
    pub from_change_id: i64,
    pub limit: u64,
    /// Only the latest change per celestial.
    pub only_head: bool,
    /// Include avatar URLs.
    pub with_images: bool,
}

/// One page of the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Changes {
    /// Highest change id the feed currently knows about.
    pub head: i64,
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// A single identity change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Change {
    pub celestial_id: String,
    /// Bech32 account address the identity points at.
    pub address: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub change_id: i64,
}

/// Anything that can serve identity changes.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn changes(&self, request: &ChangesRequest) -> Result<Changes>;
}

/// Client for the Celestials change feed.
#[derive(Debug, Clone)]
pub struct CelestialsApi {
    client: SourceClient,
}

impl CelestialsApi {
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self::with_client(SourceClient::new(config)?))
    }

    pub fn with_client(client: SourceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeSource for CelestialsApi {
    async fn changes(&self, request: &ChangesRequest) -> Result<Changes> {
        self.client.post_json(CHANGES_PATH, request).await
    }
}
