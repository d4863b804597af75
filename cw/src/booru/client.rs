//! Typed booru API calls routed through the scheduler

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use comicstore::{ComicId, PageId};

use super::ranking::closest_matches;
use super::types::{Pool, PostEnvelope};
use crate::config::BooruConfig;
use crate::domain::Priority;
use crate::scheduler::{Scheduler, SchedulerError};

/// Errors from booru API calls
#[derive(Debug, Error)]
pub enum BooruError {
    #[error("Request failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Malformed {what} response: {message}")]
    Malformed { what: &'static str, message: String },

    #[error("Post {0} has no image URL")]
    MissingImage(PageId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Booru API client
///
/// Every call is queued on the shared [`Scheduler`], so calls from any
/// number of tasks are paced together. Interactive lookups go out at
/// [`Priority::User`]; background polling passes its own priority.
pub struct BooruClient {
    config: BooruConfig,
    scheduler: Arc<Scheduler>,
}

impl BooruClient {
    pub fn new(config: BooruConfig, scheduler: Arc<Scheduler>) -> Self {
        debug!(base_url = %config.base_url, "BooruClient::new: called");
        Self { config, scheduler }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Pools whose names match `query`, unranked
    pub async fn search(&self, query: &str) -> Result<Vec<Pool>, BooruError> {
        debug!(%query, "BooruClient::search: called");
        let url = self
            .config
            .search_url(query)
            .map_err(|e| BooruError::InvalidRequest(e.to_string()))?;
        let body = self.scheduler.fetch(url, Priority::User).await?;
        let pools: Vec<Pool> = decode("search", body)?;
        info!(%query, results = pools.len(), "Pool search complete");
        Ok(pools)
    }

    /// Search and keep the `top_n` closest names, best first
    pub async fn search_ranked(&self, query: &str, top_n: usize) -> Result<Vec<Pool>, BooruError> {
        let pools = self.search(query).await?;
        Ok(closest_matches(query, &pools, top_n).into_iter().cloned().collect())
    }

    pub async fn fetch_pool(&self, pool_id: ComicId, priority: Priority) -> Result<Pool, BooruError> {
        debug!(%pool_id, %priority, "BooruClient::fetch_pool: called");
        let body = self.scheduler.fetch(self.config.pool_url(pool_id), priority).await?;
        decode("pool", body)
    }

    /// Image URL for one page of a comic
    pub async fn fetch_page_url(&self, post_id: PageId, priority: Priority) -> Result<String, BooruError> {
        debug!(%post_id, %priority, "BooruClient::fetch_page_url: called");
        let body = self.scheduler.fetch(self.config.post_url(post_id), priority).await?;
        let envelope: PostEnvelope = decode("post", body)?;
        envelope
            .post
            .page_url()
            .map(str::to_string)
            .ok_or(BooruError::MissingImage(post_id))
    }
}

fn decode<T: DeserializeOwned>(what: &'static str, body: Value) -> Result<T, BooruError> {
    serde_json::from_value(body).map_err(|e| BooruError::Malformed {
        what,
        message: e.to_string(),
    })
}
