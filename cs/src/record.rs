//! Followed comic record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upstream pool identifier
pub type ComicId = u64;

/// Upstream post identifier (one page of a comic)
pub type PageId = u64;

/// One followed comic and who follows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicRecord {
    pub id: ComicId,
    #[serde(default)]
    pub name: String,
    /// Known page post ids, sorted
    #[serde(default)]
    pub pages: Vec<PageId>,
    /// Follower ids
    #[serde(default)]
    pub users: Vec<String>,
    /// Last time name or pages changed
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ComicRecord {
    pub fn new(id: ComicId) -> Self {
        Self {
            id,
            name: String::new(),
            pages: Vec::new(),
            users: Vec::new(),
            updated_at: None,
        }
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    /// Pages present upstream but not yet known, ascending
    pub fn new_pages(&self, upstream: &[PageId]) -> Vec<PageId> {
        let known: BTreeSet<PageId> = self.pages.iter().copied().collect();
        upstream
            .iter()
            .copied()
            .filter(|p| !known.contains(p))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
