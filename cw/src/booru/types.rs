//! Booru API payload types

use serde::{Deserialize, Serialize};

use comicstore::{ComicId, PageId};

use super::ranking::display_name;

/// A pool: an ordered set of posts forming one comic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: ComicId,
    pub name: String,
    #[serde(default)]
    pub post_ids: Vec<PageId>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl Pool {
    /// Human-readable name, inactive pools marked
    pub fn display_name(&self) -> String {
        display_name(&self.name, self.is_active)
    }

    /// Selectable label in the form `name (id)`
    pub fn option_label(&self) -> String {
        format!("{} ({})", self.display_name(), self.id)
    }
}

/// Single-post response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct PostEnvelope {
    pub post: Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: PageId,
    #[serde(default)]
    pub sample: MediaRef,
    #[serde(default)]
    pub file: MediaRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRef {
    pub url: Option<String>,
}

impl Post {
    /// Sample image if present, full file otherwise
    pub fn page_url(&self) -> Option<&str> {
        self.sample.url.as_deref().or(self.file.url.as_deref())
    }
}

/// New pages found for one followed comic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComicUpdate {
    pub comic_id: ComicId,
    pub name: String,
    /// Followers to notify
    pub users: Vec<String>,
    /// Image URLs of the new pages, in page order
    pub pages: Vec<String>,
}
