//! Core ComicStore implementation

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::record::{ComicId, ComicRecord, PageId};

type Comics = BTreeMap<ComicId, ComicRecord>;

/// The followed-comics store
///
/// Holds an in-memory copy of the document for reads. Every mutation is a
/// locked read-modify-write: the file is re-read under an exclusive lock,
/// the change is applied to that fresh copy, and the result replaces the
/// file atomically. Concurrent writers therefore never undo each other's
/// follows, unfollows or page updates.
pub struct ComicStore {
    path: PathBuf,
    comics: Comics,
}

impl ComicStore {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;
        let path = dir.join(crate::STORE_FILE);

        if !path.exists() {
            debug!(?path, "ComicStore::open: creating empty store");
            fs::write(&path, "{}").context("Failed to create store file")?;
        }

        let comics = read_comics(&path)?;
        debug!(?path, count = comics.len(), "Opened comic store");
        Ok(Self { path, comics })
    }

    /// Path of the backing JSON file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory copy with the file contents
    pub fn reload(&mut self) -> Result<()> {
        self.comics = read_comics(&self.path)?;
        Ok(())
    }

    pub fn get(&self, comic_id: ComicId) -> Option<&ComicRecord> {
        self.comics.get(&comic_id)
    }

    pub fn contains(&self, comic_id: ComicId) -> bool {
        self.comics.contains_key(&comic_id)
    }

    /// All followed comics, ordered by id
    pub fn list(&self) -> Vec<&ComicRecord> {
        self.comics.values().collect()
    }

    pub fn len(&self) -> usize {
        self.comics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comics.is_empty()
    }

    /// Comics the given user follows
    pub fn comics_for_user(&self, user_id: &str) -> Vec<&ComicRecord> {
        self.comics.values().filter(|c| c.has_user(user_id)).collect()
    }

    /// Follow a comic; returns true if the comic was not tracked before
    pub fn add_user_to_comic(&mut self, user_id: &str, comic_id: ComicId) -> Result<bool> {
        debug!(%user_id, comic_id, "ComicStore::add_user_to_comic: called");
        let is_new = self.modify(|comics| {
            let is_new = !comics.contains_key(&comic_id);
            let record = comics.entry(comic_id).or_insert_with(|| ComicRecord::new(comic_id));
            if !record.has_user(user_id) {
                record.users.push(user_id.to_string());
            }
            Ok(is_new)
        })?;

        info!(%user_id, comic_id, is_new, "User now follows comic");
        Ok(is_new)
    }

    /// Unfollow a comic; the comic is dropped once nobody follows it
    ///
    /// Returns false if the user did not follow the comic.
    pub fn remove_user_from_comic(&mut self, user_id: &str, comic_id: ComicId) -> Result<bool> {
        debug!(%user_id, comic_id, "ComicStore::remove_user_from_comic: called");
        let removed = self.modify(|comics| {
            let Some(record) = comics.get_mut(&comic_id) else {
                debug!(comic_id, "ComicStore::remove_user_from_comic: unknown comic");
                return Ok(false);
            };
            if !record.has_user(user_id) {
                return Ok(false);
            }

            record.users.retain(|u| u != user_id);
            if record.users.is_empty() {
                debug!(comic_id, "ComicStore::remove_user_from_comic: no followers left, dropping");
                comics.remove(&comic_id);
            }
            Ok(true)
        })?;

        if removed {
            info!(%user_id, comic_id, "User unfollowed comic");
        }
        Ok(removed)
    }

    /// Remove a user from every comic; returns how many they followed
    pub fn remove_from_all(&mut self, user_id: &str) -> Result<usize> {
        debug!(%user_id, "ComicStore::remove_from_all: called");
        let count = self.modify(|comics| {
            let mut count = 0;
            comics.retain(|_, record| {
                if record.has_user(user_id) {
                    count += 1;
                    record.users.retain(|u| u != user_id);
                }
                !record.users.is_empty()
            });
            Ok(count)
        })?;

        info!(%user_id, count, "Removed user from all comics");
        Ok(count)
    }

    /// Record the latest name and full page list of a comic
    ///
    /// Fails if the comic is not tracked, including when another writer
    /// dropped it since this store was last read.
    pub fn update_comic(&mut self, comic_id: ComicId, name: &str, mut pages: Vec<PageId>) -> Result<()> {
        debug!(comic_id, %name, pages = pages.len(), "ComicStore::update_comic: called");
        pages.sort_unstable();
        pages.dedup();

        self.modify(|comics| {
            let record = comics
                .get_mut(&comic_id)
                .ok_or_else(|| eyre!("Comic not tracked: {}", comic_id))?;
            record.name = name.to_string();
            record.pages = pages;
            record.updated_at = Some(chrono::Utc::now());
            Ok(())
        })
    }

    /// Apply `change` to the current file contents under an exclusive lock
    ///
    /// On success the new document is written atomically and becomes the
    /// in-memory copy. If `change` fails nothing is written.
    fn modify<R>(&mut self, change: impl FnOnce(&mut Comics) -> Result<R>) -> Result<R> {
        let lock_path = self.path.with_extension("json.lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context("Failed to open store lock file")?;
        lock_file.lock_exclusive().context("Failed to lock store")?;

        let result = self.read_change_write(change);

        FileExt::unlock(&lock_file).context("Failed to unlock store")?;
        result
    }

    fn read_change_write<R>(&mut self, change: impl FnOnce(&mut Comics) -> Result<R>) -> Result<R> {
        let mut comics = if self.path.exists() {
            read_comics(&self.path)?
        } else {
            Comics::new()
        };
        let outcome = change(&mut comics)?;

        let content = serde_json::to_string_pretty(&comics)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).context("Failed to write store temp file")?;
        fs::rename(&tmp_path, &self.path).context("Failed to replace store file")?;

        debug!(count = comics.len(), "ComicStore::modify: written");
        self.comics = comics;
        Ok(outcome)
    }
}

fn read_comics(path: &Path) -> Result<Comics> {
    let content = fs::read_to_string(path).context(format!("Failed to read store: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Comics::new());
    }
    serde_json::from_str(&content).context(format!("Failed to parse store: {}", path.display()))
}
