//! Followed-comic update watcher

use eyre::{Context, Result};
use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use comicstore::{ComicId, ComicRecord, ComicStore};

use super::config::WatcherConfig;
use crate::booru::{BooruClient, ComicUpdate};
use crate::domain::Priority;

/// Polls every followed comic for new pages
///
/// All API traffic goes through the shared scheduler at
/// [`Priority::Scheduled`], so interactive commands overtake a pass in
/// progress.
pub struct UpdateWatcher {
    booru: BooruClient,
    store: ComicStore,
    config: WatcherConfig,
}

impl UpdateWatcher {
    pub fn new(booru: BooruClient, store: ComicStore, config: WatcherConfig) -> Self {
        Self { booru, store, config }
    }

    pub fn store(&self) -> &ComicStore {
        &self.store
    }

    /// One pass over every followed comic
    ///
    /// A comic that fails is logged and left unchanged so the next pass
    /// retries it; the rest of the pass continues.
    pub async fn check_once(&mut self) -> Result<Vec<ComicUpdate>> {
        debug!("UpdateWatcher::check_once: called");
        self.store.reload().context("Failed to reload comic store")?;

        let comics: Vec<ComicRecord> = self.store.list().into_iter().cloned().collect();
        let mut updates = Vec::new();

        for record in &comics {
            match self.check_comic(record).await {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => {
                    error!(comic_id = record.id, error = %e, "Failed to check comic for updates");
                }
            }
        }

        if !updates.is_empty() {
            let ids: Vec<ComicId> = updates.iter().map(|u| u.comic_id).collect();
            info!(?ids, "Updates found");
        }
        Ok(updates)
    }

    async fn check_comic(&mut self, record: &ComicRecord) -> Result<Option<ComicUpdate>> {
        debug!(comic_id = record.id, "UpdateWatcher::check_comic: called");
        let pool = self.booru.fetch_pool(record.id, Priority::Scheduled).await?;
        let name = pool.display_name();

        // Never synced: record the current pages without announcing them
        if record.updated_at.is_none() {
            debug!(comic_id = record.id, pages = pool.post_ids.len(), "Recording baseline pages");
            self.store.update_comic(record.id, &name, pool.post_ids)?;
            return Ok(None);
        }

        let new_pages = record.new_pages(&pool.post_ids);
        if new_pages.is_empty() {
            debug!(comic_id = record.id, "No new pages");
            return Ok(None);
        }

        let pages = try_join_all(
            new_pages
                .iter()
                .map(|post_id| self.booru.fetch_page_url(*post_id, Priority::Scheduled)),
        )
        .await?;

        self.store.update_comic(record.id, &name, pool.post_ids)?;
        info!(comic_id = record.id, %name, new_pages = pages.len(), "Comic updated");

        Ok(Some(ComicUpdate {
            comic_id: record.id,
            name,
            users: record.users.clone(),
            pages,
        }))
    }

    /// Poll until the receiving side of `updates` is dropped
    ///
    /// A dropped receiver is a normal stop and returns `Ok`, whether it is
    /// noticed while sleeping or while sending.
    ///
    /// Sleeps the poll interval only after a pass that found nothing, so a
    /// burst of uploads is drained without waiting.
    pub async fn run(mut self, updates: mpsc::Sender<ComicUpdate>) -> Result<()> {
        info!(interval_secs = self.config.poll_interval_secs, "UpdateWatcher started");

        loop {
            let found = match self.check_once().await {
                Ok(found) => found,
                Err(e) => {
                    error!(error = %e, "Update pass failed");
                    Vec::new()
                }
            };

            if found.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                    _ = updates.closed() => {
                        info!("Update receiver closed, stopping watcher");
                        return Ok(());
                    }
                }
                continue;
            }

            for update in found {
                if updates.send(update).await.is_err() {
                    info!("Update receiver closed, stopping watcher");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BooruConfig;
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::transport::mock::ScriptedTransport;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    fn watcher(script: Vec<Result<Value, String>>) -> (UpdateWatcher, Arc<ScriptedTransport>, TempDir) {
        let transport = Arc::new(ScriptedTransport::new(script));
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), transport.clone()));
        scheduler.start().unwrap();
        let booru = BooruClient::new(
            BooruConfig {
                base_url: "https://booru.test".to_string(),
                ..Default::default()
            },
            scheduler,
        );

        let dir = tempdir().unwrap();
        let store = ComicStore::open(dir.path()).unwrap();
        (UpdateWatcher::new(booru, store, WatcherConfig::default()), transport, dir)
    }

    fn pool(id: u64, name: &str, post_ids: &[u64]) -> Result<Value, String> {
        Ok(json!({"id": id, "name": name, "post_ids": post_ids, "is_active": true}))
    }

    fn post(id: u64) -> Result<Value, String> {
        Ok(json!({"post": {"id": id, "sample": {"url": format!("https://img.test/{id}.jpg")}}}))
    }

    /// Follow a comic and mark it synced with the given pages
    fn seed(dir: &TempDir, comic_id: u64, user: &str, pages: Vec<u64>) {
        let mut store = ComicStore::open(dir.path()).unwrap();
        store.add_user_to_comic(user, comic_id).unwrap();
        store.update_comic(comic_id, "seeded", pages).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_once_reports_new_pages() {
        let (mut watcher, transport, dir) = watcher(vec![pool(7, "Night_Shift", &[1, 2, 4, 3]), post(3), post(4)]);
        seed(&dir, 7, "alice", vec![1, 2]);

        let updates = watcher.check_once().await.unwrap();
        assert_eq!(
            updates,
            vec![ComicUpdate {
                comic_id: 7,
                name: "Night Shift".to_string(),
                users: vec!["alice".to_string()],
                pages: vec!["https://img.test/3.jpg".to_string(), "https://img.test/4.jpg".to_string()],
            }]
        );
        assert_eq!(
            transport.targets(),
            vec![
                "https://booru.test/pools/7.json",
                "https://booru.test/posts/3.json",
                "https://booru.test/posts/4.json",
            ]
        );

        let record = watcher.store().get(7).unwrap();
        assert_eq!(record.pages, vec![1, 2, 3, 4]);
        assert_eq!(record.name, "Night Shift");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_check_records_baseline_silently() {
        let (mut watcher, transport, dir) = watcher(vec![pool(7, "Night_Shift", &[1, 2, 3])]);
        ComicStore::open(dir.path()).unwrap().add_user_to_comic("alice", 7).unwrap();

        let updates = watcher.check_once().await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(transport.call_count(), 1);
        assert_eq!(watcher.store().get(7).unwrap().pages, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_comic_does_not_abort_pass() {
        // Comic 1 exhausts its three attempts, comic 2 still gets checked
        let (mut watcher, _, dir) = watcher(vec![
            Err("down".into()),
            Err("down".into()),
            Err("down".into()),
            pool(2, "Second", &[5, 6]),
            post(6),
        ]);
        seed(&dir, 1, "alice", vec![1]);
        seed(&dir, 2, "bob", vec![5]);

        let updates = watcher.check_once().await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].comic_id, 2);
        assert_eq!(watcher.store().get(1).unwrap().pages, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_page_fetch_leaves_comic_unchanged() {
        let (mut watcher, _, dir) = watcher(vec![
            pool(7, "Night_Shift", &[1, 2]),
            Ok(json!({"post": {"id": 2}})),
        ]);
        seed(&dir, 7, "alice", vec![1]);

        let updates = watcher.check_once().await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(watcher.store().get(7).unwrap().pages, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_pool_name_marked() {
        let (mut watcher, _, dir) = watcher(vec![
            Ok(json!({"id": 7, "name": "Old_Comic", "post_ids": [1, 2], "is_active": false})),
            post(2),
        ]);
        seed(&dir, 7, "alice", vec![1]);

        let updates = watcher.check_once().await.unwrap();
        assert_eq!(updates[0].name, "(INACTIVE) Old Comic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_updates_and_stops_when_receiver_dropped() {
        let (watcher, _, dir) = watcher(vec![pool(7, "Night_Shift", &[1, 2]), post(2)]);
        seed(&dir, 7, "alice", vec![1]);

        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(watcher.run(tx));

        let update = rx.recv().await.unwrap();
        assert_eq!(update.comic_id, 7);

        // Next pass hits the exhausted script and finds nothing; the watcher
        // then waits on the poll interval until the receiver goes away
        drop(rx);
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_cleanly_when_receiver_dropped_before_send() {
        let (watcher, _, dir) = watcher(vec![pool(7, "Night_Shift", &[1, 2]), post(2)]);
        seed(&dir, 7, "alice", vec![1]);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        // The pass finds an update, then the send notices the closed channel
        let result = watcher.run(tx).await;
        assert!(result.is_ok());
    }
}
