//! Background reconciliation for the snapshot identity store.
//!
//! The loop polls the upload directory's [`DirStamp`] on a fixed interval and rebuilds the
//! snapshot whenever the stamp changes. A missed change (two writes inside one mtime tick)
//! is picked up by the next change or by the facade's own rebuilds; a spurious change only
//! costs one extra enumeration.

use crate::identity::SnapshotIdentityStore;
use stash_files::DirStamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct Reconciler {
    store: Arc<SnapshotIdentityStore>,
    interval: Duration,
    last_seen: Option<DirStamp>,
}

impl Reconciler {
    pub fn new(store: Arc<SnapshotIdentityStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last_seen: None,
        }
    }

    /// Runs [`Self::run`] on the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Polls until `cancel` fires. Returns within one interval of cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("reconciler started (interval {:?})", self.interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick();
        }
        tracing::info!("reconciler stopped");
    }

    /// Performs one poll. Returns `true` when a rebuild happened.
    pub fn tick(&mut self) -> bool {
        let stamp = match self.store.files().stamp() {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!("reconciler could not stat upload directory: {}", e);
                return false;
            }
        };

        if self.last_seen == Some(stamp) {
            return false;
        }

        match self.store.rebuild() {
            Ok(records) => {
                tracing::debug!(
                    "upload directory changed, reindexed {} file(s)",
                    records.len()
                );
                self.last_seen = Some(stamp);
                true
            }
            Err(e) => {
                // last_seen stays put so the next tick retries.
                tracing::warn!("reconciler rebuild failed: {}", e);
                false
            }
        }
    }
}
