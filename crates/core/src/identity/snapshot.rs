//! In-memory identity store rebuilt from directory enumeration.
//!
//! The collection is published through an [`ArcSwap`], so readers always see either the old
//! or the new vector in full, never a half-replaced one. Rebuilds are serialized by a mutex so
//! that an enumeration taken earlier can never be stored over one taken later.

use super::IdentityStore;
use crate::{FileRecord, RegistryError, RegistryResult};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use stash_files::FilesService;
use stash_types::SafeFilename;
use std::sync::Arc;

#[derive(Debug)]
pub struct SnapshotIdentityStore {
    files: Arc<FilesService>,
    snapshot: ArcSwap<Vec<FileRecord>>,
    rebuild_lock: Mutex<()>,
}

impl SnapshotIdentityStore {
    /// Creates the store and performs the initial rebuild.
    pub fn new(files: Arc<FilesService>) -> RegistryResult<Self> {
        let store = Self {
            files,
            snapshot: ArcSwap::from_pointee(Vec::new()),
            rebuild_lock: Mutex::new(()),
        };
        store.rebuild()?;
        Ok(store)
    }

    /// Replaces the whole collection with a fresh enumeration, `id` = enumeration index.
    ///
    /// On failure the previous collection stays published.
    pub fn rebuild(&self) -> RegistryResult<Arc<Vec<FileRecord>>> {
        let _guard = self.rebuild_lock.lock();

        let records: Vec<FileRecord> = self
            .files
            .list()?
            .into_iter()
            .enumerate()
            .map(|(index, filename)| FileRecord::new(index as i64, filename))
            .collect();

        let records = Arc::new(records);
        self.snapshot.store(records.clone());
        tracing::debug!("snapshot rebuilt with {} file(s)", records.len());
        Ok(records)
    }

    /// The currently published collection.
    pub fn snapshot(&self) -> Arc<Vec<FileRecord>> {
        self.snapshot.load_full()
    }

    pub fn files(&self) -> &FilesService {
        &self.files
    }
}

#[async_trait]
impl IdentityStore for SnapshotIdentityStore {
    async fn register(&self, filename: &SafeFilename) -> RegistryResult<FileRecord> {
        self.rebuild()?
            .iter()
            .find(|record| &record.filename == filename)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(filename.to_string()))
    }

    async fn lookup(&self, id: i64) -> RegistryResult<FileRecord> {
        self.snapshot
            .load()
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("file id {id}")))
    }

    async fn list(&self) -> RegistryResult<Vec<FileRecord>> {
        Ok(self.snapshot.load().as_ref().clone())
    }

    async fn unregister(&self, _record: &FileRecord) -> RegistryResult<()> {
        self.rebuild().map(|_| ())
    }

    async fn count(&self) -> RegistryResult<u64> {
        Ok(self.snapshot.load().len() as u64)
    }
}
