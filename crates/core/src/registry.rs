//! Registry facade.
//!
//! [`Registry`] is what the HTTP layer and CLI talk to. Each operation is independent: there
//! are no cross-operation transactions, and the ordering between the storage step and the
//! identity step is fixed so that a partial failure leaves a predictable kind of orphan.
//!
//! | Operation | Order | Partial failure leaves |
//! |---|---|---|
//! | [`Registry::add`] | validate → write file → register identity | file without a record |
//! | [`Registry::remove_by_id`] | lookup → delete file → unregister identity | record intact when the file delete fails |

use crate::config::{CoreConfig, IdentityBackend};
use crate::identity::{IdentityStore, SnapshotIdentityStore, SqlIdentityStore};
use crate::reconcile::Reconciler;
use crate::{FileRecord, RegistryError, RegistryResult};
use stash_files::{FilesError, FilesService};
use stash_types::SafeFilename;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Disagreements between the upload directory and the identity store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Audit {
    /// Files on disk that no record points at.
    pub untracked_files: Vec<SafeFilename>,
    /// Records whose file is no longer on disk.
    pub missing_files: Vec<FileRecord>,
}

impl Audit {
    pub fn is_consistent(&self) -> bool {
        self.untracked_files.is_empty() && self.missing_files.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Registry {
    cfg: Arc<CoreConfig>,
    files: Arc<FilesService>,
    identity: Arc<dyn IdentityStore>,
    snapshot: Option<Arc<SnapshotIdentityStore>>,
}

impl Registry {
    /// Opens the upload directory (creating it if needed) and the configured identity store.
    pub async fn open(cfg: Arc<CoreConfig>) -> RegistryResult<Self> {
        let files = Arc::new(FilesService::open_or_create(cfg.upload_dir())?);

        let registry = match cfg.backend() {
            IdentityBackend::Snapshot => {
                let store = Arc::new(SnapshotIdentityStore::new(files.clone())?);
                Self {
                    cfg: cfg.clone(),
                    files,
                    identity: store.clone(),
                    snapshot: Some(store),
                }
            }
            IdentityBackend::Database => {
                let store =
                    SqlIdentityStore::connect(cfg.database_url(), cfg.query_timeout()).await?;
                Self::with_identity(cfg.clone(), files, Arc::new(store))
            }
        };

        tracing::info!(
            "registry open on {} ({:?} backend)",
            registry.files.directory().display(),
            cfg.backend()
        );
        Ok(registry)
    }

    /// Builds a registry around an already constructed identity store.
    ///
    /// No reconciler is available for stores passed in this way.
    pub fn with_identity(
        cfg: Arc<CoreConfig>,
        files: Arc<FilesService>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            cfg,
            files,
            identity,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn files(&self) -> &FilesService {
        &self.files
    }

    /// Starts the background reconciler for the snapshot backend.
    ///
    /// Returns `None` for the database backend, which has no in-memory index to refresh.
    pub fn spawn_reconciler(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.snapshot.as_ref().map(|store| {
            Reconciler::new(store.clone(), self.cfg.reconcile_interval()).spawn(cancel)
        })
    }

    /// Applies upload validation without touching storage.
    ///
    /// Order: sanitise the name, check the extension, check the size. A file of exactly
    /// `max_file_size` bytes is accepted.
    pub fn validate_upload(&self, raw_filename: &str, size: u64) -> RegistryResult<SafeFilename> {
        let filename = SafeFilename::sanitize(raw_filename)?;

        let extension = filename.extension().unwrap_or_default();
        if !self.cfg.is_allowed_extension(extension) {
            return Err(RegistryError::DisallowedExtension(extension.to_string()));
        }

        let max = self.cfg.max_file_size();
        if size > max {
            return Err(RegistryError::FileTooLarge { size, max });
        }

        Ok(filename)
    }

    /// Stores an upload and records its identity.
    ///
    /// The write runs on the blocking pool. An existing file with the same sanitised name is
    /// overwritten. If the identity step fails after the write, the file stays on disk
    /// unregistered and the error is returned.
    pub async fn add(&self, raw_filename: &str, content: &[u8]) -> RegistryResult<FileRecord> {
        let filename = self.validate_upload(raw_filename, content.len() as u64)?;

        let files = self.files.clone();
        let target = filename.clone();
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || files.write(&target, &content))
            .await
            .map_err(|e| RegistryError::Storage(FilesError::Io(std::io::Error::other(e))))??;

        match self.identity.register(&filename).await {
            Ok(record) => {
                tracing::info!("stored {}", record);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!("{} was written but not registered: {}", filename, e);
                Err(e)
            }
        }
    }

    pub async fn list(&self) -> RegistryResult<Vec<FileRecord>> {
        self.identity.list().await
    }

    pub async fn get_by_id(&self, id: i64) -> RegistryResult<FileRecord> {
        self.identity.lookup(id).await
    }

    /// Deletes the file behind `id`, then forgets the identity.
    ///
    /// A file that is already gone from storage is reported as `NotFound` and the record is
    /// left as it is.
    pub async fn remove_by_id(&self, id: i64) -> RegistryResult<()> {
        let record = self.identity.lookup(id).await?;

        if let Err(e) = self.files.delete(&record.filename) {
            if e.is_not_found() {
                match &self.snapshot {
                    Some(store) => {
                        store.rebuild()?;
                    }
                    None => tracing::warn!("{} has a record but no file on disk", record),
                }
            }
            return Err(e.into());
        }

        self.identity.unregister(&record).await.inspect_err(|e| {
            tracing::warn!("{} was deleted but its record remains: {}", record, e);
        })?;

        tracing::info!("removed {}", record);
        Ok(())
    }

    pub async fn count(&self) -> RegistryResult<u64> {
        self.identity.count().await
    }

    /// Compares the upload directory with the identity store.
    pub async fn audit(&self) -> RegistryResult<Audit> {
        let on_disk = self.files.list()?;
        let records = self.identity.list().await?;

        let recorded: HashSet<&SafeFilename> = records.iter().map(|r| &r.filename).collect();
        let present: HashSet<&SafeFilename> = on_disk.iter().collect();

        Ok(Audit {
            untracked_files: on_disk
                .iter()
                .filter(|name| !recorded.contains(name))
                .cloned()
                .collect(),
            missing_files: records
                .iter()
                .filter(|record| !present.contains(&record.filename))
                .cloned()
                .collect(),
        })
    }

    pub async fn close(&self) {
        self.identity.close().await;
    }
}
