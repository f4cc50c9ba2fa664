//! Identity stores: the authoritative id → filename mapping.
//!
//! Two interchangeable implementations sit behind [`IdentityStore`]:
//!
//! - [`SqlIdentityStore`] keeps one row per upload in a relational table. Ids come from the
//!   table's auto-increment key and stay fixed until the row is deleted.
//! - [`SnapshotIdentityStore`] keeps an in-memory vector rebuilt from the upload directory.
//!   Ids are enumeration positions and are renumbered by every rebuild.
//!
//! The registry facade only talks to the trait; the snapshot store is additionally handed to
//! the [`crate::Reconciler`] so out-of-band directory changes are picked up.

mod database;
mod snapshot;

pub use database::SqlIdentityStore;
pub use snapshot::SnapshotIdentityStore;

use crate::{FileRecord, RegistryResult};
use async_trait::async_trait;
use stash_types::SafeFilename;

#[async_trait]
pub trait IdentityStore: Send + Sync + std::fmt::Debug {
    /// Records a file that has just been written to storage and returns its identity.
    async fn register(&self, filename: &SafeFilename) -> RegistryResult<FileRecord>;

    /// Resolves an id, returning `RegistryError::NotFound` when it is unknown or stale.
    async fn lookup(&self, id: i64) -> RegistryResult<FileRecord>;

    async fn list(&self) -> RegistryResult<Vec<FileRecord>>;

    /// Forgets a record whose file has already been removed from storage.
    async fn unregister(&self, record: &FileRecord) -> RegistryResult<()>;

    async fn count(&self) -> RegistryResult<u64>;

    /// Releases backing resources. Called once during shutdown.
    async fn close(&self) {}
}
