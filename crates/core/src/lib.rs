//! # Stash Core
//!
//! The file registry: keeps a numeric id → filename index consistent with the files that are
//! actually in the upload directory.
//!
//! - [`Registry`] is the facade used by the REST API and the CLI (add, list, get, remove).
//! - [`identity`] holds the two interchangeable identity stores: a relational table with
//!   stable ids, and an in-memory snapshot whose ids are directory enumeration positions.
//! - [`Reconciler`] refreshes the in-memory snapshot when the directory changes underneath it.
//!
//! Directory I/O lives in `stash_files`; this crate never builds paths itself.
//!
//! **No API concerns**: HTTP routing, multipart parsing and JSON envelopes belong in
//! `api-rest` and `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod record;
pub mod registry;

pub use config::{CoreConfig, IdentityBackend};
pub use constants::*;
pub use error::{RegistryError, RegistryResult};
pub use identity::{IdentityStore, SnapshotIdentityStore, SqlIdentityStore};
pub use reconcile::Reconciler;
pub use record::FileRecord;
pub use registry::{Audit, Registry};
pub use stash_types::SafeFilename;
