//! Stash File Storage
//!
//! This crate owns the upload directory. It writes, deletes, reads and enumerates files and
//! reports a cheap [`DirStamp`] that callers use to notice out-of-band changes.
//!
//! It has no notion of identifiers: mapping ids to filenames is the registry's job.
//!
//! ## Storage Model
//!
//! ```text
//! <upload_dir>/
//! ├── cat.png
//! ├── dog.jpg
//! └── …            # flat, one file per sanitised base name
//! ```
//!
//! Every name that crosses this API is a [`SafeFilename`], so nothing can escape the
//! upload directory. Writing an existing name overwrites it.
//!
//! ## Example Usage
//!
//! ```no_run
//! use stash_files::{FilesService, SafeFilename};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::open_or_create(Path::new("uploads"))?;
//! service.write(&SafeFilename::sanitize("cat.png")?, b"...")?;
//! for name in service.list()? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

mod files;

pub use files::{DirStamp, FilesService};
pub use stash_types::SafeFilename;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Upload directory does not exist or is not a directory
    #[error("Invalid upload directory: {0}")]
    InvalidDirectory(String),

    /// The named file is not present in the upload directory
    #[error("File not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
