//! Upload directory storage service implementation
//!
//! This module provides [`FilesService`], the only component that touches the upload
//! directory. It performs plain blocking filesystem I/O and never retries: every failure is
//! returned to the caller as a [`FilesError`].
//!
//! # Enumeration
//!
//! [`FilesService::list`] re-reads the directory on every call and returns names in the order
//! the operating system yields them. That order is not sorted and is not guaranteed to be
//! stable across inserts or deletes. Only regular files whose name is already a sanitised base
//! name are reported; anything else (subdirectories, symlinks, names that would sanitise to
//! something different) is skipped.
//!
//! # Change detection
//!
//! [`FilesService::stamp`] returns the directory's own size and modification time. Creating,
//! removing or renaming an entry updates the directory mtime on the filesystems we run on, so
//! comparing two stamps is enough to decide whether an enumeration may be stale.

use crate::FilesError;
use stash_types::SafeFilename;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of the upload directory's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirStamp {
    /// Size reported for the directory inode
    pub len: u64,

    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

/// Service for managing files within the upload directory
///
/// # Design
///
/// - Directory-scoped: each instance is bound to one canonicalised directory
/// - Flat: files live directly under the directory, keyed by their sanitised name
/// - Last write wins: writing an existing name replaces its content
#[derive(Debug)]
pub struct FilesService {
    directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` for an existing directory
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidDirectory` if:
    /// - The directory does not exist or is not a directory
    /// - Path canonicalisation fails
    pub fn new(directory: &Path) -> Result<Self, FilesError> {
        if !directory.exists() {
            return Err(FilesError::InvalidDirectory(format!(
                "Directory does not exist: {}",
                directory.display()
            )));
        }

        if !directory.is_dir() {
            return Err(FilesError::InvalidDirectory(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        let directory = directory.canonicalize().map_err(|e| {
            FilesError::InvalidDirectory(format!(
                "Cannot canonicalize path {}: {}",
                directory.display(),
                e
            ))
        })?;

        Ok(Self { directory })
    }

    /// Opens the upload directory, creating it (and any parents) when it is missing
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidDirectory` if the path exists but is not a directory, and
    /// `FilesError::Io` if the directory cannot be created.
    pub fn open_or_create(directory: &Path) -> Result<Self, FilesError> {
        match fs::metadata(directory) {
            Ok(meta) if !meta.is_dir() => {
                return Err(FilesError::InvalidDirectory(format!(
                    "Path exists but is not a directory: {}",
                    directory.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(directory).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create upload directory {}: {}",
                            directory.display(),
                            e
                        ),
                    ))
                })?;
                tracing::info!("created upload directory {}", directory.display());
            }
            Err(e) => return Err(FilesError::Io(e)),
        }

        Self::new(directory)
    }

    /// Returns the canonicalised upload directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `content` to `<directory>/<filename>`, replacing any existing file
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the file cannot be created or written.
    pub fn write(&self, filename: &SafeFilename, content: &[u8]) -> Result<(), FilesError> {
        let path = self.path_for(filename);
        fs::write(&path, content).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", path.display(), e),
            ))
        })
    }

    /// Removes `<directory>/<filename>`
    ///
    /// # Errors
    ///
    /// Returns `FilesError::NotFound` if no such file exists and `FilesError::Io` for any
    /// other failure.
    pub fn delete(&self, filename: &SafeFilename) -> Result<(), FilesError> {
        let path = self.path_for(filename);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FilesError::NotFound(filename.to_string()))
            }
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove file {}: {}", path.display(), e),
            ))),
        }
    }

    /// Reads the full content of `<directory>/<filename>`
    ///
    /// # Errors
    ///
    /// Returns `FilesError::NotFound` if no such file exists and `FilesError::Io` for any
    /// other failure.
    pub fn read(&self, filename: &SafeFilename) -> Result<Vec<u8>, FilesError> {
        let path = self.path_for(filename);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FilesError::NotFound(filename.to_string())
            } else {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read file from {}: {}", path.display(), e),
                ))
            }
        })
    }

    /// Whether a regular file with this name is present
    ///
    /// Like [`Self::read`], used for checking stored content rather than by the upload path.
    #[must_use]
    pub fn contains(&self, filename: &SafeFilename) -> bool {
        self.path_for(filename).is_file()
    }

    /// Enumerates the regular files in the upload directory, in directory-listing order
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the directory or one of its entries cannot be read.
    pub fn list(&self) -> Result<Vec<SafeFilename>, FilesError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let raw = entry.file_name();
            let Some(raw) = raw.to_str() else {
                tracing::warn!(
                    "skipping non UTF-8 filename in {}: {:?}",
                    self.directory.display(),
                    raw
                );
                continue;
            };

            match SafeFilename::sanitize(raw) {
                Ok(name) if name.as_str() == raw => names.push(name),
                _ => tracing::warn!(
                    "skipping unsafe filename in {}: {}",
                    self.directory.display(),
                    raw
                ),
            }
        }

        Ok(names)
    }

    /// Reads the directory's current size and modification time
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the directory metadata cannot be read.
    pub fn stamp(&self) -> Result<DirStamp, FilesError> {
        let meta = fs::metadata(&self.directory)?;
        Ok(DirStamp {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    fn path_for(&self, filename: &SafeFilename) -> PathBuf {
        self.directory.join(filename.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn name(raw: &str) -> SafeFilename {
        SafeFilename::sanitize(raw).unwrap()
    }

    #[test]
    fn test_files_service_new_success() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();
        assert_eq!(service.directory(), temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_files_service_dir_not_exists() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(&temp.path().join("missing"));
        assert!(matches!(service, Err(FilesError::InvalidDirectory(_))));
    }

    #[test]
    fn test_files_service_dir_not_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        fs::write(&path, "not a directory").unwrap();

        assert!(matches!(
            FilesService::new(&path),
            Err(FilesError::InvalidDirectory(_))
        ));
        assert!(matches!(
            FilesService::open_or_create(&path),
            Err(FilesError::InvalidDirectory(_))
        ));
    }

    #[test]
    fn test_open_or_create_makes_nested_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("uploads");

        let service = FilesService::open_or_create(&path).unwrap();

        assert!(path.is_dir());
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_write_read_and_overwrite() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();
        let cat = name("cat.png");

        service.write(&cat, b"first").unwrap();
        assert_eq!(service.read(&cat).unwrap(), b"first");

        service.write(&cat, b"second").unwrap();
        assert_eq!(service.read(&cat).unwrap(), b"second");
        assert_eq!(service.list().unwrap(), vec![cat]);
    }

    #[test]
    fn test_delete_then_not_found() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();
        let cat = name("cat.png");

        service.write(&cat, b"meow").unwrap();
        assert!(service.contains(&cat));

        service.delete(&cat).unwrap();
        assert!(!service.contains(&cat));

        let err = service.delete(&cat).unwrap_err();
        assert!(err.is_not_found());
        assert!(service.read(&cat).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_skips_directories_and_reflects_changes() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();

        fs::create_dir(temp.path().join("nested")).unwrap();
        service.write(&name("a.png"), b"a").unwrap();
        service.write(&name("b.png"), b"b").unwrap();

        let mut listed: Vec<String> = service
            .list()
            .unwrap()
            .into_iter()
            .map(SafeFilename::into_string)
            .collect();
        listed.sort();
        assert_eq!(listed, vec!["a.png", "b.png"]);

        // Out-of-band write is visible on the next enumeration.
        fs::write(temp.path().join("c.png"), b"c").unwrap();
        assert_eq!(service.list().unwrap().len(), 3);
    }

    #[test]
    fn test_list_is_repeatable_without_changes() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();
        for raw in ["x.png", "y.png", "z.png"] {
            service.write(&name(raw), raw.as_bytes()).unwrap();
        }

        assert_eq!(service.list().unwrap(), service.list().unwrap());
    }

    #[test]
    fn test_stamp_changes_when_entries_change() {
        let temp = TempDir::new().unwrap();
        let service = FilesService::new(temp.path()).unwrap();

        let before = service.stamp().unwrap();
        assert_eq!(before, service.stamp().unwrap());

        // Give coarse-grained mtimes a chance to tick.
        std::thread::sleep(std::time::Duration::from_millis(20));
        service.write(&name("new.png"), b"n").unwrap();
        let after = service.stamp().unwrap();

        assert!(after.modified.is_some());
        assert_ne!(before, after);
    }
}
