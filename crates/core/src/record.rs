//! The registry's unit of identity.

use stash_types::SafeFilename;

/// One stored file as seen by the identity store.
///
/// Records are produced fresh for every registry call and never mutated. Whether `id`
/// survives other operations depends on the backend: database ids are stable for the file's
/// lifetime, snapshot ids are positions in the latest directory enumeration and shift
/// whenever the directory changes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: SafeFilename,
}

impl FileRecord {
    pub fn new(id: i64, filename: SafeFilename) -> Self {
        Self { id, filename }
    }
}

/// Renders as `filename [id]`, the listing format used by `GET /files`.
impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.filename, self.id)
    }
}
