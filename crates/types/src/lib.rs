//! Validated value types shared across the Stash crates.

/// Maximum length of a stored filename, matching the `uploads.filename` column width.
pub const MAX_FILENAME_LEN: usize = 255;

/// Errors that can occur when sanitising an uploaded filename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    /// Nothing usable was left after stripping traversal sequences and directories
    #[error("filename cannot be empty")]
    Empty,

    /// The base name resolves to the current or parent directory
    #[error("filename `{0}` is reserved")]
    Reserved(String),

    /// The base name contains a NUL byte
    #[error("filename contains a NUL byte")]
    NulByte,

    /// The base name does not fit the storage column
    #[error("filename is {0} bytes long, maximum is {MAX_FILENAME_LEN}")]
    TooLong(usize),
}

/// An on-disk base name that is safe to join onto the upload directory.
///
/// Construction removes every `../` (and `..\`) sequence from the client supplied name and
/// then keeps only the final path component, so the result never contains a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeFilename(String);

impl SafeFilename {
    /// Sanitises a client supplied filename.
    ///
    /// # Errors
    ///
    /// Returns a [`FilenameError`] if nothing usable remains, the remainder is `.` or `..`,
    /// it contains a NUL byte, or it is longer than [`MAX_FILENAME_LEN`] bytes.
    pub fn sanitize(raw: impl AsRef<str>) -> Result<Self, FilenameError> {
        let stripped = raw.as_ref().replace("../", "").replace("..\\", "");
        let base = stripped
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();

        if base.is_empty() {
            return Err(FilenameError::Empty);
        }
        if base == "." || base == ".." {
            return Err(FilenameError::Reserved(base.to_owned()));
        }
        if base.contains('\0') {
            return Err(FilenameError::NulByte);
        }
        if base.len() > MAX_FILENAME_LEN {
            return Err(FilenameError::TooLong(base.len()));
        }

        Ok(Self(base.to_owned()))
    }

    /// Text after the last `.`, or `None` when the name has no dot.
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SafeFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeFilename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for SafeFilename {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl serde::Serialize for SafeFilename {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SafeFilename {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SafeFilename::sanitize(&s).map_err(serde::de::Error::custom)
    }
}
