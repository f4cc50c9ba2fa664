//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the registry. Request handlers never read environment variables; the binaries
//! call [`CoreConfig::from_env`] (or build a `CoreConfig` by hand) before serving anything.

use crate::constants::{
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_DATABASE_URL, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_QUERY_TIMEOUT, DEFAULT_RECONCILE_INTERVAL, DEFAULT_UPLOAD_DIR,
};
use crate::{RegistryError, RegistryResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which identity store backs the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityBackend {
    /// In-memory index rebuilt from the upload directory; ids follow enumeration order.
    Snapshot,
    /// Relational `uploads` table; ids are assigned once and never reused.
    Database,
}

impl FromStr for IdentityBackend {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" | "memory" => Ok(Self::Snapshot),
            "database" | "db" | "sqlite" => Ok(Self::Database),
            other => Err(RegistryError::InvalidInput(format!(
                "unknown identity backend `{other}` (expected `snapshot` or `database`)"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    max_file_size: u64,
    allowed_extensions: Vec<String>,
    backend: IdentityBackend,
    database_url: String,
    query_timeout: Duration,
    reconcile_interval: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default database URL and timings.
    pub fn new(
        upload_dir: PathBuf,
        max_file_size: u64,
        allowed_extensions: Vec<String>,
        backend: IdentityBackend,
    ) -> RegistryResult<Self> {
        let allowed_extensions: Vec<String> = allowed_extensions
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if allowed_extensions.is_empty() {
            return Err(RegistryError::InvalidInput(
                "at least one allowed extension is required".into(),
            ));
        }
        if upload_dir.as_os_str().is_empty() {
            return Err(RegistryError::InvalidInput(
                "upload_dir cannot be empty".into(),
            ));
        }

        Ok(Self {
            upload_dir,
            max_file_size,
            allowed_extensions,
            backend,
            database_url: DEFAULT_DATABASE_URL.into(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        })
    }

    /// Resolve the configuration from `STASH_*` environment variables.
    ///
    /// Intended to be called once from `main`; unset variables fall back to the defaults in
    /// [`crate::constants`].
    pub fn from_env() -> RegistryResult<Self> {
        let var = |name: &str| std::env::var(name).ok();

        let upload_dir = var("STASH_UPLOAD_DIR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into());

        let cfg = Self::new(
            PathBuf::from(upload_dir),
            max_file_size_from_env_value(var("STASH_MAX_FILE_SIZE"))?,
            allowed_extensions_from_env_value(var("STASH_ALLOWED_EXTENSIONS")),
            backend_from_env_value(var("STASH_BACKEND"))?,
        )?
        .with_query_timeout(duration_from_env_value(
            var("STASH_QUERY_TIMEOUT_SECS"),
            Duration::from_secs,
            DEFAULT_QUERY_TIMEOUT,
        )?)
        .with_reconcile_interval(duration_from_env_value(
            var("STASH_RECONCILE_INTERVAL_MS"),
            Duration::from_millis,
            DEFAULT_RECONCILE_INTERVAL,
        )?);

        Ok(match var("STASH_DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => cfg.with_database_url(url),
            None => cfg,
        })
    }

    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_reconcile_interval(mut self, reconcile_interval: Duration) -> Self {
        self.reconcile_interval = reconcile_interval;
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Case-insensitive membership test against the allowed extension set.
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    pub fn backend(&self) -> IdentityBackend {
        self.backend
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn reconcile_interval(&self) -> Duration {
        self.reconcile_interval
    }
}

/// Parse the identity backend from an optional string value.
///
/// If `value` is `None` or empty/whitespace, the in-memory snapshot backend is used.
pub fn backend_from_env_value(value: Option<String>) -> RegistryResult<IdentityBackend> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<IdentityBackend>())
        .transpose()
        .map(|backend| backend.unwrap_or(IdentityBackend::Snapshot))
}

/// Parse the maximum upload size in bytes from an optional string value.
pub fn max_file_size_from_env_value(value: Option<String>) -> RegistryResult<u64> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_MAX_FILE_SIZE);
    };

    value.parse::<u64>().map_err(|e| {
        RegistryError::InvalidInput(format!("STASH_MAX_FILE_SIZE `{value}` is invalid: {e}"))
    })
}

/// Split a comma-separated extension list, falling back to the defaults when unset.
pub fn allowed_extensions_from_env_value(value: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(|ext| ext.trim().to_string())
        .filter(|ext| !ext.is_empty())
        .collect();

    if parsed.is_empty() {
        DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| (*ext).to_string())
            .collect()
    } else {
        parsed
    }
}

fn duration_from_env_value(
    value: Option<String>,
    unit: fn(u64) -> Duration,
    default: Duration,
) -> RegistryResult<Duration> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match value.parse::<u64>() {
        Ok(0) => Err(RegistryError::InvalidInput(
            "durations must be greater than zero".into(),
        )),
        Ok(n) => Ok(unit(n)),
        Err(e) => Err(RegistryError::InvalidInput(format!(
            "duration `{value}` is invalid: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalises_extensions() {
        let cfg = CoreConfig::new(
            PathBuf::from("uploads"),
            10,
            vec![" .PNG".into(), "jpg".into(), "".into()],
            IdentityBackend::Snapshot,
        )
        .unwrap();

        assert_eq!(cfg.allowed_extensions(), ["png", "jpg"]);
        assert!(cfg.is_allowed_extension("PNG"));
        assert!(cfg.is_allowed_extension("jpg"));
        assert!(!cfg.is_allowed_extension("gif"));
        assert!(!cfg.is_allowed_extension(""));
    }

    #[test]
    fn test_new_rejects_empty_extension_set() {
        let result = CoreConfig::new(
            PathBuf::from("uploads"),
            10,
            vec![" ".into()],
            IdentityBackend::Database,
        );
        assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let cfg = CoreConfig::new(
            PathBuf::from("uploads"),
            10,
            vec!["png".into()],
            IdentityBackend::Database,
        )
        .unwrap();
        assert_eq!(cfg.query_timeout(), DEFAULT_QUERY_TIMEOUT);
        assert_eq!(cfg.reconcile_interval(), DEFAULT_RECONCILE_INTERVAL);
        assert_eq!(cfg.database_url(), DEFAULT_DATABASE_URL);

        let cfg = cfg
            .with_database_url("sqlite::memory:")
            .with_query_timeout(Duration::from_millis(250))
            .with_reconcile_interval(Duration::from_millis(50));
        assert_eq!(cfg.database_url(), "sqlite::memory:");
        assert_eq!(cfg.query_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.reconcile_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_backend_from_env_value() {
        assert_eq!(
            backend_from_env_value(None).unwrap(),
            IdentityBackend::Snapshot
        );
        assert_eq!(
            backend_from_env_value(Some("  ".into())).unwrap(),
            IdentityBackend::Snapshot
        );
        assert_eq!(
            backend_from_env_value(Some("Database".into())).unwrap(),
            IdentityBackend::Database
        );
        assert!(backend_from_env_value(Some("redis".into())).is_err());
    }

    #[test]
    fn test_max_file_size_from_env_value() {
        assert_eq!(
            max_file_size_from_env_value(None).unwrap(),
            DEFAULT_MAX_FILE_SIZE
        );
        assert_eq!(
            max_file_size_from_env_value(Some(" 2048 ".into())).unwrap(),
            2048
        );
        assert!(max_file_size_from_env_value(Some("ten".into())).is_err());
    }

    #[test]
    fn test_allowed_extensions_from_env_value() {
        assert_eq!(
            allowed_extensions_from_env_value(None),
            vec!["png", "jpg", "jpeg"]
        );
        assert_eq!(
            allowed_extensions_from_env_value(Some("gif, webp,,".into())),
            vec!["gif", "webp"]
        );
    }

    #[test]
    fn test_duration_from_env_value() {
        let default = Duration::from_secs(3);
        assert_eq!(
            duration_from_env_value(None, Duration::from_secs, default).unwrap(),
            default
        );
        assert_eq!(
            duration_from_env_value(Some("250".into()), Duration::from_millis, default).unwrap(),
            Duration::from_millis(250)
        );
        assert!(duration_from_env_value(Some("0".into()), Duration::from_secs, default).is_err());
        assert!(duration_from_env_value(Some("-1".into()), Duration::from_secs, default).is_err());
    }
}
