//! Constants used throughout the Stash core crate.
//!
//! Defaults mirror the reference deployment; every one of them can be overridden through
//! [`crate::CoreConfig`].

use std::time::Duration;

/// Default upload directory when no explicit directory is configured.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default maximum upload size in bytes (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 << 20;

/// Extensions accepted when none are configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Default connection string for the database backend.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:stash.db?mode=rwc";

/// Upper bound for a single identity-store query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// How often the reconciler stats the upload directory.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// How long shutdown waits for in-flight requests before proceeding anyway.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);
