//! # API Shared
//!
//! Wire types shared by the Stash HTTP surface.
//!
//! Contains:
//! - The `{status, message, file}` JSON envelope returned by every file route
//! - `HealthService` and its response type
//! - The plain-text usage string served at `/`
//!
//! Types derive `utoipa::ToSchema` so `api-rest` can publish them in its OpenAPI document.

pub mod envelope;
pub mod health;

pub use envelope::{JsonResponse, UploadReq};
pub use health::{HealthRes, HealthService};

/// Plain-text route summary served at `GET /`.
pub const USAGE_INFO: &str = "POST: /upload\nGET: /files, /files/<id>\nDELETE: /files/<id>";
