//! Route handlers.
//!
//! Every file route answers with a [`JsonResponse`] envelope whose `status` repeats the HTTP
//! status code.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::Json,
};

use api_shared::{HealthRes, HealthService, JsonResponse, UploadReq, USAGE_INFO};
use stash_core::{RegistryError, SafeFilename};

use crate::AppState;

type Reply = (StatusCode, Json<JsonResponse>);

fn respond(status: StatusCode, message: impl Into<String>, file: impl Into<String>) -> Reply {
    (status, Json(JsonResponse::new(status.as_u16(), message, file)))
}

fn parse_id(raw: &str) -> Result<i64, Reply> {
    raw.parse::<i64>()
        .map_err(|_| respond(StatusCode::BAD_REQUEST, "Invalid file ID", ""))
}

fn validation_message(err: &RegistryError) -> &'static str {
    match err {
        RegistryError::DisallowedExtension(_) => "File type is not allowed!",
        RegistryError::FileTooLarge { .. } => "File size is too large!",
        _ => "Filename is not allowed!",
    }
}

fn multipart_failure(err: MultipartError) -> Reply {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return respond(StatusCode::BAD_REQUEST, "File size is too large!", "");
    }
    tracing::error!("multipart parse error: {}", err);
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        "error parsing multipart form data",
        "",
    )
}

/// Plain-text summary of the available routes
pub(crate) async fn usage() -> &'static str {
    USAGE_INFO
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// This endpoint is used for monitoring and load balancer health checks.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadReq, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = JsonResponse),
        (status = 400, description = "Disallowed extension, oversize file or unsafe name", body = JsonResponse),
        (status = 500, description = "Storage or identity failure", body = JsonResponse)
    )
)]
/// Store an uploaded file
///
/// Reads the multipart field named `file`, sanitises its filename and hands name and bytes to
/// the registry. Other form fields are ignored.
///
/// # Errors
/// Returns `400 Bad Request` for validation failures and `500 Internal Server Error` when the
/// form cannot be read, the file cannot be written or the identity cannot be recorded.
#[axum::debug_handler]
pub(crate) async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> Reply {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_failure(e),
        };
        if field.name() != Some("file") {
            continue;
        }

        let raw_filename = field.file_name().unwrap_or_default().to_owned();
        let content = match field.bytes().await {
            Ok(content) => content,
            Err(e) => return multipart_failure(e),
        };

        return match state.registry.add(&raw_filename, &content).await {
            Ok(record) => respond(
                StatusCode::OK,
                "File uploaded successfully",
                record.filename.into_string(),
            ),
            Err(e) if e.is_validation() => {
                respond(StatusCode::BAD_REQUEST, validation_message(&e), "")
            }
            Err(e @ RegistryError::Storage(_)) => {
                tracing::error!("upload storage error: {}", e);
                respond(StatusCode::INTERNAL_SERVER_ERROR, "Error saving file data", "")
            }
            Err(e) => {
                tracing::error!("upload identity error: {}", e);
                let file = SafeFilename::sanitize(&raw_filename)
                    .map(SafeFilename::into_string)
                    .unwrap_or_default();
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error saving file to database",
                    file,
                )
            }
        };
    }

    respond(
        StatusCode::BAD_REQUEST,
        "form field `file` is missing",
        "",
    )
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "All records as `filename [id]`, comma separated", body = JsonResponse),
        (status = 500, description = "Identity store failure", body = JsonResponse)
    )
)]
/// List every registered file
#[axum::debug_handler]
pub(crate) async fn list_files(State(state): State<AppState>) -> Reply {
    match state.registry.list().await {
        Ok(records) => {
            let lines: Vec<String> = records.iter().map(ToString::to_string).collect();
            respond(StatusCode::OK, lines.join(", "), "")
        }
        Err(e) => {
            tracing::error!("list files error: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve files",
                "",
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = i64, Path, description = "File identifier")),
    responses(
        (status = 200, description = "File found; name in `file`", body = JsonResponse),
        (status = 400, description = "Identifier is not an integer", body = JsonResponse),
        (status = 404, description = "Unknown identifier", body = JsonResponse),
        (status = 500, description = "Identity store failure", body = JsonResponse)
    )
)]
/// Look up a file by identifier
#[axum::debug_handler]
pub(crate) async fn get_file(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    match state.registry.get_by_id(id).await {
        Ok(record) => respond(StatusCode::OK, "file found", record.filename.into_string()),
        Err(e) if e.is_not_found() => respond(
            StatusCode::NOT_FOUND,
            "failed to locate file with this ID",
            "",
        ),
        Err(e) => {
            tracing::error!("get file {} error: {}", id, e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error querying database",
                "",
            )
        }
    }
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = i64, Path, description = "File identifier")),
    responses(
        (status = 200, description = "File and record removed", body = JsonResponse),
        (status = 400, description = "Identifier is not an integer", body = JsonResponse),
        (status = 404, description = "Unknown identifier", body = JsonResponse),
        (status = 500, description = "Storage or identity failure", body = JsonResponse)
    )
)]
/// Delete a file and its record
///
/// The file is removed from disk before its record is dropped. If the disk delete fails the
/// record is kept.
#[axum::debug_handler]
pub(crate) async fn delete_file(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    match state.registry.remove_by_id(id).await {
        Ok(()) => respond(StatusCode::OK, "File successfully deleted", ""),
        Err(e) if e.is_not_found() => respond(StatusCode::NOT_FOUND, "File not found", ""),
        Err(e @ RegistryError::Storage(_)) => {
            tracing::error!("delete file {} storage error: {}", id, e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove file from filesystem",
                "",
            )
        }
        Err(e) => {
            tracing::error!("delete file {} identity error: {}", id, e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete file record from database",
                "",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::router;
    use api_shared::JsonResponse;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use stash_core::{CoreConfig, IdentityBackend, Registry};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "stash-test-boundary";
    const MAX: u64 = 32;

    async fn app(temp: &TempDir, backend: IdentityBackend) -> (Router, Registry) {
        let cfg = CoreConfig::new(
            temp.path().join("uploads"),
            MAX,
            vec!["png".into(), "jpg".into(), "jpeg".into()],
            backend,
        )
        .unwrap()
        .with_database_url("sqlite::memory:");
        let registry = Registry::open(Arc::new(cfg)).await.unwrap();
        (router(registry.clone()), registry)
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, content)))
            .unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, JsonResponse) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let envelope: JsonResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.status, status.as_u16());
        (status, envelope)
    }

    #[tokio::test]
    async fn test_usage_and_health() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, IdentityBackend::Snapshot).await;

        let resp = app.clone().oneshot(request(Method::GET, "/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&body).unwrap().contains("POST: /upload"));

        let resp = app.oneshot(request(Method::GET, "/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_then_get_and_list() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, IdentityBackend::Database).await;

        let (status, body) = send(&app, upload_request("file", "cat.png", b"meow")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "File uploaded successfully");
        assert_eq!(body.file, "cat.png");

        send(&app, upload_request("file", "dog.jpg", b"woof")).await;

        let (status, body) = send(&app, request(Method::GET, "/files/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.file, "cat.png");

        let (status, body) = send(&app, request(Method::GET, "/files")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "cat.png [1], dog.jpg [2]");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let temp = TempDir::new().unwrap();
        let (app, registry) = app(&temp, IdentityBackend::Snapshot).await;

        let (status, body) = send(&app, upload_request("file", "run.exe", b"MZ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "File type is not allowed!");

        let too_big = vec![0u8; MAX as usize + 1];
        let (status, body) = send(&app, upload_request("file", "big.png", &too_big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "File size is too large!");

        let (status, _) = send(&app, upload_request("other", "cat.png", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(registry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_body_over_limit_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, IdentityBackend::Snapshot).await;

        let huge = vec![0u8; 128 * 1024];
        let (status, body) = send(&app, upload_request("file", "huge.png", &huge)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "File size is too large!");
    }

    #[tokio::test]
    async fn test_upload_exact_max_and_traversal_name() {
        let temp = TempDir::new().unwrap();
        let (app, registry) = app(&temp, IdentityBackend::Snapshot).await;

        let exact = vec![1u8; MAX as usize];
        let (status, body) =
            send(&app, upload_request("file", "../../up.png", &exact)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.file, "up.png");
        assert!(registry.files().directory().join("up.png").is_file());
    }

    #[tokio::test]
    async fn test_get_unknown_and_invalid_ids() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, IdentityBackend::Snapshot).await;

        let (status, _) = send(&app, request(Method::GET, "/files/7")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, request(Method::GET, "/files/seven")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Invalid file ID");

        let (status, _) = send(&app, request(Method::DELETE, "/files/seven")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let temp = TempDir::new().unwrap();
        let (app, registry) = app(&temp, IdentityBackend::Database).await;
        send(&app, upload_request("file", "bye.png", b"b")).await;

        let (status, body) = send(&app, request(Method::DELETE, "/files/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "File successfully deleted");
        assert!(!registry.files().directory().join("bye.png").exists());

        let (status, _) = send(&app, request(Method::DELETE, "/files/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request(Method::GET, "/files/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_storage_failure_keeps_record() {
        let temp = TempDir::new().unwrap();
        let (app, registry) = app(&temp, IdentityBackend::Snapshot).await;
        send(&app, upload_request("file", "stuck.png", b"s")).await;

        let path = registry.files().directory().join("stuck.png");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let (status, body) = send(&app, request(Method::DELETE, "/files/0")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Failed to remove file from filesystem");

        let (status, body) = send(&app, request(Method::GET, "/files/0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.file, "stuck.png");
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, IdentityBackend::Snapshot).await;

        let (status, body) = send(&app, upload_request("attachment", "cat.png", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "form field `file` is missing");
    }

    #[tokio::test]
    async fn test_identity_failure_is_internal_error() {
        let temp = TempDir::new().unwrap();
        let (app, registry) = app(&temp, IdentityBackend::Database).await;
        registry.close().await;

        let (status, body) = send(&app, upload_request("file", "late.png", b"l")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Error saving file to database");
        assert_eq!(body.file, "late.png");

        let (status, _) = send(&app, request(Method::GET, "/files")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
