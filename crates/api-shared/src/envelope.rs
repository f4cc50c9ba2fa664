use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response envelope for every file route.
///
/// `status` repeats the HTTP status code. Empty `message` and `file` fields are omitted from
/// the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JsonResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
}

impl JsonResponse {
    pub fn new(status: u16, message: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            file: file.into(),
        }
    }
}

/// Multipart form accepted by `POST /upload`.
#[derive(Debug, ToSchema)]
pub struct UploadReq {
    /// The uploaded file; its part filename becomes the stored name after sanitising.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_omitted() {
        let json = serde_json::to_string(&JsonResponse::new(404, "File not found", "")).unwrap();
        assert_eq!(json, r#"{"status":404,"message":"File not found"}"#);

        let json = serde_json::to_string(&JsonResponse::new(200, "", "")).unwrap();
        assert_eq!(json, r#"{"status":200}"#);
    }

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let parsed: JsonResponse = serde_json::from_str(r#"{"status":200,"file":"a.png"}"#).unwrap();
        assert_eq!(parsed, JsonResponse::new(200, "", "a.png"));
    }
}
