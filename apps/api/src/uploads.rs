use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
}

/// Keeps letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn object_key(filename: &str) -> String {
    format!("uploads/{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

async fn put_object(
    state: &AppState,
    key: &str,
    data: Bytes,
    content_type: String,
) -> Result<(), AppError> {
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Upload failed: {e}")))?;

    info!("Uploaded s3://{}/{key}", state.config.s3_bucket);
    Ok(())
}

/// POST /api/v1/uploads
///
/// Stores the `file` part of a multipart body and returns where it lives.
/// Submissions keep the returned URL as an ordinary answer.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Could not read upload: {e}")))?;
        if data.is_empty() {
            return Err(AppError::InvalidRequest("Uploaded file is empty".to_string()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::InvalidRequest(
                "File too large. Maximum size is 10MB".to_string(),
            ));
        }

        let key = object_key(&filename);
        put_object(&state, &key, data, content_type).await?;
        let url = object_url(&state.config.s3_endpoint, &state.config.s3_bucket, &key);
        return Ok((StatusCode::CREATED, Json(UploadResponse { key, url })));
    }

    Err(AppError::InvalidRequest(format!(
        "Multipart body has no '{FILE_FIELD}' part"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\My CV (final).pdf"), "My_CV__final_.pdf");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[test]
    fn test_object_key_is_unique_and_prefixed() {
        let a = object_key("cv.pdf");
        let b = object_key("cv.pdf");
        assert!(a.starts_with("uploads/"));
        assert!(a.ends_with("-cv.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_url_joins_endpoint_bucket_and_key() {
        assert_eq!(
            object_url("http://localhost:9000/", "intake", "uploads/x-cv.pdf"),
            "http://localhost:9000/intake/uploads/x-cv.pdf"
        );
    }
}
