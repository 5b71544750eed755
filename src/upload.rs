//! File upload task.
//!
//! Uploads run over plain HTTP multipart, isolated from the chat session:
//! no shared state, no session preconditions, and an upload failure never
//! affects the connection.
//!
//! # Wire Format
//!
//! `POST {api_url}/api/chat/upload` with multipart fields:
//!
//! | Field | Content |
//! |-------|---------|
//! | `file` | Raw file bytes, with the original file name |
//! | `chatCode` | Room the file belongs to |
//! | `sender` | Uploading user |

// ============================================================================
// Imports
// ============================================================================

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ============================================================================
// UploadRequest
// ============================================================================

/// A single file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw file contents.
    pub file: Vec<u8>,
    /// Original file name, forwarded to the backend.
    pub file_name: String,
    /// Room the file belongs to.
    pub chat_code: String,
    /// Uploading user.
    pub sender: String,
    /// Backend base URL, e.g. `http://localhost:8080`.
    pub api_url: String,
}

impl UploadRequest {
    /// Creates an upload request.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        chat_code: impl Into<String>,
        sender: impl Into<String>,
        file_name: impl Into<String>,
        file: Vec<u8>,
    ) -> Self {
        Self {
            file,
            file_name: file_name.into(),
            chat_code: chat_code.into(),
            sender: sender.into(),
            api_url: api_url.into(),
        }
    }

    /// Returns the full upload endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/api/chat/upload", self.api_url.trim_end_matches('/'))
    }
}

// ============================================================================
// UploadOutcome
// ============================================================================

/// Terminal result of a spawned upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The backend accepted the file; carries its JSON response.
    Success(Value),
    /// The upload failed; carries a display message.
    Failure(String),
}

impl UploadOutcome {
    /// Returns `true` for [`UploadOutcome::Success`].
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Uploads a file and returns the backend's JSON response.
///
/// # Errors
///
/// - [`Error::UploadFailed`] on a non-2xx response, carrying the status
///   code and the response body (or the canonical status reason when the
///   body is empty)
/// - [`Error::Http`] on transport-level failures
pub async fn upload(request: &UploadRequest) -> Result<Value> {
    let part = Part::bytes(request.file.clone()).file_name(request.file_name.clone());
    let form = Form::new()
        .part("file", part)
        .text("chatCode", request.chat_code.clone())
        .text("sender", request.sender.clone());

    debug!(
        endpoint = %request.endpoint(),
        chat_code = %request.chat_code,
        bytes = request.file.len(),
        "Uploading file"
    );

    let response = reqwest::Client::new()
        .post(request.endpoint())
        .header(ACCEPT, "application/json")
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            message
        };
        return Err(Error::upload_failed(status.as_u16(), message));
    }

    let body = response.json::<Value>().await?;
    debug!(chat_code = %request.chat_code, "Upload completed");
    Ok(body)
}

/// Spawns an upload as a background task.
///
/// The returned receiver resolves with exactly one [`UploadOutcome`];
/// there are no retries. Dropping the receiver does not cancel the upload.
pub fn spawn(request: UploadRequest) -> oneshot::Receiver<UploadOutcome> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = match upload(&request).await {
            Ok(body) => UploadOutcome::Success(body),
            Err(e) => {
                warn!(error = %e, chat_code = %request.chat_code, "Upload failed");
                UploadOutcome::Failure(e.to_string())
            }
        };
        let _ = tx.send(outcome);
    });

    rx
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::response::Json;
    use axum::routing::post;
    use serde_json::json;

    /// Serves a router on an ephemeral port; returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    /// Accepts the upload and echoes the received fields back as JSON.
    async fn accept_upload(mut multipart: Multipart) -> Json<Value> {
        let mut file_name = String::new();
        let mut file_len = 0;
        let mut chat_code = String::new();
        let mut sender = String::new();

        while let Some(field) = multipart.next_field().await.expect("field") {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    file_name = field.file_name().unwrap_or_default().to_string();
                    file_len = field.bytes().await.expect("bytes").len();
                }
                "chatCode" => chat_code = field.text().await.expect("text"),
                "sender" => sender = field.text().await.expect("text"),
                _ => {}
            }
        }

        Json(json!({
            "fileName": file_name,
            "size": file_len,
            "chatCode": chat_code,
            "sender": sender,
        }))
    }

    fn sample_request(api_url: String) -> UploadRequest {
        UploadRequest::new(api_url, "room-1", "alice", "photo.png", vec![1, 2, 3, 4])
    }

    #[test]
    fn test_endpoint_joins_path() {
        let request = sample_request("http://localhost:8080/".to_string());
        assert_eq!(request.endpoint(), "http://localhost:8080/api/chat/upload");
    }

    #[tokio::test]
    async fn test_upload_success() {
        let api_url = serve(Router::new().route("/api/chat/upload", post(accept_upload))).await;

        let body = upload(&sample_request(api_url)).await.expect("upload");
        assert_eq!(body["fileName"], "photo.png");
        assert_eq!(body["size"], 4);
        assert_eq!(body["chatCode"], "room-1");
        assert_eq!(body["sender"], "alice");
    }

    #[tokio::test]
    async fn test_upload_rejected_carries_status_and_body() {
        let api_url = serve(Router::new().route(
            "/api/chat/upload",
            post(|| async { (StatusCode::BAD_REQUEST, "file too large") }),
        ))
        .await;

        let err = upload(&sample_request(api_url))
            .await
            .err()
            .expect("upload should fail");
        match err {
            Error::UploadFailed { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "file too large");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upload_rejected_empty_body_uses_canonical_reason() {
        let api_url = serve(Router::new().route(
            "/api/chat/upload",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let err = upload(&sample_request(api_url))
            .await
            .err()
            .expect("upload should fail");
        match err {
            Error::UploadFailed { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_resolves_with_success() {
        let api_url = serve(Router::new().route("/api/chat/upload", post(accept_upload))).await;

        let outcome = spawn(sample_request(api_url)).await.expect("outcome");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_spawn_resolves_with_failure() {
        // Nothing listens on this port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let api_url = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);

        let outcome = spawn(sample_request(api_url)).await.expect("outcome");
        assert!(!outcome.is_success());
    }
}
