//! Signed uploads to the Cloudinary image API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::{ImageUpload, ImageUploader, UploadError};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl core::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryUploader {
    client: reqwest::Client,
    config: CloudinaryConfig,
    endpoint: String,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let endpoint = format!("{API_BASE}/{}/image/upload", config.cloud_name);
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Point at a different API host (e.g. a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Cloudinary request signature: the signed parameters sorted by name, joined
/// as `k=v&k=v`, with the API secret appended, hashed with SHA-256.
///
/// `file`, `api_key`, `resource_type` and `signature_algorithm` are never
/// part of the signed set.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    #[instrument(skip(self, image), fields(bytes = image.bytes.len()), err)]
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<String, UploadError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("folder", folder), ("timestamp", &timestamp)], &self.config.api_secret);

        let mut file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone().unwrap_or_else(|| "image".to_string()));
        if let Some(content_type) = image.content_type.as_deref() {
            file = file
                .mime_str(content_type)
                .map_err(|e| UploadError::Transport(format!("invalid content type: {e}")))?;
        }

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "asset host rejected upload");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(format!("invalid upload response: {e}")))?;
        let url = parsed.secure_url.ok_or(UploadError::MissingUrl)?;
        debug!(%url, "image uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let expected = "341850f1b93146c3a862d522572f5c438aa08677ef431e916c93a2307ad41b7b";
        assert_eq!(sign(&[("timestamp", "1700000000"), ("folder", "cakes")], "topsecret"), expected);
        assert_eq!(sign(&[("folder", "cakes"), ("timestamp", "1700000000")], "topsecret"), expected);
    }

    #[test]
    fn endpoint_is_derived_from_cloud_name() {
        let uploader = CloudinaryUploader::new(
            CloudinaryConfig {
                cloud_name: "bakery".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(uploader.endpoint(), "https://api.cloudinary.com/v1_1/bakery/image/upload");
    }

    mod against_local_host {
        use axum::{Json, Router, extract::Multipart, http::StatusCode, routing::post};
        use serde_json::{Value, json};

        use super::*;

        async fn accept(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
            let mut names = Vec::new();
            let mut algorithm = String::new();
            while let Ok(Some(field)) = multipart.next_field().await {
                let name = field.name().unwrap_or_default().to_string();
                let text = field.text().await.unwrap_or_default();
                if name == "signature_algorithm" {
                    algorithm = text;
                }
                names.push(name);
            }
            for required in ["file", "api_key", "timestamp", "folder", "signature"] {
                if !names.iter().any(|n| n == required) {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": format!("missing {required}") } })));
                }
            }
            if algorithm != "sha256" {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": "bad algorithm" } })));
            }
            (StatusCode::OK, Json(json!({ "secure_url": "https://x/y.jpg" })))
        }

        async fn spawn_host() -> String {
            let app = Router::new()
                .route("/ok", post(accept))
                .route("/nourl", post(|| async { Json(json!({ "public_id": "cakes/abc" })) }))
                .route(
                    "/bad",
                    post(|| async {
                        (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": "Invalid Signature" } })))
                    }),
                )
                .route("/plain", post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn uploader(base: &str, route: &str) -> CloudinaryUploader {
            CloudinaryUploader::new(
                CloudinaryConfig {
                    cloud_name: "bakery".into(),
                    api_key: "key".into(),
                    api_secret: "secret".into(),
                },
                Duration::from_secs(5),
            )
            .unwrap()
            .with_endpoint(format!("{base}{route}"))
        }

        fn jpeg() -> ImageUpload {
            ImageUpload::new(vec![0xFF, 0xD8, 0xFF])
                .with_file_name("a.jpg")
                .with_content_type("image/jpeg")
        }

        #[tokio::test]
        async fn secure_url_is_returned() {
            let base = spawn_host().await;
            let url = uploader(&base, "/ok").upload(&jpeg(), "cakes").await.unwrap();
            assert_eq!(url, "https://x/y.jpg");
        }

        #[tokio::test]
        async fn success_without_secure_url_is_an_error() {
            let base = spawn_host().await;
            let err = uploader(&base, "/nourl").upload(&jpeg(), "cakes").await.unwrap_err();
            assert_eq!(err, UploadError::MissingUrl);
        }

        #[tokio::test]
        async fn rejection_carries_host_message() {
            let base = spawn_host().await;
            let err = uploader(&base, "/bad").upload(&jpeg(), "cakes").await.unwrap_err();
            assert_eq!(
                err,
                UploadError::Rejected {
                    status: 400,
                    message: "Invalid Signature".into()
                }
            );
        }

        #[tokio::test]
        async fn non_json_rejection_keeps_raw_body() {
            let base = spawn_host().await;
            let err = uploader(&base, "/plain").upload(&jpeg(), "cakes").await.unwrap_err();
            assert_eq!(
                err,
                UploadError::Rejected {
                    status: 502,
                    message: "upstream down".into()
                }
            );
        }

        #[tokio::test]
        async fn unreachable_host_is_a_transport_error() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let err = uploader(&format!("http://{addr}"), "/ok")
                .upload(&jpeg(), "cakes")
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::Transport(_)));
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let config = CloudinaryConfig {
            cloud_name: "bakery".into(),
            api_key: "key".into(),
            api_secret: "hunter2".into(),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
