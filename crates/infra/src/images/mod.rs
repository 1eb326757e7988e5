//! Image upload gateway: raw bytes in, durable URL out.
//!
//! The catalog treats any failure here as fatal for the current operation.
//! Images already uploaded earlier in the same request are not deleted from
//! the asset host.

use async_trait::async_trait;
use thiserror::Error;

pub mod cloudinary;
pub mod memory;

pub use cloudinary::{CloudinaryConfig, CloudinaryUploader};
pub use memory::InMemoryImageUploader;

/// Folder hint used for all cake images.
pub const CAKE_IMAGE_FOLDER: &str = "cakes";

/// One uploaded file, as received from the client.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            bytes,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl core::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Could not reach the asset host, or the connection failed mid-request.
    #[error("image upload failed: {0}")]
    Transport(String),

    /// The asset host answered with a non-success status.
    #[error("image upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The asset host answered 2xx but without a usable URL.
    #[error("image upload response did not contain a secure_url")]
    MissingUrl,
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload `image` into `folder` and return its durable HTTPS URL.
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<String, UploadError>;
}
