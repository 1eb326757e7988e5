use std::sync::Mutex;

use async_trait::async_trait;

use super::{ImageUpload, ImageUploader, UploadError};

/// Deterministic uploader for tests/dev: hands out
/// `{base_url}/{folder}/{n}-{file_name}` without storing any bytes.
#[derive(Debug)]
pub struct InMemoryImageUploader {
    base_url: String,
    fail_after: Option<usize>,
    uploaded: Mutex<Vec<String>>,
}

impl InMemoryImageUploader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fail_after: None,
            uploaded: Mutex::new(Vec::new()),
        }
    }

    /// Succeed for the first `n` uploads, then fail every later one.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// URLs handed out so far, in upload order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryImageUploader {
    fn default() -> Self {
        Self::new("https://assets.invalid")
    }
}

#[async_trait]
impl ImageUploader for InMemoryImageUploader {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<String, UploadError> {
        let mut uploaded = self
            .uploaded
            .lock()
            .map_err(|_| UploadError::Transport("uploader lock poisoned".to_string()))?;

        if self.fail_after.is_some_and(|n| uploaded.len() >= n) {
            return Err(UploadError::Transport("simulated asset host outage".to_string()));
        }

        let name = image.file_name.as_deref().unwrap_or("image");
        let url = format!("{}/{}/{}-{}", self.base_url, folder, uploaded.len() + 1, name);
        uploaded.push(url.clone());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn urls_are_sequential_and_folder_scoped() {
        let uploader = InMemoryImageUploader::new("https://cdn.test/");
        let a = uploader.upload(&ImageUpload::new(vec![1]).with_file_name("a.png"), "cakes").await.unwrap();
        let b = uploader.upload(&ImageUpload::new(vec![2]), "cakes").await.unwrap();
        assert_eq!(a, "https://cdn.test/cakes/1-a.png");
        assert_eq!(b, "https://cdn.test/cakes/2-image");
        assert_eq!(uploader.uploaded(), vec![a, b]);
    }

    #[tokio::test]
    async fn fails_after_budget_is_spent() {
        let uploader = InMemoryImageUploader::default().failing_after(1);
        assert!(uploader.upload(&ImageUpload::new(vec![1]), "cakes").await.is_ok());
        assert!(matches!(
            uploader.upload(&ImageUpload::new(vec![2]), "cakes").await,
            Err(UploadError::Transport(_))
        ));
        assert_eq!(uploader.uploaded().len(), 1);
    }
}
