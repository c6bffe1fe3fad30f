//! Mock blob store for testing.

use super::{BlobError, BlobStore};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mock blob store for testing.
///
/// Keeps uploads in memory and serves `mock://{bucket}/{name}` URLs.
#[derive(Debug, Default, Clone)]
pub struct MockBlobStore {
    inner: Arc<Mutex<MockBlobStoreInner>>,
}

#[derive(Debug, Default)]
struct MockBlobStoreInner {
    uploads: Vec<(String, String, Vec<u8>)>,
    fail_next_upload: Option<String>,
}

impl MockBlobStore {
    /// Create an empty mock blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful upload as `(bucket, name, bytes)`.
    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        let inner = self.inner.lock().unwrap();
        inner.uploads.clone()
    }

    /// Cause the next upload() to fail with the given error.
    pub fn fail_next_upload(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_upload = Some(error.to_string());
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let url = self.public_url(bucket, name)?;
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_upload.take() {
            return Err(BlobError::Request(error));
        }

        inner
            .uploads
            .push((bucket.to_string(), name.to_string(), bytes));
        Ok(url)
    }

    fn public_url(&self, bucket: &str, name: &str) -> Result<String, BlobError> {
        if name.trim().is_empty() {
            return Err(BlobError::InvalidName("empty object name".into()));
        }
        Ok(format!("mock://{bucket}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_records_and_returns_url() {
        let blobs = MockBlobStore::new();
        let url = blobs.upload("files", "a.txt", b"hello".to_vec()).await.unwrap();

        assert_eq!(url, "mock://files/a.txt");
        assert_eq!(
            blobs.uploads(),
            vec![("files".to_string(), "a.txt".to_string(), b"hello".to_vec())]
        );
    }

    #[tokio::test]
    async fn forced_failure_is_one_shot() {
        let blobs = MockBlobStore::new();
        blobs.fail_next_upload("quota");

        assert!(blobs.upload("files", "a", vec![]).await.is_err());
        assert!(blobs.upload("files", "a", vec![]).await.is_ok());
        assert_eq!(blobs.uploads().len(), 1);
    }
}
