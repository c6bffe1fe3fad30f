//! Storage API client for file attachments.
//!
//! ```text
//! POST {base}/storage/v1/object/{bucket}/{name}          body: raw bytes
//! GET  {base}/storage/v1/object/public/{bucket}/{name}   (public URL)
//! ```

use super::{BlobError, BlobStore};
use crate::config::StoreConfig;
use async_trait::async_trait;
use reqwest::Url;

/// Blob store backed by the HTTP storage API.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    base: Url,
    api_key: String,
}

impl HttpBlobStore {
    /// Build a blob store sharing the message store's endpoint and key.
    pub fn new(config: &StoreConfig) -> Result<Self, BlobError> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|e| BlobError::Request(format!("bad base url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BlobError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base,
            api_key: config.api_key.clone(),
        })
    }

    fn object_url(&self, segments: &[&str]) -> Result<Url, BlobError> {
        if let Some(empty) = segments.iter().find(|s| s.trim().is_empty()) {
            return Err(BlobError::InvalidName(format!("empty path segment {empty:?}")));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| BlobError::InvalidName(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(["storage", "v1", "object"])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let url = self.object_url(&[bucket, name])?;
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        if !self.api_key.is_empty() {
            request = request
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BlobError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.public_url(bucket, name)
    }

    fn public_url(&self, bucket: &str, name: &str) -> Result<String, BlobError> {
        Ok(self.object_url(&["public", bucket, name])?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> HttpBlobStore {
        let config = StoreConfig {
            base_url: base_url.into(),
            ..StoreConfig::default()
        };
        HttpBlobStore::new(&config).unwrap()
    }

    #[test]
    fn public_url_layout() {
        let store = store("https://example.supabase.co");
        assert_eq!(
            store.public_url("chat-files", "file_1_a.png").unwrap(),
            "https://example.supabase.co/storage/v1/object/public/chat-files/file_1_a.png"
        );
    }

    #[test]
    fn names_are_percent_encoded() {
        let store = store("https://example.supabase.co/");
        let url = store.public_url("chat-files", "file_1_my photo?.png").unwrap();
        assert_eq!(
            url,
            "https://example.supabase.co/storage/v1/object/public/chat-files/file_1_my%20photo%3F.png"
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        let store = store("https://example.supabase.co");
        assert!(matches!(
            store.public_url("chat-files", " "),
            Err(BlobError::InvalidName(_))
        ));
    }

    #[test]
    fn bad_base_url_is_reported() {
        let config = StoreConfig::default();
        assert!(matches!(
            HttpBlobStore::new(&config),
            Err(BlobError::Request(_))
        ));
    }
}
