//! Attachment storage abstraction.
//!
//! File messages carry only a retrieval URL. Uploading the bytes and
//! resolving the public URL is the job of a [`BlobStore`].

mod http;
mod mock;

pub use http::HttpBlobStore;
pub use mock::MockBlobStore;

use async_trait::async_trait;
use thiserror::Error;

/// Blob storage errors.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Object name is empty or cannot be used in a URL.
    #[error("invalid object name: {0}")]
    InvalidName(String),

    /// Request could not be sent or the response not read.
    #[error("upload request failed: {0}")]
    Request(String),

    /// Storage answered with a non-success status.
    #[error("storage returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
}

/// Blob storage trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` as `name` in `bucket` and return its public URL.
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    /// Public URL of an object, without checking that it exists.
    fn public_url(&self, bucket: &str, name: &str) -> Result<String, BlobError>;
}

/// Object name for an uploaded file: `file_<millis>_<name>`.
///
/// Path separators in `file_name` are replaced so the object stays at the
/// bucket root.
pub fn object_name(millis: i64, file_name: &str) -> String {
    let base: String = file_name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("file_{millis}_{base}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name_is_prefixed_with_time() {
        assert_eq!(object_name(1700000000000, "photo.jpg"), "file_1700000000000_photo.jpg");
    }

    #[test]
    fn object_name_flattens_paths() {
        assert_eq!(object_name(5, "../etc/passwd"), "file_5_.._etc_passwd");
        assert_eq!(object_name(5, " a\\b "), "file_5_a_b");
    }
}
