//! HTTP utilities for the backend API.

use crate::traits::SyncError;

/// Extension trait for `reqwest::Response` to handle common error patterns.
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Ensure the response status is successful, returning an error with details if not.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Status`] if the response status is not successful (2xx),
    /// carrying the status code and response body.
    async fn ensure_success(self, api_name: &str) -> Result<Self, SyncError>
    where
        Self: Sized;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn ensure_success(self, api_name: &str) -> Result<Self, SyncError> {
        if !self.status().is_success() {
            let status = self.status().as_u16();
            let body = self.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                api: api_name.to_string(),
                status,
                body,
            });
        }
        Ok(self)
    }
}
