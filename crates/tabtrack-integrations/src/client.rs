//! REST client for the activity backend
//!
//! Implements [`SessionSink`] for session delivery and wraps the query
//! endpoints the dashboard uses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tabtrack_storage::Category;

use crate::analytics::{ProductivityMetrics, ScoreReport};
use crate::http::ResponseExt;
use crate::payload::{ActivityRecord, LegacyLog, SessionPayload};
use crate::traits::{SessionSink, SyncError};

/// Default look-back window for activity listings
pub const DEFAULT_ACTIVITY_DAYS: u32 = 7;
/// Default number of recent activities
pub const DEFAULT_RECENT_LIMIT: u32 = 20;
/// Default period for productivity metrics
pub const DEFAULT_PERIOD_DAYS: u32 = 1;

/// Client for the activity backend
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("tabtrack")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Post an entry through the legacy `{domain, duration}` endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn log_legacy(&self, entry: &LegacyLog) -> Result<ActivityRecord> {
        let record = self
            .client
            .post(self.url("/api/activity/log"))
            .json(entry)
            .send()
            .await
            .context("Failed to reach backend")?
            .ensure_success("Activity")
            .await?
            .json()
            .await
            .context("Failed to parse legacy log response")?;
        Ok(record)
    }

    /// Fetch a user's activities, optionally filtered by category
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn fetch_activities(
        &self,
        user_id: &str,
        category: Option<Category>,
        days: Option<u32>,
    ) -> Result<Vec<ActivityRecord>> {
        let mut query = vec![(
            "days",
            days.unwrap_or(DEFAULT_ACTIVITY_DAYS).to_string(),
        )];
        if let Some(category) = category {
            query.push(("category", category.as_str().to_string()));
        }

        let records = self
            .client
            .get(self.url(&format!("/api/activity/{user_id}")))
            .query(&query)
            .send()
            .await
            .context("Failed to reach backend")?
            .ensure_success("Activity")
            .await?
            .json()
            .await
            .context("Failed to parse activities")?;
        Ok(records)
    }

    /// Fetch the most recent activities, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn fetch_recent(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ActivityRecord>> {
        let records = self
            .client
            .get(self.url(&format!("/api/activity/recent/{user_id}")))
            .query(&[("limit", limit.unwrap_or(DEFAULT_RECENT_LIMIT))])
            .send()
            .await
            .context("Failed to reach backend")?
            .ensure_success("Activity")
            .await?
            .json()
            .await
            .context("Failed to parse recent activities")?;
        Ok(records)
    }

    /// Fetch productivity metrics over the last `period_days` days
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn fetch_productivity(
        &self,
        user_id: &str,
        period_days: Option<u32>,
    ) -> Result<ProductivityMetrics> {
        let period = format!("{}d", period_days.unwrap_or(DEFAULT_PERIOD_DAYS));
        let metrics = self
            .client
            .get(self.url(&format!("/api/analytics/productivity/{user_id}")))
            .query(&[("period", period)])
            .send()
            .await
            .context("Failed to reach backend")?
            .ensure_success("Analytics")
            .await?
            .json()
            .await
            .context("Failed to parse productivity metrics")?;
        Ok(metrics)
    }

    /// Fetch the trailing 24h score, grade and insights
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn fetch_score(&self, user_id: &str) -> Result<ScoreReport> {
        let report = self
            .client
            .get(self.url(&format!("/api/analytics/score/{user_id}")))
            .send()
            .await
            .context("Failed to reach backend")?
            .ensure_success("Analytics")
            .await?
            .json()
            .await
            .context("Failed to parse score report")?;
        Ok(report)
    }
}

#[async_trait]
impl SessionSink for BackendClient {
    async fn push_session(&self, payload: &SessionPayload) -> Result<(), SyncError> {
        self.client
            .post(self.url("/api/activity/advanced"))
            .json(payload)
            .send()
            .await?
            .ensure_success("Activity")
            .await?;
        log::debug!("Synced session {}", payload.session_id);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SessionMetadata;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request text
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0; 16 * 1024];
            let mut request = Vec::new();
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            user_id: "user_1".to_string(),
            session_id: "session_1".to_string(),
            domain: "github.com".to_string(),
            url: "https://github.com".to_string(),
            title: "GitHub".to_string(),
            time_spent: 60_000,
            category: Category::HighlyProductive,
            focus_score: 70,
            productivity_score: 70,
            metadata: SessionMetadata {
                distractions: 0,
                keystrokes: 1,
                mouse_movements: 2,
                scrolls: 3,
                clicks: 4,
                time_spent_active: 60_000,
                time_spent_idle: 0,
                start_time: 0,
                end_time: 60_000,
            },
        }
    }

    #[tokio::test]
    async fn test_push_session_posts_to_advanced_endpoint() {
        let (base, server) = one_shot_server("200 OK", "{}").await;
        let client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();

        client.push_session(&payload()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/activity/advanced HTTP/1.1"));
        assert!(request.contains("\"sessionId\":\"session_1\""));
    }

    #[tokio::test]
    async fn test_push_session_non_2xx_is_status_error() {
        let (base, server) =
            one_shot_server("500 Internal Server Error", "{\"error\":\"db\"}").await;
        let client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.push_session(&payload()).await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 500, .. }));
        assert!(err.is_retryable());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_push_session_unreachable_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            BackendClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.push_session(&payload()).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_productivity_sends_period_query() {
        let (base, server) = one_shot_server(
            "200 OK",
            r#"{"totalTime":1000,"productiveTime":500,"unproductiveTime":100,"sessionsCount":3,"productivityScore":50}"#,
        )
        .await;
        let client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();

        let metrics = client.fetch_productivity("user_1", None).await.unwrap();
        assert_eq!(metrics.sessions_count, 3);
        assert_eq!(metrics.productivity_score, 50);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/analytics/productivity/user_1?period=1d "));
    }
}
