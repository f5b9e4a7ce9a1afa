// Facebook Graph API client for publishing page videos
// Docs: https://developers.facebook.com/docs/video-api/guides/publishing

use crate::config::FacebookConfig;
use crate::error::{PosterError, Result};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
const PUBLIC_PRIVACY: &str = r#"{"value":"EVERYONE"}"#;

#[derive(Debug, Clone)]
pub struct FacebookClient {
    client: Client,
    config: FacebookConfig,
    graph_url: String,
    initial_interval: Duration,
    max_elapsed: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoPostResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Whether a failed Graph call is worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

impl FacebookClient {
    pub fn new(config: FacebookConfig) -> Self {
        Self::with_graph_url(config, DEFAULT_GRAPH_URL)
    }

    pub fn with_graph_url(config: FacebookConfig, graph_url: &str) -> Self {
        Self {
            client: Client::new(),
            config,
            graph_url: graph_url.trim_end_matches('/').to_string(),
            initial_interval: Duration::from_secs(2),
            max_elapsed: Duration::from_secs(300),
        }
    }

    /// Override the retry schedule: first wait and total time budget.
    pub fn with_backoff(mut self, initial_interval: Duration, max_elapsed: Duration) -> Self {
        self.initial_interval = initial_interval;
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn videos_url(&self) -> String {
        format!(
            "{}/{}/{}/videos",
            self.graph_url, self.config.graph_version, self.config.page_id
        )
    }

    /// Publish an externally hosted video on the page.
    ///
    /// Parameters go in the form body so the access token never shows up in
    /// request URLs or in the errors reqwest builds from them.
    pub async fn post_video(&self, file_url: &str, description: &str) -> Result<VideoPostResponse> {
        let url = self.videos_url();
        let params = [
            ("file_url", file_url),
            ("description", description),
            ("access_token", self.config.access_token.as_str()),
            ("privacy", PUBLIC_PRIVACY),
        ];

        tracing::info!("📣 Posting video to Facebook Page ID: {}", self.config.page_id);
        tracing::info!("Video URL for Facebook: {}", file_url);
        tracing::info!("Facebook post message: {}", description);

        let backoff_config = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let operation = || async {
            let response = self
                .client
                .post(&url)
                .form(&params)
                .timeout(Duration::from_secs(120))
                .send()
                .await
                .map_err(|e| {
                    let e = e.without_url();
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("Facebook connection error (retrying): {}", e);
                        backoff::Error::transient(format!("Connection error: {}", e))
                    } else {
                        backoff::Error::permanent(format!("Request error: {}", e))
                    }
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| {
                    backoff::Error::permanent(format!("Failed to read response: {}", e.without_url()))
                })?;

            if is_transient_status(status.as_u16()) {
                tracing::warn!("Facebook returned {} (retrying): {}", status, body);
                return Err(backoff::Error::transient(format!("API error ({}): {}", status, body)));
            }

            if !status.is_success() {
                tracing::error!("Facebook permanent error ({}): {}", status, body);
                return Err(backoff::Error::permanent(format!("API error ({}): {}", status, body)));
            }

            serde_json::from_str::<VideoPostResponse>(&body)
                .map_err(|e| backoff::Error::permanent(format!("Unexpected response {}: {}", body, e)))
        };

        let posted = retry(backoff_config, operation)
            .await
            .map_err(PosterError::Facebook)?;

        tracing::info!("✅ Video posted to Facebook (id: {})", posted.id.as_deref().unwrap_or("unknown"));
        Ok(posted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::{RawQuery, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Form, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const SECRET_TOKEN: &str = "EAAB-page-token";

    fn config() -> FacebookConfig {
        FacebookConfig {
            page_id: "1122334455".to_string(),
            access_token: SECRET_TOKEN.to_string(),
            graph_version: "v19.0".to_string(),
        }
    }

    #[test]
    fn test_videos_url() {
        let client = FacebookClient::new(config());
        assert_eq!(client.videos_url(), "https://graph.facebook.com/v19.0/1122334455/videos");

        let local = FacebookClient::with_graph_url(config(), "http://127.0.0.1:8080/");
        assert_eq!(local.videos_url(), "http://127.0.0.1:8080/v19.0/1122334455/videos");
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(403));
        assert!(!is_transient_status(200));
    }

    #[test]
    fn test_response_parsing() {
        let parsed: VideoPostResponse = serde_json::from_str(r#"{"id": "10158"}"#).unwrap();
        assert_eq!(parsed.id.as_deref(), Some("10158"));
        let empty: VideoPostResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.id, None);
    }

    #[tokio::test]
    async fn test_unreachable_host_gives_up() {
        let client = FacebookClient::with_graph_url(config(), "http://127.0.0.1:9")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(200));
        let result = client.post_video("https://cdn/merged.mp4", "title").await;
        match result {
            Err(PosterError::Facebook(message)) => {
                assert!(!message.contains(SECRET_TOKEN), "token leaked: {}", message)
            }
            other => panic!("expected Facebook error, got {:?}", other),
        }
    }

    #[derive(Default)]
    struct GraphStub {
        calls: AtomicUsize,
        failures_before_success: usize,
        failure_status: u16,
        bodies: Mutex<Vec<HashMap<String, String>>>,
        queries: Mutex<Vec<Option<String>>>,
    }

    async fn videos(
        State(stub): State<Arc<GraphStub>>,
        RawQuery(query): RawQuery,
        Form(body): Form<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        let call = stub.calls.fetch_add(1, Ordering::SeqCst);
        stub.bodies.lock().unwrap().push(body);
        stub.queries.lock().unwrap().push(query);
        if call < stub.failures_before_success {
            let status = StatusCode::from_u16(stub.failure_status).unwrap();
            return (status, r#"{"error":{"message":"try later"}}"#.to_string());
        }
        (StatusCode::OK, r#"{"id":"10158"}"#.to_string())
    }

    async fn graph(stub: Arc<GraphStub>) -> FacebookClient {
        let app = Router::new()
            .route("/v19.0/1122334455/videos", post(videos))
            .with_state(stub);
        let base = serve(app).await;
        FacebookClient::with_graph_url(config(), &base)
            .with_backoff(Duration::from_millis(10), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_retries_unavailable_then_posts() {
        let stub = Arc::new(GraphStub {
            failures_before_success: 2,
            failure_status: 503,
            ..Default::default()
        });
        let client = graph(stub.clone()).await;

        let posted = client.post_video("https://cdn/merged.mp4", "Stay Strong").await.unwrap();

        assert_eq!(posted.id.as_deref(), Some("10158"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_rate_limit() {
        let stub = Arc::new(GraphStub {
            failures_before_success: 1,
            failure_status: 429,
            ..Default::default()
        });
        let client = graph(stub.clone()).await;

        assert!(client.post_video("https://cdn/merged.mp4", "t").await.is_ok());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_sent_in_body_not_url() {
        let stub = Arc::new(GraphStub::default());
        let client = graph(stub.clone()).await;

        client.post_video("https://cdn/merged.mp4", "Stay Strong #quotes").await.unwrap();

        let bodies = stub.bodies.lock().unwrap();
        assert_eq!(bodies[0].get("access_token").map(String::as_str), Some(SECRET_TOKEN));
        assert_eq!(bodies[0].get("file_url").map(String::as_str), Some("https://cdn/merged.mp4"));
        assert_eq!(bodies[0].get("description").map(String::as_str), Some("Stay Strong #quotes"));
        assert_eq!(bodies[0].get("privacy").map(String::as_str), Some(PUBLIC_PRIVACY));
        assert!(stub.queries.lock().unwrap()[0].is_none());
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let stub = Arc::new(GraphStub {
            failures_before_success: usize::MAX,
            failure_status: 400,
            ..Default::default()
        });
        let client = graph(stub.clone()).await;

        let result = client.post_video("https://cdn/merged.mp4", "t").await;

        match result {
            Err(PosterError::Facebook(message)) => {
                assert!(message.contains("400"));
                assert!(!message.contains(SECRET_TOKEN));
            }
            other => panic!("expected Facebook error, got {:?}", other),
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }
}
