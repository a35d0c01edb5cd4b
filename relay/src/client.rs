//! Outbound transport to the analytics vendor.

use async_trait::async_trait;
use rand::Rng as _;
use std::time::Duration;

use crate::config::VendorConfig;
use crate::metrics_defs;
use crate::payload::{self, AnalyticsEvent, EngageDocument, ProfileUpdate};

/// Outbound side of the relay.
///
/// Implemented by [`HttpAnalyticsClient`] in production and by
/// call-recording doubles in tests. Both operations absorb their own
/// failures; nothing here ever propagates an error to a caller.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Deliver one event. Returns whether the vendor accepted it.
    async fn send_event(&self, event: AnalyticsEvent) -> bool;

    /// Apply a profile update. Best effort; the outcome never reaches
    /// the original caller.
    async fn send_profile_update(&self, update: ProfileUpdate) -> bool;
}

pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    config: VendorConfig,
}

impl HttpAnalyticsClient {
    pub fn new(config: VendorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn post_event_once(&self, body: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .http
            .post(self.config.event_url.clone())
            .form(&[("data", body)])
            .timeout(Duration::from_secs(self.config.event_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // The vendor acks an accepted event with a literal "1". A 200
        // carrying anything else is a rejection.
        Ok(status == reqwest::StatusCode::OK && text == "1")
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .retry_base_backoff_ms
            .saturating_mul(1u64 << attempt.min(6));
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalyticsClient {
    async fn send_event(&self, mut event: AnalyticsEvent) -> bool {
        payload::finalize(&mut event, &self.config.token);
        let body = match payload::encode(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(event = event.name, error = %e, "failed to encode event");
                return false;
            }
        };

        // Only transport-level failures are retried. A response from
        // the vendor, accepted or not, is terminal.
        for attempt in 0..self.config.retry_attempts {
            match self.post_event_once(&body).await {
                Ok(accepted) => {
                    if accepted {
                        shared::counter!(metrics_defs::EVENTS_FORWARDED).increment(1);
                    } else {
                        tracing::warn!(event = event.name, "vendor rejected event");
                        shared::counter!(metrics_defs::EVENTS_FAILED).increment(1);
                    }
                    return accepted;
                }
                Err(e) => {
                    tracing::warn!(
                        event = event.name,
                        attempt,
                        error = %e,
                        "event send failed"
                    );
                }
            }

            if attempt + 1 < self.config.retry_attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        shared::counter!(metrics_defs::EVENTS_FAILED).increment(1);
        false
    }

    async fn send_profile_update(&self, update: ProfileUpdate) -> bool {
        let document = EngageDocument::new(&self.config.token, &update);
        let result = self
            .http
            .post(self.config.profile_url.clone())
            .json(&document)
            .timeout(Duration::from_secs(self.config.profile_timeout_secs))
            .send()
            .await;

        let ok = match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!(
                    distinct_id = %update.distinct_id,
                    status = %response.status(),
                    "failed to update user profile"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    distinct_id = %update.distinct_id,
                    error = %e,
                    "failed to update user profile"
                );
                false
            }
        };

        if !ok {
            shared::counter!(metrics_defs::PROFILE_UPDATES_FAILED).increment(1);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Properties, PropValue};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use std::convert::Infallible;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use url::Url;

    /// Stub vendor server that replies with a fixed status and body and
    /// forwards every received request body to the returned channel.
    async fn start_stub(
        status: StatusCode,
        reply: &'static str,
    ) -> (u16, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let tx = tx.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let tx = tx.clone();
                        async move {
                            let bytes = req
                                .into_body()
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_else(|_| Bytes::new());
                            let _ = tx.send(String::from_utf8_lossy(&bytes).to_string());

                            let mut response =
                                Response::new(Full::new(Bytes::from_static(reply.as_bytes())));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        (port, rx)
    }

    fn test_config(port: u16) -> VendorConfig {
        VendorConfig {
            token: "testtoken".to_string(),
            event_url: Url::parse(&format!("http://127.0.0.1:{port}/track")).unwrap(),
            profile_url: Url::parse(&format!("http://127.0.0.1:{port}/engage")).unwrap(),
            event_timeout_secs: 2,
            profile_timeout_secs: 2,
            retry_attempts: 1,
            retry_base_backoff_ms: 10,
        }
    }

    fn sample_event() -> AnalyticsEvent {
        let mut properties = Properties::new();
        properties.insert("page".to_string(), "photo_gallery".into());
        AnalyticsEvent::new("Page View", properties)
    }

    fn sample_update() -> ProfileUpdate {
        let mut set = Properties::new();
        set.insert("$email".to_string(), "user@example.com".into());
        set.insert("total_page_views".to_string(), PropValue::Int(1));
        let mut add = indexmap::IndexMap::new();
        add.insert("total_page_views".to_string(), 1);
        ProfileUpdate {
            distinct_id: "user@example.com".to_string(),
            set,
            add,
        }
    }

    /// Bind and drop a listener so the port refuses connections.
    async fn refused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn accepted_event_returns_true_and_carries_token_and_time() {
        let (port, mut rx) = start_stub(StatusCode::OK, "1").await;
        let client = HttpAnalyticsClient::new(test_config(port));

        assert!(client.send_event(sample_event()).await);

        let raw = rx.recv().await.unwrap();
        let (key, value) = url::form_urlencoded::parse(raw.as_bytes())
            .next()
            .expect("form field");
        assert_eq!(key, "data");

        let decoded = STANDARD.decode(value.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["event"], "Page View");
        assert_eq!(json["properties"]["page"], "photo_gallery");
        assert_eq!(json["properties"]["token"], "testtoken");
        assert!(json["properties"]["time"].is_i64());
    }

    #[tokio::test]
    async fn rejected_body_is_a_failure() {
        let (port, _rx) = start_stub(StatusCode::OK, "0").await;
        let client = HttpAnalyticsClient::new(test_config(port));

        assert!(!client.send_event(sample_event()).await);
    }

    #[tokio::test]
    async fn non_200_status_is_a_failure_even_with_ack_body() {
        let (port, _rx) = start_stub(StatusCode::INTERNAL_SERVER_ERROR, "1").await;
        let client = HttpAnalyticsClient::new(test_config(port));

        assert!(!client.send_event(sample_event()).await);
    }

    #[tokio::test]
    async fn unreachable_vendor_is_absorbed() {
        let mut config = test_config(refused_port().await);
        config.retry_attempts = 3;
        let client = HttpAnalyticsClient::new(config);

        assert!(!client.send_event(sample_event()).await);
    }

    #[tokio::test]
    async fn profile_update_success() {
        let (port, mut rx) = start_stub(StatusCode::OK, "").await;
        let client = HttpAnalyticsClient::new(test_config(port));

        assert!(client.send_profile_update(sample_update()).await);

        let raw = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["$token"], "testtoken");
        assert_eq!(json["$distinct_id"], "user@example.com");
        assert_eq!(json["$set"]["$email"], "user@example.com");
        assert_eq!(json["$add"]["total_page_views"], 1);
    }

    #[tokio::test]
    async fn profile_update_non_200_is_a_failure() {
        let (port, _rx) = start_stub(StatusCode::SERVICE_UNAVAILABLE, "").await;
        let client = HttpAnalyticsClient::new(test_config(port));

        assert!(!client.send_profile_update(sample_update()).await);
    }

    #[tokio::test]
    async fn profile_update_unreachable_is_absorbed() {
        let client = HttpAnalyticsClient::new(test_config(refused_port().await));

        assert!(!client.send_profile_update(sample_update()).await);
    }
}
