//! Notification publishers: structured log output and HTTP webhook delivery.

use async_trait::async_trait;
use serde::Serialize;

use crate::capability::NotificationPublisher;
use crate::error::CapabilityError;

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl NotificationPublisher for LogPublisher {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), CapabilityError> {
        tracing::info!(target: "quarantine::notification", topic = target, subject, "{}", body);
        Ok(())
    }
}

/// A webhook endpoint's answer to a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReply {
    pub status: u16,
    pub body: String,
}

/// HTTP seam for webhook delivery.
#[async_trait]
pub trait WebhookHttpClient: Send + Sync {
    /// POST a JSON payload. `Err` means no reply was received.
    async fn post_json(&self, url: &str, payload: &str) -> Result<WebhookReply, String>;
}

/// Webhook HTTP client using reqwest.
pub struct RealWebhookHttp {
    client: reqwest::Client,
}

impl Default for RealWebhookHttp {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebhookHttpClient for RealWebhookHttp {
    async fn post_json(&self, url: &str, payload: &str) -> Result<WebhookReply, String> {
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(WebhookReply { status, body })
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    topic: &'a str,
    subject: &'a str,
    message: &'a str,
}

/// Delivers notifications as JSON POSTs to an HTTP endpoint.
pub struct WebhookPublisher {
    http: Box<dyn WebhookHttpClient>,
    endpoint: String,
}

impl WebhookPublisher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, Box::new(RealWebhookHttp::default()))
    }

    pub fn with_client(endpoint: impl Into<String>, http: Box<dyn WebhookHttpClient>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NotificationPublisher for WebhookPublisher {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), CapabilityError> {
        let payload = serde_json::to_string(&WebhookPayload {
            topic: target,
            subject,
            message: body,
        })
        .map_err(|e| CapabilityError::transport("Publish", format!("payload encoding: {e}")))?;

        let reply = self
            .http
            .post_json(&self.endpoint, &payload)
            .await
            .map_err(|e| CapabilityError::transport("Publish", e))?;

        if !(200..300).contains(&reply.status) {
            return Err(CapabilityError::rejected(
                "Publish",
                format!("webhook POST failed ({}): {}", reply.status, reply.body),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct MockWebhookHttp {
        reply: Result<WebhookReply, String>,
        posted: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockWebhookHttp {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(WebhookReply {
                    status,
                    body: body.to_string(),
                }),
                posted: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl WebhookHttpClient for MockWebhookHttp {
        async fn post_json(&self, url: &str, payload: &str) -> Result<WebhookReply, String> {
            self.posted
                .lock()
                .unwrap()
                .push((url.to_string(), payload.to_string()));
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_log_publisher_never_fails() {
        assert!(LogPublisher.publish("topic", "subject", "{}").await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_posts_payload() {
        let http = MockWebhookHttp::replying(204, "");
        let posted = http.posted.clone();
        let publisher = WebhookPublisher::with_client("https://hooks.test/alerts", Box::new(http));

        publisher
            .publish("alerts-topic", "GuardDuty auto-response: i-1 quarantined", "{}")
            .await
            .unwrap();

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "https://hooks.test/alerts");
        let payload: serde_json::Value = serde_json::from_str(&posted[0].1).unwrap();
        assert_eq!(payload["topic"], "alerts-topic");
        assert_eq!(payload["subject"], "GuardDuty auto-response: i-1 quarantined");
        assert_eq!(payload["message"], "{}");
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_rejected() {
        let http = MockWebhookHttp::replying(503, "unavailable");
        let publisher = WebhookPublisher::with_client("https://hooks.test/alerts", Box::new(http));

        let err = publisher.publish("t", "s", "{}").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Rejected { .. }));
        let message = err.to_string();
        assert!(message.contains("503"), "{message}");
        assert!(message.contains("unavailable"), "{message}");
    }

    #[tokio::test]
    async fn test_webhook_no_reply_is_transport_failure() {
        let http = MockWebhookHttp {
            reply: Err("connection refused".into()),
            posted: Arc::new(Mutex::new(Vec::new())),
        };
        let publisher = WebhookPublisher::with_client("https://hooks.test/alerts", Box::new(http));

        let err = publisher.publish("t", "s", "{}").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Transport { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_webhook_invalid_endpoint() {
        let publisher = WebhookPublisher::new("not a url");
        let err = publisher
            .publish("arn:aws:sns:us-east-1:123456789012:alerts", "subject", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Transport { .. }));
    }
}
