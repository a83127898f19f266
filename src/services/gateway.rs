//! Outbound SMS gateway client.
//!
//! The satellite messaging gateway is an external collaborator: it accepts
//! pre-segmented message bodies and returns a delivery receipt. Transport
//! mechanics (store-and-forward, satellite scheduling) are its problem,
//! not ours.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Receipt returned by the gateway for an accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    segments: &'a [String],
}

/// Client for the gateway's send endpoint.
#[derive(Debug, Clone)]
pub struct SmsGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SmsGateway {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Deliver ordered segments to one phone number.
    pub async fn send(&self, to: &str, segments: &[String]) -> Result<DeliveryReceipt, AppError> {
        if segments.is_empty() {
            return Err(AppError::Gateway("refusing to send empty message".to_string()));
        }

        let url = format!("{}/messages", self.base_url);
        let mut request = self.client.post(&url).json(&SendRequest { to, segments });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("gateway receipt parse error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn segments() -> Vec<String> {
        vec!["1/2 LAKEO 863m 24h".to_string(), "2/2 06h 7C D1".to_string()]
    }

    #[tokio::test]
    async fn test_send_posts_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({
                "to": "+14155550100",
                "segments": ["1/2 LAKEO 863m 24h", "2/2 06h 7C D1"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message_id": "msg-42",
                "accepted": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SmsGateway::new(&server.uri(), None, Duration::from_secs(2));
        let receipt = gateway.send("+14155550100", &segments()).await.unwrap();
        assert_eq!(receipt.message_id, "msg-42");
        assert!(receipt.accepted);
    }

    #[tokio::test]
    async fn test_send_carries_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message_id": "msg-1",
                "accepted": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SmsGateway::new(
            &server.uri(),
            Some("sekrit".to_string()),
            Duration::from_secs(2),
        );
        gateway.send("+4791234567", &segments()).await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = SmsGateway::new(&server.uri(), None, Duration::from_secs(2));
        assert!(matches!(
            gateway.send("+14155550100", &segments()).await,
            Err(AppError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_network() {
        let gateway = SmsGateway::new("http://localhost:1", None, Duration::from_secs(1));
        assert!(matches!(
            gateway.send("+14155550100", &[]).await,
            Err(AppError::Gateway(_))
        ));
    }
}
