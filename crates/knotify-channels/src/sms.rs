//! SMS channel — one POST per message against a REST SMS gateway.

use async_trait::async_trait;

use knotify_core::config::SmsChannelConfig;
use knotify_core::types::ChannelKind;

use crate::phone;
use crate::sender::{ChannelSender, SendOutcome};

/// SMS sender backed by a bearer-auth REST gateway.
pub struct SmsSender {
    config: SmsChannelConfig,
    client: reqwest::Client,
}

impl SmsSender {
    pub fn new(config: SmsChannelConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, destination: &str, body: &str) -> SendOutcome {
        // A bad number is a per-item failure, never a loop-stopping error.
        let Some(to) = phone::normalize(destination, &self.config.country_code) else {
            return SendOutcome::failed(format!("invalid phone number: {destination}"));
        };

        let payload = serde_json::json!({
            "to": to,
            "from": self.config.sender_id,
            "body": body,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await;

        let resp = match response {
            Ok(r) => r,
            Err(e) => return SendOutcome::failed(format!("SMS gateway unreachable: {e}")),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return SendOutcome::failed(format!(
                "SMS gateway error {status}: {}",
                text.chars().take(200).collect::<String>()
            ));
        }

        match resp.json::<serde_json::Value>().await {
            Ok(json) => {
                let provider_id = json["message_id"]
                    .as_str()
                    .or_else(|| json["id"].as_str())
                    .unwrap_or("")
                    .to_string();
                tracing::debug!("SMS accepted for {to} (provider id: {provider_id})");
                SendOutcome::Delivered { provider_id }
            }
            Err(e) => SendOutcome::failed(format!("SMS gateway response unparseable: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SmsSender {
        SmsSender::new(SmsChannelConfig {
            enabled: true,
            api_url: "http://127.0.0.1:9/v1/messages".into(),
            api_key: "test".into(),
            sender_id: "Knotify".into(),
            country_code: "1".into(),
        })
    }

    #[tokio::test]
    async fn test_invalid_number_fails_without_dispatch() {
        let outcome = sender().send("nope", "hi").await;
        match outcome {
            SendOutcome::Failed { error } => assert!(error.contains("invalid phone")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_a_failure_outcome() {
        // Port 9 (discard) refuses connections; the loop must get a Failed
        // value back, not an Err.
        let outcome = sender().send("+15551234567", "hi").await;
        assert!(matches!(outcome, SendOutcome::Failed { .. }));
    }
}
