use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::entities::dispatch::SendOutcome;
use crate::domain::ports::channel::{ChannelError, NotificationChannel};
use crate::domain::value_objects::channel_kind::ChannelKind;

/// Webhook payload format, auto-detected from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebhookFormat {
    Slack,
    Discord,
    Generic,
}

const ALERT_COLOR_HEX: &str = "#E74C3C";
const ALERT_COLOR_DECIMAL: u32 = 0x00_E7_4C_3C;

/// Posts the fall alert to a caretaker webhook.
///
/// Slack gets an attachment with blocks, Discord an embed, anything else a
/// flat JSON object. The contact's phone number travels in the payload so
/// the receiving side knows who was meant to be called.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    #[must_use]
    pub const fn new(url: String, client: reqwest::Client) -> Self {
        Self { url, client }
    }

    fn detect_format(&self) -> WebhookFormat {
        // Compare the host only, not a substring of the whole URL
        let host = self
            .url
            .split("//")
            .nth(1)
            .and_then(|s| s.split('/').next())
            .and_then(|h| h.split(':').next())
            .unwrap_or("");

        match host {
            "hooks.slack.com" => WebhookFormat::Slack,
            "discord.com" | "discordapp.com" => WebhookFormat::Discord,
            _ => WebhookFormat::Generic,
        }
    }

    fn payload(&self, destination: &str, body: &str) -> Value {
        match self.detect_format() {
            WebhookFormat::Slack => Self::payload_slack(destination, body),
            WebhookFormat::Discord => Self::payload_discord(destination, body),
            WebhookFormat::Generic => Self::payload_generic(destination, body),
        }
    }

    fn payload_slack(destination: &str, body: &str) -> Value {
        json!({
            "text": body,
            "attachments": [{
                "color": ALERT_COLOR_HEX,
                "blocks": [
                    {
                        "type": "header",
                        "text": { "type": "plain_text", "text": "\u{1F6A8} FallSentry: fall alert" }
                    },
                    {
                        "type": "section",
                        "text": { "type": "mrkdwn", "text": body }
                    },
                    {
                        "type": "context",
                        "elements": [{ "type": "mrkdwn", "text": format!("Emergency contact: `{destination}`") }]
                    }
                ]
            }]
        })
    }

    fn payload_discord(destination: &str, body: &str) -> Value {
        json!({
            "username": "FallSentry",
            "embeds": [{
                "title": "\u{1F6A8} Fall alert",
                "description": body,
                "color": ALERT_COLOR_DECIMAL,
                "fields": [
                    { "name": "Emergency contact", "value": destination, "inline": true }
                ],
                "timestamp": Utc::now().to_rfc3339(),
            }]
        })
    }

    fn payload_generic(destination: &str, body: &str) -> Value {
        json!({
            "source": "fallsentry",
            "type": "fall_alert",
            "destination": destination,
            "message": body,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    async fn try_send(&self, destination: &str, body: &str) -> Result<(), ChannelError> {
        if self.url.trim().is_empty() {
            return Err(ChannelError::NotConfigured {
                channel: ChannelKind::Webhook,
                reason: "empty webhook url".to_string(),
            });
        }
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(destination, body))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Rejected(format!("HTTP {}", response.status())))
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, destination: &str, body: &str) -> SendOutcome {
        match self.try_send(destination, body).await {
            Ok(()) => SendOutcome::delivered(None),
            Err(e) => e.into(),
        }
    }
}
