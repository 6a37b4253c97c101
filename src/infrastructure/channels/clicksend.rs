use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::config::{config_or_env, ClickSendConfig};
use crate::domain::entities::dispatch::SendOutcome;
use crate::domain::ports::channel::{ChannelError, NotificationChannel};
use crate::domain::value_objects::channel_kind::ChannelKind;

const CLICKSEND_SMS_URL: &str = "https://rest.clicksend.com/v3/sms/send";

/// Credentials needed before anything can be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickSendCredentials {
    pub username: String,
    pub api_key: String,
    pub from: String,
}

impl ClickSendCredentials {
    /// Resolve credentials from config, falling back to `CLICKSEND_*` env vars.
    ///
    /// # Errors
    ///
    /// Returns the list of missing settings.
    pub fn resolve(config: &ClickSendConfig) -> Result<Self, String> {
        let username = config_or_env(config.username.as_deref(), "CLICKSEND_USERNAME");
        let api_key = config_or_env(config.api_key.as_deref(), "CLICKSEND_API_KEY");
        let from = config_or_env(config.from.as_deref(), "CLICKSEND_PHONE_NUMBER");

        match (username, api_key, from) {
            (Some(username), Some(api_key), Some(from)) => Ok(Self {
                username,
                api_key,
                from,
            }),
            (username, api_key, from) => {
                let missing: Vec<&str> = [
                    (username.is_none(), "username (CLICKSEND_USERNAME)"),
                    (api_key.is_none(), "api key (CLICKSEND_API_KEY)"),
                    (from.is_none(), "sender number (CLICKSEND_PHONE_NUMBER)"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(format!("missing {}", missing.join(", ")))
            }
        }
    }
}

/// SMS through the ClickSend REST API.
///
/// Built even without credentials so that the gap shows up as a failed
/// attempt on every dispatch.
pub struct ClickSendChannel {
    credentials: Result<ClickSendCredentials, String>,
    client: reqwest::Client,
    endpoint: String,
}

impl ClickSendChannel {
    #[must_use]
    pub fn new(credentials: Result<ClickSendCredentials, String>, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
            endpoint: CLICKSEND_SMS_URL.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ClickSendConfig, client: reqwest::Client) -> Self {
        Self::new(ClickSendCredentials::resolve(config), client)
    }

    fn request(
        &self,
        credentials: &ClickSendCredentials,
        destination: &str,
        body: &str,
    ) -> reqwest::RequestBuilder {
        let payload = json!({
            "messages": [{
                "source": "sdk",
                "from": credentials.from,
                "to": destination,
                "body": body,
            }]
        });
        self.client
            .post(&self.endpoint)
            .basic_auth(&credentials.username, Some(&credentials.api_key))
            .json(&payload)
    }

    async fn try_send(
        &self,
        destination: &str,
        body: &str,
    ) -> Result<Option<String>, ChannelError> {
        let credentials = self
            .credentials
            .as_ref()
            .map_err(|reason| ChannelError::NotConfigured {
                channel: ChannelKind::ClickSendSms,
                reason: reason.clone(),
            })?;

        let response = self
            .request(credentials, destination, body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let status_ok = response.status().is_success();
        let text = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        parse_response(status_ok, &text)
    }
}

#[async_trait]
impl NotificationChannel for ClickSendChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ClickSendSms
    }

    async fn send(&self, destination: &str, body: &str) -> SendOutcome {
        match self.try_send(destination, body).await {
            Ok(message_id) => SendOutcome::delivered(message_id),
            Err(e) => e.into(),
        }
    }
}

#[derive(Deserialize)]
struct ClickSendResponse {
    http_code: Option<u16>,
    response_msg: Option<String>,
    data: Option<ClickSendData>,
}

#[derive(Deserialize)]
struct ClickSendData {
    #[serde(default)]
    messages: Vec<ClickSendMessage>,
}

#[derive(Deserialize)]
struct ClickSendMessage {
    message_id: Option<String>,
}

/// Delivered iff the HTTP status was 2xx and the body reports `http_code` 200.
fn parse_response(status_ok: bool, body: &str) -> Result<Option<String>, ChannelError> {
    let parsed: ClickSendResponse = serde_json::from_str(body)
        .map_err(|e| {
            ChannelError::InvalidResponse(format!("failed to parse ClickSend body: {e}"))
        })?;

    if status_ok && parsed.http_code == Some(200) {
        let message_id = parsed
            .data
            .and_then(|d| d.messages.into_iter().next())
            .and_then(|m| m.message_id);
        Ok(message_id)
    } else {
        Err(ChannelError::Rejected(
            parsed
                .response_msg
                .unwrap_or_else(|| "Failed to send SMS via Clicksend".to_string()),
        ))
    }
}
