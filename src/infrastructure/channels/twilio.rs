use async_trait::async_trait;
use serde::Deserialize;

use crate::application::config::{config_or_env, TwilioConfig};
use crate::domain::entities::dispatch::SendOutcome;
use crate::domain::ports::channel::{ChannelError, NotificationChannel};
use crate::domain::value_objects::channel_kind::ChannelKind;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Which Twilio product carries the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwilioMode {
    Sms,
    WhatsApp,
}

impl TwilioMode {
    const fn kind(self) -> ChannelKind {
        match self {
            Self::Sms => ChannelKind::TwilioSms,
            Self::WhatsApp => ChannelKind::TwilioWhatsApp,
        }
    }

    fn address(self, number: &str) -> String {
        match self {
            Self::Sms => number.to_string(),
            Self::WhatsApp if number.starts_with("whatsapp:") => number.to_string(),
            Self::WhatsApp => format!("whatsapp:{number}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
}

impl TwilioCredentials {
    /// Resolve credentials for `mode`, falling back to `TWILIO_*` env vars.
    ///
    /// # Errors
    ///
    /// Returns the list of missing settings.
    pub fn resolve(config: &TwilioConfig, mode: TwilioMode) -> Result<Self, String> {
        let account_sid = config_or_env(config.account_sid.as_deref(), "TWILIO_ACCOUNT_SID");
        let auth_token = config_or_env(config.auth_token.as_deref(), "TWILIO_AUTH_TOKEN");
        let (from, from_var) = match mode {
            TwilioMode::Sms => (
                config_or_env(config.from_sms.as_deref(), "TWILIO_FROM_NUMBER"),
                "TWILIO_FROM_NUMBER",
            ),
            TwilioMode::WhatsApp => (
                config_or_env(config.from_whatsapp.as_deref(), "TWILIO_WHATSAPP_FROM"),
                "TWILIO_WHATSAPP_FROM",
            ),
        };

        match (account_sid, auth_token, from) {
            (Some(account_sid), Some(auth_token), Some(from)) => Ok(Self {
                account_sid,
                auth_token,
                from,
            }),
            (sid, token, from) => {
                let mut missing = Vec::new();
                if sid.is_none() {
                    missing.push("account sid (TWILIO_ACCOUNT_SID)".to_string());
                }
                if token.is_none() {
                    missing.push("auth token (TWILIO_AUTH_TOKEN)".to_string());
                }
                if from.is_none() {
                    missing.push(format!("sender number ({from_var})"));
                }
                Err(format!("missing {}", missing.join(", ")))
            }
        }
    }
}

/// SMS or WhatsApp through the Twilio Messages API.
pub struct TwilioChannel {
    mode: TwilioMode,
    credentials: Result<TwilioCredentials, String>,
    client: reqwest::Client,
    api_base: String,
}

impl TwilioChannel {
    #[must_use]
    pub fn new(
        mode: TwilioMode,
        credentials: Result<TwilioCredentials, String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            mode,
            credentials,
            client,
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TwilioConfig, mode: TwilioMode, client: reqwest::Client) -> Self {
        Self::new(mode, TwilioCredentials::resolve(config, mode), client)
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request(
        &self,
        credentials: &TwilioCredentials,
        destination: &str,
        body: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            credentials.account_sid
        );
        let form = [
            ("To", self.mode.address(destination)),
            ("From", self.mode.address(&credentials.from)),
            ("Body", body.to_string()),
        ];
        self.client
            .post(url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&form)
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
                channel: self.mode.kind(),
                reason: reason.clone(),
            })?;

        let response = self
            .request(credentials, destination, body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        parse_response(status.is_success(), status.as_u16(), &text)
    }
}

#[async_trait]
impl NotificationChannel for TwilioChannel {
    fn kind(&self) -> ChannelKind {
        self.mode.kind()
    }

    async fn send(&self, destination: &str, body: &str) -> SendOutcome {
        match self.try_send(destination, body).await {
            Ok(sid) => SendOutcome::delivered(sid),
            Err(e) => e.into(),
        }
    }
}

#[derive(Deserialize)]
struct TwilioResponse {
    sid: Option<String>,
    message: Option<String>,
    code: Option<u32>,
}

fn parse_response(
    status_ok: bool,
    status: u16,
    body: &str,
) -> Result<Option<String>, ChannelError> {
    let parsed: Option<TwilioResponse> = serde_json::from_str(body).ok();

    if status_ok {
        return match parsed {
            Some(response) => Ok(response.sid),
            None => Err(ChannelError::InvalidResponse(
                "failed to parse Twilio body".to_string(),
            )),
        };
    }

    let reason = match parsed {
        Some(TwilioResponse {
            message: Some(message),
            code: Some(code),
            ..
        }) => format!("{message} (code {code})"),
        Some(TwilioResponse {
            message: Some(message),
            ..
        }) => message,
        _ => format!("HTTP {status}"),
    };
    Err(ChannelError::Rejected(reason))
}
