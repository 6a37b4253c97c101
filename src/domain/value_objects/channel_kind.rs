use serde::{Deserialize, Serialize};

/// Transport behind a notification channel.
///
/// Used as the channel identifier recorded on every dispatch attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// SMS through the ClickSend REST API
    #[serde(rename = "clicksend_sms")]
    ClickSendSms,
    /// SMS through the Twilio Messages API
    TwilioSms,
    /// WhatsApp through the Twilio Messages API
    #[serde(rename = "twilio_whatsapp")]
    TwilioWhatsApp,
    /// HTTP webhook (Slack, Discord or generic JSON)
    Webhook,
}

impl ChannelKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ClickSendSms => "clicksend-sms",
            Self::TwilioSms => "twilio-sms",
            Self::TwilioWhatsApp => "twilio-whatsapp",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
