pub mod clicksend;
pub mod twilio;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use crate::application::config::ChannelsConfig;
use crate::domain::ports::channel::NotificationChannel;

use self::clicksend::ClickSendChannel;
use self::twilio::{TwilioChannel, TwilioMode};
use self::webhook::WebhookChannel;

/// Provider-side request timeout, shorter than the dispatcher's safety net.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Build one channel per configured provider section, in a fixed order:
/// ClickSend, Twilio SMS, Twilio WhatsApp, webhook.
///
/// A section with missing credentials still yields its channel; the gap is
/// reported on each send instead.
#[must_use]
pub fn create_channels(config: &ChannelsConfig) -> Vec<Arc<dyn NotificationChannel>> {
    let client = match reqwest::Client::builder().timeout(PROVIDER_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Failed to build HTTP client with timeout, using defaults: {e}");
            reqwest::Client::new()
        }
    };

    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(clicksend) = &config.clicksend {
        channels.push(Arc::new(ClickSendChannel::from_config(clicksend, client.clone())));
    }
    if let Some(twilio) = &config.twilio {
        if twilio.sms {
            channels.push(Arc::new(TwilioChannel::from_config(
                twilio,
                TwilioMode::Sms,
                client.clone(),
            )));
        }
        if twilio.whatsapp {
            channels.push(Arc::new(TwilioChannel::from_config(
                twilio,
                TwilioMode::WhatsApp,
                client.clone(),
            )));
        }
    }
    if let Some(webhook) = &config.webhook {
        channels.push(Arc::new(WebhookChannel::new(webhook.url.clone(), client)));
    }

    if channels.is_empty() {
        tracing::warn!("No notification channel configured, alerts cannot be delivered");
    }
    channels
}
