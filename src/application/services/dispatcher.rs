use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::domain::entities::contact::EmergencyContact;
use crate::domain::entities::dispatch::{DispatchAttempt, DispatchResult, SendOutcome};
use crate::domain::ports::channel::NotificationChannel;

/// Fans one message out to every contact over every active channel.
///
/// Holds no state between calls; the same dispatcher can serve concurrent
/// dispatches.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    send_timeout: Duration,
}

impl AlertDispatcher {
    #[must_use]
    pub const fn new(send_timeout: Duration) -> Self {
        Self { send_timeout }
    }

    /// Send `message` to each contact over each channel and wait for all of them.
    ///
    /// Attempts come back contact-major: contacts in input order, channels in
    /// input order within each contact. An empty channel set sends nothing and
    /// returns a result carrying a configuration error.
    pub async fn dispatch(
        &self,
        contacts: &[EmergencyContact],
        channels: &[Arc<dyn NotificationChannel>],
        message: &str,
    ) -> DispatchResult {
        if channels.is_empty() {
            tracing::warn!("No notification channel is active, nothing sent");
            return DispatchResult::misconfigured("no notification channel is configured");
        }

        tracing::info!(
            contacts = contacts.len(),
            channels = channels.len(),
            "Dispatching fall alert"
        );

        let sends = contacts.iter().flat_map(|contact| {
            channels
                .iter()
                .map(move |channel| self.send_one(contact, channel.as_ref(), message))
        });
        let attempts = join_all(sends).await;

        let result = DispatchResult::from_attempts(attempts);
        if result.overall_success {
            tracing::info!(
                delivered = result.success_count(),
                failed = result.failure_count(),
                "Fall alert dispatched"
            );
        } else {
            tracing::warn!(
                failed = result.failure_count(),
                "Fall alert reached no contact"
            );
        }
        result
    }

    async fn send_one(
        &self,
        contact: &EmergencyContact,
        channel: &dyn NotificationChannel,
        message: &str,
    ) -> DispatchAttempt {
        let kind = channel.kind();
        let send = channel.send(&contact.phone, message);
        let outcome = match tokio::time::timeout(self.send_timeout, send).await {
            Ok(outcome) => outcome,
            Err(_) => SendOutcome::failed(format!(
                "timed out after {}s",
                self.send_timeout.as_secs()
            )),
        };

        if let Some(err) = &outcome.error {
            tracing::warn!(contact = %contact.id, channel = %kind, "Send failed: {err}");
        } else {
            tracing::debug!(contact = %contact.id, channel = %kind, "Send delivered");
        }

        DispatchAttempt::from_outcome(contact.clone(), kind, outcome)
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::channel_kind::ChannelKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingChannel {
        kind: ChannelKind,
        succeed: bool,
        delay: Duration,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn new(kind: ChannelKind, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                succeed,
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                succeed: true,
                delay,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, destination: &str, _body: &str) -> SendOutcome {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.sent.lock().expect("lock").push(destination.to_string());
            if self.succeed {
                SendOutcome::delivered(Some(format!("{}-{destination}", self.kind)))
            } else {
                SendOutcome::failed("credentials missing")
            }
        }
    }

    fn contacts(n: usize) -> Vec<EmergencyContact> {
        (0..n)
            .map(|i| {
                EmergencyContact::new(
                    format!("c{i}"),
                    format!("Contact {i}"),
                    format!("+1555000000{i}"),
                )
            })
            .collect()
    }

    fn as_channels(channels: &[Arc<RecordingChannel>]) -> Vec<Arc<dyn NotificationChannel>> {
        channels
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn NotificationChannel>)
            .collect()
    }

    #[tokio::test]
    async fn one_attempt_per_contact_and_channel() {
        let sms = RecordingChannel::new(ChannelKind::TwilioSms, true);
        let whatsapp = RecordingChannel::new(ChannelKind::TwilioWhatsApp, true);
        let channels = as_channels(&[sms.clone(), whatsapp.clone()]);

        let result = AlertDispatcher::default()
            .dispatch(&contacts(3), &channels, "help")
            .await;

        assert_eq!(result.attempts.len(), 6);
        assert!(result.overall_success);
        assert_eq!(sms.sent().len(), 3);
        assert_eq!(whatsapp.sent().len(), 3);
    }

    #[tokio::test]
    async fn attempts_are_contact_major() {
        let channels = as_channels(&[
            RecordingChannel::new(ChannelKind::ClickSendSms, true),
            RecordingChannel::new(ChannelKind::TwilioSms, false),
        ]);

        let result = AlertDispatcher::default()
            .dispatch(&contacts(2), &channels, "help")
            .await;

        let order: Vec<(&str, ChannelKind)> = result
            .attempts
            .iter()
            .map(|a| (a.contact.id.as_str(), a.channel))
            .collect();
        assert_eq!(
            order,
            vec![
                ("c0", ChannelKind::ClickSendSms),
                ("c0", ChannelKind::TwilioSms),
                ("c1", ChannelKind::ClickSendSms),
                ("c1", ChannelKind::TwilioSms),
            ]
        );
    }

    #[tokio::test]
    async fn one_healthy_channel_is_enough() {
        let channels = as_channels(&[
            RecordingChannel::new(ChannelKind::ClickSendSms, false),
            RecordingChannel::new(ChannelKind::TwilioSms, true),
        ]);

        let result = AlertDispatcher::default()
            .dispatch(&contacts(1), &channels, "help")
            .await;

        assert!(result.overall_success);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].error.as_deref(), Some("credentials missing"));
        assert!(result.attempts[1].error.is_none());
        assert!(result.attempts[1].provider_id.is_some());
    }

    #[tokio::test]
    async fn all_failures_is_overall_failure() {
        let channels = as_channels(&[RecordingChannel::new(ChannelKind::ClickSendSms, false)]);

        let result = AlertDispatcher::default()
            .dispatch(&contacts(2), &channels, "help")
            .await;

        assert!(!result.overall_success);
        assert_eq!(result.failure_count(), 2);
    }

    #[tokio::test]
    async fn no_channels_sends_nothing() {
        let result = AlertDispatcher::default()
            .dispatch(&contacts(2), &[], "help")
            .await;

        assert!(!result.overall_success);
        assert!(result.attempts.is_empty());
        assert!(result.configuration_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_channel_times_out_without_blocking_siblings() {
        let slow = RecordingChannel::slow(ChannelKind::Webhook, Duration::from_secs(120));
        let fast = RecordingChannel::new(ChannelKind::TwilioSms, true);
        let channels = as_channels(&[slow, fast]);

        let result = AlertDispatcher::new(Duration::from_secs(5))
            .dispatch(&contacts(1), &channels, "help")
            .await;

        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].success);
        assert!(result.attempts[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")));
        assert!(result.attempts[1].success);
        assert!(result.overall_success);
    }
}
