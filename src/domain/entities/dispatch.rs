use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::contact::EmergencyContact;
use crate::domain::value_objects::channel_kind::ChannelKind;
use crate::domain::value_objects::trigger_source::TriggerSource;

/// What a channel reports back for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    #[must_use]
    pub fn delivered(provider_message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider_message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// One send to one contact over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub contact: EmergencyContact,
    pub channel: ChannelKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchAttempt {
    #[must_use]
    pub fn from_outcome(
        contact: EmergencyContact,
        channel: ChannelKind,
        outcome: SendOutcome,
    ) -> Self {
        Self {
            contact,
            channel,
            success: outcome.success,
            provider_id: outcome.provider_message_id,
            error: outcome.error,
        }
    }
}

/// Aggregate verdict of one fan-out.
///
/// `overall_success` is true iff at least one attempt succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub overall_success: bool,
    pub attempts: Vec<DispatchAttempt>,
    pub dispatched_at: DateTime<Utc>,
    /// Set when the dispatcher refused to send anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_error: Option<String>,
}

impl DispatchResult {
    #[must_use]
    pub fn from_attempts(attempts: Vec<DispatchAttempt>) -> Self {
        Self {
            overall_success: attempts.iter().any(|a| a.success),
            attempts,
            dispatched_at: Utc::now(),
            configuration_error: None,
        }
    }

    #[must_use]
    pub fn misconfigured(reason: impl Into<String>) -> Self {
        Self {
            overall_success: false,
            attempts: Vec::new(),
            dispatched_at: Utc::now(),
            configuration_error: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.success).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.attempts.len() - self.success_count()
    }

    /// Contacts reached by at least one channel, in attempt order.
    #[must_use]
    pub fn reached_contacts(&self) -> Vec<&EmergencyContact> {
        let mut reached: Vec<&EmergencyContact> = Vec::new();
        for attempt in self.attempts.iter().filter(|a| a.success) {
            if !reached.iter().any(|c| c.id == attempt.contact.id) {
                reached.push(&attempt.contact);
            }
        }
        reached
    }
}

/// A persisted dispatch, as kept in the dispatch log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub source: TriggerSource,
    pub result: DispatchResult,
}
