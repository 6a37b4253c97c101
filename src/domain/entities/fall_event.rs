use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::dispatch::DispatchResult;
use crate::domain::value_objects::trigger_source::TriggerSource;

/// Lifecycle of the single fall event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FallState {
    /// Monitoring is off; triggers are rejected
    #[default]
    Idle,
    /// Armed and waiting for a trigger
    Monitoring,
    /// Trigger received, confirmation countdown running
    Detected,
    /// Contacts are being notified
    Escalating,
    /// Dispatch finished; transient before returning to monitoring
    Resolved,
}

impl FallState {
    /// A fall event is in progress and further triggers are ignored.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Detected | Self::Escalating)
    }
}

impl std::fmt::Display for FallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Detected => write!(f, "detected"),
            Self::Escalating => write!(f, "escalating"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Observable snapshot of the fall event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallEvent {
    pub state: FallState,
    pub detected_at: Option<DateTime<Utc>>,
    pub source: Option<TriggerSource>,
    pub countdown_remaining: Duration,
    /// Last completed dispatch, kept across returns to monitoring.
    pub outcome: Option<DispatchResult>,
    /// Displayable reason for the last configuration failure.
    pub error: Option<String>,
}

impl FallEvent {
    #[must_use]
    pub const fn idle(countdown: Duration) -> Self {
        Self {
            state: FallState::Idle,
            detected_at: None,
            source: None,
            countdown_remaining: countdown,
            outcome: None,
            error: None,
        }
    }

    /// Whole seconds left on the countdown, rounded up.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        let secs = self.countdown_remaining.as_secs();
        if self.countdown_remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// The last dispatch ran and nobody was reached.
    #[must_use]
    pub fn last_dispatch_failed(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| !o.overall_success)
    }
}
