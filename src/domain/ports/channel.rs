use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::dispatch::SendOutcome;
use crate::domain::value_objects::channel_kind::ChannelKind;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("{channel} is not configured: {reason}")]
    NotConfigured { channel: ChannelKind, reason: String },
    #[error("provider rejected the message: {0}")]
    Rejected(String),
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<ChannelError> for SendOutcome {
    fn from(err: ChannelError) -> Self {
        Self::failed(err.to_string())
    }
}

/// A transport that can deliver one text message to one destination.
///
/// Implementations never fail the caller: every problem, including missing
/// credentials, is reported through [`SendOutcome::error`] so that sibling
/// sends keep going.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Identifier recorded on each dispatch attempt.
    fn kind(&self) -> ChannelKind;

    /// Send `body` to `destination` (an E.164 phone number).
    async fn send(&self, destination: &str, body: &str) -> SendOutcome;
}
