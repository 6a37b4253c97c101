use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::entities::device::{DiscoveredDevice, SessionStatus};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device discovery is not supported on this host: {0}")]
    CapabilityUnsupported(String),
    #[error("could not connect to device: {0}")]
    Connection(String),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("not allowed while the session is {0}")]
    InvalidState(SessionStatus),
}

/// Something the device sent, or the loss of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Raw notification payload
    Payload(Vec<u8>),
    /// The device or the host dropped the connection
    Lost,
}

/// Control side of an open device connection.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    /// Close the connection from our side.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Connection` if the transport refuses to close.
    async fn disconnect(&self) -> Result<(), DeviceError>;
}

/// An open connection: a handle to close it and the stream of what it sends.
///
/// A closed `events` channel means the link is gone, same as `LinkEvent::Lost`.
pub struct DeviceLink {
    pub handle: Box<dyn LinkHandle>,
    pub events: mpsc::Receiver<LinkEvent>,
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink").finish_non_exhaustive()
    }
}

/// Host capability to find and open wearable devices.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Scan for nearby devices during `window`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::CapabilityUnsupported` if the host has no
    /// discovery capability, or `DeviceError::Connection` if the scan fails.
    async fn discover(&self, window: Duration) -> Result<Vec<DiscoveredDevice>, DeviceError>;

    /// Devices the host already authorized (paired) that are reachable now.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::CapabilityUnsupported` if the host cannot list them.
    async fn authorized_devices(&self) -> Result<Vec<DiscoveredDevice>, DeviceError>;

    /// Open a connection and subscribe to the device's notifications.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Connection` or `DeviceError::NotFound` on failure.
    async fn connect(&self, device: &DiscoveredDevice) -> Result<DeviceLink, DeviceError>;
}
