use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::device::DiscoveredDevice;
use crate::domain::ports::device::{DeviceError, DeviceLink, DeviceTransport};

const REASON: &str = "no device transport is available on this host";

/// Transport for hosts without any way to reach the wearable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedTransport;

#[async_trait]
impl DeviceTransport for UnsupportedTransport {
    async fn discover(&self, _window: Duration) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        Err(DeviceError::CapabilityUnsupported(REASON.to_string()))
    }

    async fn authorized_devices(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        Err(DeviceError::CapabilityUnsupported(REASON.to_string()))
    }

    async fn connect(&self, _device: &DiscoveredDevice) -> Result<DeviceLink, DeviceError> {
        Err(DeviceError::CapabilityUnsupported(REASON.to_string()))
    }
}
