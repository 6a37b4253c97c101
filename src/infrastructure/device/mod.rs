#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod simulated;
pub mod unsupported;

use std::sync::Arc;

use crate::application::config::DeviceConfig;
use crate::domain::ports::device::DeviceTransport;

use self::simulated::SimulatedTransport;
use self::unsupported::UnsupportedTransport;

/// Create the device transport named in the configuration.
///
/// Falls back to [`UnsupportedTransport`] when the transport is unknown or
/// cannot start, so that alerting keeps working without a wearable.
pub async fn create_transport(config: &DeviceConfig) -> Arc<dyn DeviceTransport> {
    match config.transport.trim() {
        "simulated" => Arc::new(SimulatedTransport::with_demo_device()),
        "none" | "" => Arc::new(UnsupportedTransport),
        "bluetooth" => bluetooth_transport(config).await,
        other => {
            tracing::warn!(
                transport = %other,
                "unknown device transport, falling back to none"
            );
            Arc::new(UnsupportedTransport)
        }
    }
}

#[cfg(feature = "bluetooth")]
async fn bluetooth_transport(config: &DeviceConfig) -> Arc<dyn DeviceTransport> {
    match bluez::BluezTransport::new(&config.service_uuid, &config.characteristic_uuid).await {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            tracing::warn!("Bluetooth unavailable, device features disabled: {e}");
            Arc::new(UnsupportedTransport)
        }
    }
}

#[cfg(not(feature = "bluetooth"))]
async fn bluetooth_transport(_config: &DeviceConfig) -> Arc<dyn DeviceTransport> {
    tracing::warn!("built without the `bluetooth` feature, device features disabled");
    Arc::new(UnsupportedTransport)
}
