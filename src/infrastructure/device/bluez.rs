use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bluer::{Adapter, AdapterEvent, Address, Device, Session, Uuid};
use futures::stream::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::domain::entities::device::DiscoveredDevice;
use crate::domain::ports::device::{DeviceError, DeviceLink, DeviceTransport, LinkEvent, LinkHandle};

fn connection_error(e: bluer::Error) -> DeviceError {
    DeviceError::Connection(e.to_string())
}

/// BLE transport through the BlueZ D-Bus API.
///
/// Subscribes to GATT notifications on one characteristic of one service.
pub struct BluezTransport {
    adapter: Adapter,
    service: Uuid,
    characteristic: Uuid,
    _session: Session,
}

impl BluezTransport {
    /// Open a BlueZ session on the default adapter and power it on.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::CapabilityUnsupported` if bluetoothd or an
    /// adapter is unavailable, or if a UUID does not parse.
    pub async fn new(service_uuid: &str, characteristic_uuid: &str) -> Result<Self, DeviceError> {
        let unsupported = |e: bluer::Error| DeviceError::CapabilityUnsupported(e.to_string());
        let service = Uuid::parse_str(service_uuid)
            .map_err(|e| DeviceError::CapabilityUnsupported(format!("invalid service uuid: {e}")))?;
        let characteristic = Uuid::parse_str(characteristic_uuid).map_err(|e| {
            DeviceError::CapabilityUnsupported(format!("invalid characteristic uuid: {e}"))
        })?;

        let session = Session::new().await.map_err(unsupported)?;
        let adapter = session.default_adapter().await.map_err(unsupported)?;
        adapter.set_powered(true).await.map_err(unsupported)?;
        tracing::info!(adapter = adapter.name(), "Bluetooth adapter ready");

        Ok(Self {
            adapter,
            service,
            characteristic,
            _session: session,
        })
    }

    async fn describe(&self, address: Address) -> Result<(Device, DiscoveredDevice), DeviceError> {
        let device = self.adapter.device(address).map_err(connection_error)?;
        let name = device.name().await.map_err(connection_error)?;
        let discovered = DiscoveredDevice {
            id: address.to_string(),
            name,
        };
        Ok((device, discovered))
    }

    async fn advertises_service(&self, device: &Device) -> bool {
        match device.uuids().await {
            Ok(Some(uuids)) => uuids.contains(&self.service),
            _ => false,
        }
    }
}

#[async_trait]
impl DeviceTransport for BluezTransport {
    async fn discover(&self, window: Duration) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        let events = self.adapter.discover_devices().await.map_err(connection_error)?;
        let mut events = Box::pin(events);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => break,
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(address)) if seen.insert(address) => {
                        let (device, discovered) = self.describe(address).await?;
                        if self.advertises_service(&device).await {
                            tracing::debug!(device = %discovered.id, "Wearable found");
                            found.push(discovered);
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
        Ok(found)
    }

    async fn authorized_devices(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        let addresses = self.adapter.device_addresses().await.map_err(connection_error)?;
        let mut paired = Vec::new();
        for address in addresses {
            let (device, discovered) = self.describe(address).await?;
            if device.is_paired().await.unwrap_or(false) {
                paired.push(discovered);
            }
        }
        Ok(paired)
    }

    async fn connect(&self, target: &DiscoveredDevice) -> Result<DeviceLink, DeviceError> {
        let address: Address = target
            .id
            .parse()
            .map_err(|_| DeviceError::NotFound(format!("not a Bluetooth address: {}", target.id)))?;
        let device = self.adapter.device(address).map_err(connection_error)?;
        if !device.is_connected().await.map_err(connection_error)? {
            device.connect().await.map_err(connection_error)?;
        }

        let mut characteristic = None;
        for service in device.services().await.map_err(connection_error)? {
            if service.uuid().await.map_err(connection_error)? != self.service {
                continue;
            }
            for candidate in service.characteristics().await.map_err(connection_error)? {
                if candidate.uuid().await.map_err(connection_error)? == self.characteristic {
                    characteristic = Some(candidate);
                }
            }
        }
        let characteristic = characteristic.ok_or_else(|| {
            DeviceError::NotFound(format!("{} has no fall characteristic", target.display_name()))
        })?;

        let (tx, rx) = mpsc::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let listener_stop = stop.clone();

        tokio::spawn(async move {
            let stream = match characteristic.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(connection_error(e)));
                    return;
                }
            };
            let mut stream = Box::pin(stream);
            loop {
                tokio::select! {
                    () = listener_stop.cancelled() => return,
                    value = stream.next() => match value {
                        Some(value) => {
                            if tx.send(LinkEvent::Payload(value)).await.is_err() {
                                return;
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = tx.send(LinkEvent::Lost).await;
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(DeviceError::Connection(
                    "notification listener ended early".to_string(),
                ))
            }
        }

        Ok(DeviceLink {
            handle: Box::new(BluezLink { device, stop }),
            events: rx,
        })
    }
}

struct BluezLink {
    device: Device,
    stop: CancellationToken,
}

#[async_trait]
impl LinkHandle for BluezLink {
    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.stop.cancel();
        self.device.disconnect().await.map_err(connection_error)
    }
}
