use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::entities::device::DiscoveredDevice;
use crate::domain::ports::device::{DeviceError, DeviceLink, DeviceTransport, LinkEvent, LinkHandle};

type Links = Arc<Mutex<HashMap<String, mpsc::Sender<LinkEvent>>>>;

#[derive(Default)]
struct World {
    nearby: Vec<DiscoveredDevice>,
    authorized: Vec<DiscoveredDevice>,
    refused: HashSet<String>,
}

/// In-process stand-in for a radio.
///
/// Devices are declared up front; tests and demo runs push payloads or drop
/// links by device id.
#[derive(Default)]
pub struct SimulatedTransport {
    world: Mutex<World>,
    links: Links,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SimulatedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport with one paired wearable in range.
    #[must_use]
    pub fn with_demo_device() -> Self {
        let transport = Self::new();
        transport.authorize(DiscoveredDevice::new("SIM-0001", Some("SmartStep")));
        transport
    }

    /// Make `device` show up in scans.
    pub fn add_nearby(&self, device: DiscoveredDevice) {
        let mut world = lock(&self.world);
        if !world.nearby.contains(&device) {
            world.nearby.push(device);
        }
    }

    /// Pair `device` with the host; paired devices are also in range.
    pub fn authorize(&self, device: DiscoveredDevice) {
        self.add_nearby(device.clone());
        let mut world = lock(&self.world);
        if !world.authorized.contains(&device) {
            world.authorized.push(device);
        }
    }

    pub fn refuse_connections_to(&self, id: &str) {
        lock(&self.world).refused.insert(id.to_string());
    }

    #[must_use]
    pub fn is_connected(&self, id: &str) -> bool {
        lock(&self.links).contains_key(id)
    }

    /// Deliver a notification payload. Returns false if `id` is not connected.
    pub async fn notify(&self, id: &str, payload: &[u8]) -> bool {
        let sender = lock(&self.links).get(id).cloned();
        match sender {
            Some(sender) => sender.send(LinkEvent::Payload(payload.to_vec())).await.is_ok(),
            None => false,
        }
    }

    /// The device walks out of range.
    pub async fn drop_link(&self, id: &str) {
        let sender = lock(&self.links).remove(id);
        if let Some(sender) = sender {
            if sender.send(LinkEvent::Lost).await.is_err() {
                tracing::debug!(device = %id, "Link already closed by the host");
            }
        }
    }
}

struct SimulatedLink {
    id: String,
    links: Links,
}

#[async_trait]
impl LinkHandle for SimulatedLink {
    async fn disconnect(&self) -> Result<(), DeviceError> {
        lock(&self.links).remove(&self.id);
        Ok(())
    }
}

#[async_trait]
impl DeviceTransport for SimulatedTransport {
    async fn discover(&self, _window: Duration) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        Ok(lock(&self.world).nearby.clone())
    }

    async fn authorized_devices(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        Ok(lock(&self.world).authorized.clone())
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<DeviceLink, DeviceError> {
        if lock(&self.world).refused.contains(&device.id) {
            return Err(DeviceError::Connection(format!(
                "{} refused the connection",
                device.display_name()
            )));
        }
        let (tx, rx) = mpsc::channel(16);
        lock(&self.links).insert(device.id.clone(), tx);
        Ok(DeviceLink {
            handle: Box::new(SimulatedLink {
                id: device.id.clone(),
                links: Arc::clone(&self.links),
            }),
            events: rx,
        })
    }
}
