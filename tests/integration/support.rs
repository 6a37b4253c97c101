#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fallsentry::application::services::dispatcher::AlertDispatcher;
use fallsentry::application::services::fall_state_machine::{EscalationSettings, FallStateMachine};
use fallsentry::domain::entities::contact::EmergencyContact;
use fallsentry::domain::entities::device::DiscoveredDevice;
use fallsentry::domain::entities::dispatch::SendOutcome;
use fallsentry::domain::entities::fall_event::FallEvent;
use fallsentry::domain::ports::channel::NotificationChannel;
use fallsentry::domain::ports::device::{DeviceError, DeviceLink, DeviceTransport};
use fallsentry::domain::ports::store::{ContactStore, DispatchLogStore};
use fallsentry::domain::value_objects::channel_kind::ChannelKind;
use fallsentry::infrastructure::device::simulated::SimulatedTransport;
use fallsentry::infrastructure::persistence::in_memory_store::InMemoryStore;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// ScriptedChannel
// ---------------------------------------------------------------------------

pub struct ScriptedChannel {
    kind: ChannelKind,
    failure: Option<String>,
    delay: Duration,
    destinations: Mutex<Vec<String>>,
    sends: AtomicUsize,
}

impl ScriptedChannel {
    pub fn healthy(kind: ChannelKind) -> Arc<Self> {
        Self::build(kind, None, Duration::ZERO)
    }

    pub fn failing(kind: ChannelKind, error: &str) -> Arc<Self> {
        Self::build(kind, Some(error.to_string()), Duration::ZERO)
    }

    pub fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
        Self::build(kind, None, delay)
    }

    fn build(kind: ChannelKind, failure: Option<String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failure,
            delay,
            destinations: Mutex::new(Vec::new()),
            sends: AtomicUsize::new(0),
        })
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn destinations(&self) -> Vec<String> {
        self.destinations.lock().expect("lock").clone()
    }
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, destination: &str, _body: &str) -> SendOutcome {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.destinations
            .lock()
            .expect("lock")
            .push(destination.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(error) => SendOutcome::failed(error.clone()),
            None => SendOutcome::delivered(Some(format!("msg-{destination}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn contacts(count: usize) -> Vec<EmergencyContact> {
    (1..=count)
        .map(|i| {
            EmergencyContact::new(i.to_string(), format!("Contact {i}"), format!("+1555000{i:04}"))
        })
        .collect()
}

pub fn countdown_settings(secs: u64) -> EscalationSettings {
    EscalationSettings {
        countdown: Duration::from_secs(secs),
        tick: Duration::from_secs(1),
        message: "I may have fallen. Please check on me.".to_string(),
    }
}

pub fn armed_machine(
    store: &Arc<InMemoryStore>,
    channels: &[Arc<ScriptedChannel>],
    settings: EscalationSettings,
) -> Arc<FallStateMachine> {
    let machine = FallStateMachine::new(
        Arc::clone(store) as Arc<dyn ContactStore>,
        AlertDispatcher::new(Duration::from_secs(5)),
        channels
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn NotificationChannel>)
            .collect(),
        Some(Arc::clone(store) as Arc<dyn DispatchLogStore>),
        settings,
    );
    machine.arm_monitoring(true);
    machine
}

pub async fn wait_for(
    machine: &FallStateMachine,
    pred: impl FnMut(&FallEvent) -> bool,
) -> FallEvent {
    let mut rx = machine.subscribe();
    let event = tokio::time::timeout(Duration::from_secs(120), rx.wait_for(pred))
        .await
        .expect("state reached in time")
        .expect("machine alive");
    event.clone()
}

// ---------------------------------------------------------------------------
// GatedTransport
// ---------------------------------------------------------------------------

/// Simulated radio whose `connect` waits for `open` before completing.
pub struct GatedTransport {
    pub inner: SimulatedTransport,
    gate: Notify,
}

impl GatedTransport {
    pub fn new(inner: SimulatedTransport) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Notify::new(),
        })
    }

    /// Let one pending (or the next) connect through.
    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl DeviceTransport for GatedTransport {
    async fn discover(&self, window: Duration) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        self.inner.discover(window).await
    }

    async fn authorized_devices(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        self.inner.authorized_devices().await
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<DeviceLink, DeviceError> {
        self.gate.notified().await;
        self.inner.connect(device).await
    }
}
