use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::domain::entities::device::{DeviceSession, DiscoveredDevice, KnownDevice, SessionStatus};
use crate::domain::ports::device::{DeviceError, DeviceTransport, LinkEvent, LinkHandle};
use crate::domain::ports::store::{DevicePreferenceStore, StoreError};

/// The wearable reported a fall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFallSignal {
    pub device_id: String,
    pub received_at: DateTime<Utc>,
}

impl DeviceFallSignal {
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// Why an auto-reconnect did not even look for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoKnownDevice,
    NotDisconnected,
    AlreadyAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Skipped(SkipReason),
    NotFound,
    Connected(DiscoveredDevice),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub scan_window: Duration,
    pub connect_timeout: Duration,
    /// Payload text that means "fall detected"
    pub sentinel: String,
    /// Used until the user sets a preference of their own
    pub auto_connect_default: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            scan_window: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            sentinel: "FALL".to_string(),
            auto_connect_default: false,
        }
    }
}

struct ActiveLink {
    handle: Box<dyn LinkHandle>,
    listener: CancellationToken,
    generation: u64,
}

/// Owner of the one wearable connection.
pub struct DeviceSessionManager {
    transport: Arc<dyn DeviceTransport>,
    prefs: Arc<dyn DevicePreferenceStore>,
    settings: SessionSettings,
    state: watch::Sender<DeviceSession>,
    signals: broadcast::Sender<DeviceFallSignal>,
    link: Mutex<Option<ActiveLink>>,
    generation: AtomicU64,
    reconnect_attempted: AtomicBool,
    this: Weak<Self>,
}

/// An empty sentinel matches nothing rather than every payload.
fn is_fall_payload(text: &str, sentinel: &str) -> bool {
    let sentinel = sentinel.trim();
    !sentinel.is_empty() && text.contains(sentinel)
}

impl DeviceSessionManager {
    /// Build the manager, restoring the persisted device preferences.
    #[must_use]
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        prefs: Arc<dyn DevicePreferenceStore>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let last_known_device = prefs.last_known_device().unwrap_or_else(|e| {
            tracing::warn!("Failed to load last known device: {e}");
            None
        });
        let auto_connect_enabled = match prefs.auto_connect_enabled() {
            Ok(pref) => pref.unwrap_or(settings.auto_connect_default),
            Err(e) => {
                tracing::warn!("Failed to load auto-connect preference: {e}");
                settings.auto_connect_default
            }
        };

        let (state, _) = watch::channel(DeviceSession {
            last_known_device,
            auto_connect_enabled,
            ..DeviceSession::default()
        });
        let (signals, _) = broadcast::channel(16);
        if settings.sentinel.trim().is_empty() {
            tracing::warn!("Empty fall sentinel, device payloads will never raise a fall");
        }

        Arc::new_cyclic(|this| Self {
            transport,
            prefs,
            settings,
            state,
            signals,
            link: Mutex::new(None),
            generation: AtomicU64::new(0),
            reconnect_attempted: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DeviceSession> {
        self.state.subscribe()
    }

    /// Fall signals decoded from the connected device.
    #[must_use]
    pub fn subscribe_signals(&self) -> broadcast::Receiver<DeviceFallSignal> {
        self.signals.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> DeviceSession {
        self.state.borrow().clone()
    }

    /// Look for nearby devices. The session stays in `Scanning` until
    /// [`connect`](Self::connect) or [`abort_scan`](Self::abort_scan).
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidState` while connecting or connected, and
    /// passes through transport errors (the session falls back to `Disconnected`).
    pub async fn scan(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        let status = self.snapshot().status;
        if matches!(status, SessionStatus::Connecting | SessionStatus::Connected) {
            return Err(DeviceError::InvalidState(status));
        }
        self.set_status(SessionStatus::Scanning);
        tracing::info!("Scanning for devices");

        match self.transport.discover(self.settings.scan_window).await {
            Ok(devices) => {
                tracing::info!(found = devices.len(), "Scan finished");
                Ok(devices)
            }
            Err(e) => {
                tracing::warn!("Scan failed: {e}");
                self.state.send_if_modified(|s| {
                    if s.status == SessionStatus::Scanning {
                        s.status = SessionStatus::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                Err(e)
            }
        }
    }

    pub fn abort_scan(&self) {
        let aborted = self.state.send_if_modified(|s| {
            if s.status == SessionStatus::Scanning {
                s.status = SessionStatus::Disconnected;
                true
            } else {
                false
            }
        });
        if aborted {
            tracing::info!("Scan aborted");
        }
    }

    /// Open a connection to `device` and start listening for fall signals.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidState` if a connection is open or opening,
    /// or `DeviceError::Connection` if the transport fails or times out. On
    /// failure the session is `Disconnected` and no retry is made.
    pub async fn connect(&self, device: &DiscoveredDevice) -> Result<(), DeviceError> {
        let claimed = self.state.send_if_modified(|s| {
            if matches!(s.status, SessionStatus::Connecting | SessionStatus::Connected) {
                return false;
            }
            s.status = SessionStatus::Connecting;
            s.device_id = Some(device.id.clone());
            s.device_name.clone_from(&device.name);
            true
        });
        if !claimed {
            return Err(DeviceError::InvalidState(self.snapshot().status));
        }
        tracing::info!(device = %device.id, name = device.display_name(), "Connecting");

        let link = match tokio::time::timeout(
            self.settings.connect_timeout,
            self.transport.connect(device),
        )
        .await
        {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                self.clear_connecting(&device.id);
                tracing::warn!(device = %device.id, "Connection failed: {e}");
                return Err(e);
            }
            Err(_) => {
                self.clear_connecting(&device.id);
                let e = DeviceError::Connection(format!(
                    "timed out after {}s",
                    self.settings.connect_timeout.as_secs()
                ));
                tracing::warn!(device = %device.id, "Connection failed: {e}");
                return Err(e);
            }
        };

        // Connected is only ever published with the link lock held, so link
        // loss and disconnect always observe it before clearing the session.
        let mut active = self.link.lock().await;
        let known = KnownDevice::from(device);
        let connected = self.state.send_if_modified(|s| {
            if s.status != SessionStatus::Connecting {
                return false;
            }
            s.status = SessionStatus::Connected;
            s.last_known_device = Some(known.clone());
            true
        });
        if !connected {
            // Disconnected while the transport was still connecting.
            drop(active);
            if let Err(e) = link.handle.disconnect().await {
                tracing::debug!("Closing abandoned link failed: {e}");
            }
            tracing::info!(device = %device.id, "Connection abandoned");
            return Err(DeviceError::Connection("connection abandoned".to_string()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let listener = CancellationToken::new();
        self.spawn_listener(device.id.clone(), link.events, listener.clone(), generation);
        *active = Some(ActiveLink {
            handle: link.handle,
            listener,
            generation,
        });
        drop(active);

        if let Err(e) = self.prefs.set_last_known_device(&known) {
            tracing::warn!("Failed to persist last known device: {e}");
        }
        self.reconnect_attempted.store(false, Ordering::SeqCst);
        tracing::info!(device = %device.id, "Device connected");
        Ok(())
    }

    /// Close the connection. A no-op while already disconnected.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Connection` if the transport failed to close the
    /// link; the session is `Disconnected` either way.
    pub async fn disconnect(&self) -> Result<(), DeviceError> {
        if self.snapshot().status == SessionStatus::Disconnected {
            return Ok(());
        }
        let active = {
            let mut link = self.link.lock().await;
            self.clear_device();
            link.take()
        };

        if let Some(active) = active {
            active.listener.cancel();
            active.handle.disconnect().await?;
            tracing::info!("Device disconnected");
        }
        Ok(())
    }

    /// Reconnect to the last known device if the user allowed it.
    ///
    /// Runs at most once per disconnected period and never fails: problems
    /// are logged and reported in the outcome.
    pub async fn auto_reconnect(&self) -> ReconnectOutcome {
        let session = self.snapshot();
        if !session.auto_connect_enabled {
            return ReconnectOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(known) = session.last_known_device else {
            return ReconnectOutcome::Skipped(SkipReason::NoKnownDevice);
        };
        if session.status != SessionStatus::Disconnected {
            return ReconnectOutcome::Skipped(SkipReason::NotDisconnected);
        }
        if self.reconnect_attempted.swap(true, Ordering::SeqCst) {
            return ReconnectOutcome::Skipped(SkipReason::AlreadyAttempted);
        }

        let candidates = match self.transport.authorized_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("Auto-reconnect could not list devices: {e}");
                return ReconnectOutcome::Failed(e.to_string());
            }
        };

        let found = candidates
            .iter()
            .find(|d| d.id == known.id)
            .or_else(|| candidates.iter().find(|d| known.matches(d)))
            .cloned();
        let Some(device) = found else {
            tracing::info!(device = %known.id, "Last known device not found");
            return ReconnectOutcome::NotFound;
        };

        match self.connect(&device).await {
            Ok(()) => ReconnectOutcome::Connected(device),
            Err(e) => {
                tracing::warn!(device = %device.id, "Auto-reconnect failed: {e}");
                ReconnectOutcome::Failed(e.to_string())
            }
        }
    }

    /// Persist and apply the auto-connect preference.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the preference could not be saved; the
    /// in-memory setting is left unchanged.
    pub fn set_auto_connect(&self, enabled: bool) -> Result<(), StoreError> {
        self.prefs.set_auto_connect_enabled(enabled)?;
        self.state.send_modify(|s| s.auto_connect_enabled = enabled);
        tracing::info!(enabled, "Auto-connect preference saved");
        Ok(())
    }

    // --- internals ---

    fn set_status(&self, status: SessionStatus) {
        self.state.send_modify(|s| s.status = status);
    }

    /// Undo a failed connect, unless the session has moved on since.
    fn clear_connecting(&self, device_id: &str) {
        self.state.send_if_modified(|s| {
            if s.status != SessionStatus::Connecting || s.device_id.as_deref() != Some(device_id) {
                return false;
            }
            s.status = SessionStatus::Disconnected;
            s.device_id = None;
            s.device_name = None;
            true
        });
    }

    fn clear_device(&self) {
        self.state.send_modify(|s| {
            s.status = SessionStatus::Disconnected;
            s.device_id = None;
            s.device_name = None;
        });
    }

    fn spawn_listener(
        &self,
        device_id: String,
        mut events: mpsc::Receiver<LinkEvent>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let this = self.this.clone();
        let sentinel = self.settings.sentinel.clone();
        let signals = self.signals.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Some(LinkEvent::Payload(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes);
                        if is_fall_payload(&text, &sentinel) {
                            tracing::info!(device = %device_id, "Fall payload received");
                            if signals.send(DeviceFallSignal::new(device_id.clone())).is_err() {
                                tracing::debug!("No listener for fall signals");
                            }
                        } else {
                            tracing::debug!(
                                device = %device_id,
                                payload = %text,
                                "Ignoring payload"
                            );
                        }
                    }
                    Some(LinkEvent::Lost) | None => break,
                }
            }
            if let Some(manager) = this.upgrade() {
                manager.on_link_lost(generation).await;
            }
        });
    }

    async fn on_link_lost(&self, generation: u64) {
        let mut active = self.link.lock().await;
        if active.as_ref().is_none_or(|a| a.generation != generation) {
            return;
        }
        *active = None;
        self.clear_device();
        drop(active);
        tracing::warn!("Device link lost");
    }
}
