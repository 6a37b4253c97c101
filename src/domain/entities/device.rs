use serde::{Deserialize, Serialize};

/// Connection status of the wearable session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    Connected,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Scanning => write!(f, "scanning"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A device seen during discovery or among previously authorized devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: Option<String>,
}

impl DiscoveredDevice {
    #[must_use]
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_owned),
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Device")
    }
}

/// The last device that reached `Connected`, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnownDevice {
    pub id: String,
    pub name: Option<String>,
}

impl KnownDevice {
    /// Whether `candidate` is this device: same id, or same non-empty name.
    #[must_use]
    pub fn matches(&self, candidate: &DiscoveredDevice) -> bool {
        if candidate.id == self.id {
            return true;
        }
        match (&self.name, &candidate.name) {
            (Some(ours), Some(theirs)) => !ours.is_empty() && ours == theirs,
            _ => false,
        }
    }
}

impl From<&DiscoveredDevice> for KnownDevice {
    fn from(device: &DiscoveredDevice) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
        }
    }
}

/// Observable snapshot of the device session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub status: SessionStatus,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub last_known_device: Option<KnownDevice>,
    pub auto_connect_enabled: bool,
}
