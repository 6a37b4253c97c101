use thiserror::Error;

use crate::domain::entities::contact::EmergencyContact;
use crate::domain::entities::device::KnownDevice;
use crate::domain::entities::dispatch::DispatchRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
}

/// Read-only view of the emergency contacts.
pub trait ContactStore: Send + Sync {
    /// Contacts as they are right now, in display order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list(&self) -> Result<Vec<EmergencyContact>, StoreError>;
}

/// Device preferences that survive restarts.
pub trait DevicePreferenceStore: Send + Sync {
    /// The last device that reached `Connected`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn last_known_device(&self) -> Result<Option<KnownDevice>, StoreError>;

    /// Remember `device` as the last connected device.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn set_last_known_device(&self, device: &KnownDevice) -> Result<(), StoreError>;

    /// Whether to reconnect to the last device at startup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn auto_connect_enabled(&self) -> Result<Option<bool>, StoreError>;

    /// Persist the auto-connect preference.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn set_auto_connect_enabled(&self, enabled: bool) -> Result<(), StoreError>;
}

/// History of completed dispatches.
pub trait DispatchLogStore: Send + Sync {
    /// Append a completed dispatch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn record_dispatch(&self, record: &DispatchRecord) -> Result<(), StoreError>;

    /// The most recent dispatches, newest first, up to `count`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn recent_dispatches(&self, count: usize) -> Result<Vec<DispatchRecord>, StoreError>;
}
