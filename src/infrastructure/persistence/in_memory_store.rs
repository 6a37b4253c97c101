use std::sync::Mutex;

use crate::domain::entities::contact::EmergencyContact;
use crate::domain::entities::device::KnownDevice;
use crate::domain::entities::dispatch::DispatchRecord;
use crate::domain::ports::store::{
    ContactStore, DevicePreferenceStore, DispatchLogStore, StoreError,
};

/// In-memory store for testing purposes.
pub struct InMemoryStore {
    contacts: Mutex<Vec<EmergencyContact>>,
    last_known_device: Mutex<Option<KnownDevice>>,
    auto_connect: Mutex<Option<bool>>,
    dispatches: Mutex<Vec<DispatchRecord>>,
}

impl InMemoryStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contacts: Mutex::new(Vec::new()),
            last_known_device: Mutex::new(None),
            auto_connect: Mutex::new(None),
            dispatches: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_contacts(contacts: Vec<EmergencyContact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
            ..Self::new()
        }
    }

    pub fn add_contact(&self, contact: EmergencyContact) {
        if let Ok(mut contacts) = self.contacts.lock() {
            contacts.push(contact);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactStore for InMemoryStore {
    fn list(&self) -> Result<Vec<EmergencyContact>, StoreError> {
        Ok(self
            .contacts
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .clone())
    }
}

impl DevicePreferenceStore for InMemoryStore {
    fn last_known_device(&self) -> Result<Option<KnownDevice>, StoreError> {
        Ok(self
            .last_known_device
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .clone())
    }

    fn set_last_known_device(&self, device: &KnownDevice) -> Result<(), StoreError> {
        *self
            .last_known_device
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))? = Some(device.clone());
        Ok(())
    }

    fn auto_connect_enabled(&self) -> Result<Option<bool>, StoreError> {
        Ok(*self
            .auto_connect
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?)
    }

    fn set_auto_connect_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        *self
            .auto_connect
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))? = Some(enabled);
        Ok(())
    }
}

impl DispatchLogStore for InMemoryStore {
    fn record_dispatch(&self, record: &DispatchRecord) -> Result<(), StoreError> {
        self.dispatches
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }

    fn recent_dispatches(&self, count: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        let dispatches = self
            .dispatches
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;
        Ok(dispatches.iter().rev().take(count).cloned().collect())
    }
}
