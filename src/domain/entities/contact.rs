use serde::{Deserialize, Serialize};

/// A person to notify when a fall is escalated.
///
/// Owned by the contact store; the escalation core only holds copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    /// E.164 phone number, e.g. `+15551234567`
    pub phone: String,
}

impl EmergencyContact {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }
}
