pub mod contact;
pub mod device;
pub mod dispatch;
pub mod fall_event;

pub use contact::EmergencyContact;
pub use device::{DeviceSession, DiscoveredDevice, KnownDevice, SessionStatus};
pub use dispatch::{DispatchAttempt, DispatchRecord, DispatchResult, SendOutcome};
pub use fall_event::{FallEvent, FallState};
