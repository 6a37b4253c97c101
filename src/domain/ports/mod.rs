pub mod channel;
pub mod device;
pub mod store;

pub use channel::{ChannelError, NotificationChannel};
pub use device::{DeviceError, DeviceLink, DeviceTransport, LinkEvent, LinkHandle};
pub use store::{ContactStore, DevicePreferenceStore, DispatchLogStore, StoreError};
