pub mod channel_kind;
pub mod trigger_source;

pub use channel_kind::ChannelKind;
pub use trigger_source::TriggerSource;
