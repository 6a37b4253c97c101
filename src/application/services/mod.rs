pub mod countdown;
pub mod device_session;
pub mod dispatcher;
pub mod fall_state_machine;
