pub mod dispatch_fmt;
pub mod state_fmt;
