pub mod channels;
pub mod device;
pub mod persistence;
