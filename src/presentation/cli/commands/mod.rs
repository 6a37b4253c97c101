pub mod report;
pub mod run;
pub mod send;
pub mod status;
