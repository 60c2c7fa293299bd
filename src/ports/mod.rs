//! Port traits the domain depends on, implemented in [`crate::adapters`].

pub mod config_port;
pub mod data_port;
pub mod report_port;
