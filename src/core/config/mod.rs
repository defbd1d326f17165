// Configuration - raw admin fields, compiled snapshots and the handle that
// publishes them.

pub mod config_models;
pub mod config_service;
pub mod duration;

pub use config_models::*;
pub use config_service::*;
pub use duration::{BlockDuration, DurationParseError, INDEFINITE};
