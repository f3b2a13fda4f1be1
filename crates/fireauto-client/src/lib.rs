//! # fireauto Client
//!
//! Talks to the automation API of a running fireauto service: list,
//! create, execute and delete automations, and read system statistics.
//!
//! The address comes from the application's configuration record, so the
//! client always targets the instance the controller supervises.

mod client;
mod error;
mod render;
mod types;

pub use client::{ApiClient, api_base_url};
pub use error::ClientError;
pub use render::{automation_lines, stats_lines};
pub use types::{ApiMessage, Automation, SystemStats};
