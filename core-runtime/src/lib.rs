//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure for the QuiniCat auth bridge:
//! - Configuration management (builder + environment loading)
//! - Logging and tracing infrastructure
//! - Event bus for session lifecycle notifications
//!
//! The auth and API crates depend on this crate for their configuration and
//! for broadcasting state changes to UI layers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, EventStream, RouteEvent};
