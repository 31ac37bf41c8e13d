//! # Host Bridge Traits
//!
//! Platform abstraction traits implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the QuiniCat auth core and the
//! platform it runs on. Each trait is a capability the core needs but that is
//! provided differently per host (native desktop, browser, test harness).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport with timeouts
//! - [`SecureStore`](storage::SecureStore) - Durable secret persistence (Keychain/Keystore)
//! - [`Clock`](time::Clock) - Time source for deterministic expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Web      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and report timeouts as
//! [`BridgeError::Timeout`](error::BridgeError::Timeout) so callers can tell
//! them apart from refused connections.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
