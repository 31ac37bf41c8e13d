//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-runtime`, `core-auth`, `core-api`, `bridge-desktop`). Host
//! applications can depend on `quinicat-workspace` and enable the documented
//! features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;

#[cfg(any(feature = "desktop-shims", feature = "api", feature = "dev-bypass"))]
pub use core_auth as auth;

#[cfg(feature = "api")]
pub use core_api as api;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
