//! # Authentication Module
//!
//! Session bridge between an external identity provider and the QuiniCat
//! backend's access token.
//!
//! ## Overview
//!
//! - [`TokenExchangeClient`] swaps an identity assertion for a backend token
//!   and renews it.
//! - [`SessionStore`] owns the current [`Session`] and its durable copy.
//! - [`AuthenticatedClient`] attaches the token to backend calls and runs a
//!   single renew-and-retry cycle on 401.
//! - [`RouteGuard`] decides navigations from the session status.
//! - [`AuthManager`] ties them together for the UI.

pub mod client;
pub mod error;
pub mod exchange;
pub mod guard;
pub mod manager;
pub mod provider;
pub mod session_store;
mod transport;
pub mod types;

pub use client::{AuthenticatedClient, PendingRequest};
pub use error::{AuthError, Result, AUTH_INCOMPLETE_MESSAGE};
pub use exchange::TokenExchangeClient;
pub use guard::{GuardDecision, RouteClass, RouteGuard, RouteTable, DEV_BYPASS_ENABLED};
pub use manager::AuthManager;
pub use provider::{IdentityProvider, StaticIdentityProvider};
pub use session_store::{
    InMemorySessionBackend, SecureSessionBackend, SessionBackend, SessionEndpointBackend,
    SessionStore,
};
pub use types::{
    AccessToken, IdentityAssertion, ProfileHints, Role, Session, SessionPatch, SessionStatus,
    SessionUser, TokenGrant,
};
