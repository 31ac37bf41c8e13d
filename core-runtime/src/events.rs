//! # Event Bus System
//!
//! Broadcasts session and navigation state changes using `tokio::sync::broadcast`,
//! so that UI layers can react to sign-in, renewal and forced sign-out without
//! polling the session store.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping [`AuthEvent`] and [`RouteEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Auth facade  ├──────────────>│           ├─────────────────>│ UI binding │
//! └──────────────┘               │ EventBus  │                  └────────────┘
//! ┌──────────────┐     emit      │           │     subscribe    ┌────────────┐
//! │ Route guard  ├──────────────>│           ├─────────────────>│ Telemetry  │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::default();
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Auth(AuthEvent::SignedOut { forced: true })).ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Auth(AuthEvent::SignedOut { forced: true }));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving newer events.
//! - **`RecvError::Closed`**: every sender has been dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; emitters in this workspace
//! ignore that result so that a missing UI never fails an auth operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Auth(AuthEvent),
    /// Route guard decisions that changed the destination
    Route(RouteEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Route(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::ExchangeFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedOut { forced: true }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events related to the session lifecycle.
///
/// Payloads never carry tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A sign-in flow started.
    SigningIn {
        /// `"google"` or `"credentials"`
        provider: String,
    },
    /// A session was established.
    SignedIn {
        user_id: Option<String>,
        /// `false` when the identity provider succeeded but the backend
        /// exchange did not produce a token.
        backend_authenticated: bool,
    },
    /// The backend exchange did not produce a token.
    ExchangeFailed {
        /// User-safe message (no status codes or bodies).
        message: String,
    },
    /// A 401 triggered token renewal.
    TokenRenewing,
    /// Renewal succeeded and the session store was updated.
    TokenRenewed {
        /// New expiry (Unix epoch seconds), if the backend sent one.
        expires_at: Option<i64>,
    },
    /// The session was cleared.
    SignedOut {
        /// `true` when the client forced the sign-out after a failed renewal.
        forced: bool,
    },
    /// An auth operation failed.
    AuthError {
        message: String,
        /// Whether signing in again can resolve it.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in",
            AuthEvent::ExchangeFailed { .. } => "Backend token exchange failed",
            AuthEvent::TokenRenewing => "Renewing access token",
            AuthEvent::TokenRenewed { .. } => "Access token renewed",
            AuthEvent::SignedOut { forced: true } => "Session expired, user signed out",
            AuthEvent::SignedOut { forced: false } => "User signed out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

/// Events emitted by the route guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RouteEvent {
    /// A navigation was redirected.
    Redirected {
        /// Requested path
        from: String,
        /// Redirect target, including query
        to: String,
    },
}

impl RouteEvent {
    fn description(&self) -> &str {
        match self {
            RouteEvent::Redirected { .. } => "Navigation redirected",
        }
    }
}

/// Central event bus for broadcasting [`CoreEvent`]s.
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes an auth event, ignoring the absence of subscribers.
    pub fn emit_auth(&self, event: AuthEvent) {
        let _ = self.sender.send(CoreEvent::Auth(event));
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Creates a filtered stream of auth events only.
    pub fn auth_stream(&self) -> EventStream {
        EventStream::new(self.subscribe()).filter(|event| matches!(event, CoreEvent::Auth(_)))
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
