//! Identity provider seam.
//!
//! The host owns the actual sign-in UI (e.g. the Google consent screen) and
//! hands the core an opaque assertion. The core never validates it.

use crate::error::Result;
use crate::types::IdentityAssertion;
use async_trait::async_trait;

/// External identity-provider integration.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name, used for the verify endpoint path
    /// (`/auth/verify-<name>`) and in events.
    fn name(&self) -> &str {
        "google"
    }

    /// Runs the provider flow.
    ///
    /// `Ok(None)` means the flow finished without producing an assertion
    /// (cancelled or denied).
    async fn authenticate(&self) -> Result<Option<IdentityAssertion>>;
}

/// Provider returning a fixed assertion. Useful for hosts that already
/// completed the provider flow themselves.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    name: String,
    assertion: Option<IdentityAssertion>,
}

impl StaticIdentityProvider {
    pub fn new(name: impl Into<String>, assertion: Option<IdentityAssertion>) -> Self {
        Self {
            name: name.into(),
            assertion,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<Option<IdentityAssertion>> {
        Ok(self.assertion.clone())
    }
}
