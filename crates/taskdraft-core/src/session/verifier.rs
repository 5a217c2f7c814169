//! The identity seam between the HTTP surface and whoever issues sessions.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};

use super::{SessionClaims, SessionConfig, SessionError, validate_session_token};

/// Resolves a bearer credential to an authenticated caller.
///
/// The drafting operations never see credentials; the HTTP layer calls a
/// verifier first and only proceeds with a valid identity.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, bearer: &str) -> Result<SessionClaims, SessionError>;
}

/// Verifies tokens minted by [`super::generate_session_token`].
#[derive(Clone)]
pub struct HmacSessionVerifier {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl HmacSessionVerifier {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl SessionVerifier for HmacSessionVerifier {
    fn verify(&self, bearer: &str) -> Result<SessionClaims, SessionError> {
        validate_session_token(&self.config, bearer, self.clock.now())
    }
}
