//! The authentication boundary.
//!
//! chatsync never stores or refreshes credentials.  It asks a [`CredentialStore`] for the
//! bearer token on every request and tells a [`SessionInvalidation`] when the server rejects
//! it.  What happens next (logging out, prompting for a new token) belongs to the caller.

use std::env;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Environment variable read by [`EnvCredentials`].
pub const TOKEN_ENV_VAR: &str = "CHATSYNC_TOKEN";

/// Source of the bearer token attached to every request.
pub trait CredentialStore: Send + Sync {
    /// The current token, or `None` if the user is signed out.
    fn bearer_token(&self) -> Option<String>;
}

/// Receives notice that the server rejected the credential.
pub trait SessionInvalidation: Send + Sync {
    /// Called once per request that came back 401.
    fn credential_rejected(&self, message: &str);
}

/// A fixed token, replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticToken {
    token: Mutex<Option<String>>,
}

impl StaticToken {
    /// Creates a store holding `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    /// Replaces or clears the token.
    pub fn set(&self, token: Option<String>) {
        let mut guard = match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = token;
    }
}

impl CredentialStore for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        match self.token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Reads the token from [`TOKEN_ENV_VAR`] once, at construction.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    token: String,
}

impl EnvCredentials {
    /// Loads the token from the environment.
    pub fn from_env() -> Result<Self> {
        let token = env::var(TOKEN_ENV_VAR).map_err(|_| {
            Error::authentication(format!(
                "bearer token not provided and {TOKEN_ENV_VAR} environment variable not set"
            ))
        })?;
        Ok(Self { token })
    }
}

impl CredentialStore for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// An invalidation hook that only records the rejection in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInvalidation;

impl SessionInvalidation for LogInvalidation {
    fn credential_rejected(&self, message: &str) {
        tracing::warn!(%message, "credential rejected by server");
    }
}
