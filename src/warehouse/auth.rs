//! Pluggable warehouse authentication.
//!
//! The query path only ever sees a [`Session`]; how it was obtained is the
//! authenticator's business.

use crate::error::FetchError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// An operator completes the login by hand; cannot be renewed unattended.
    Interactive,
    /// A secret supplied through configuration; renewable at any time.
    StoredCredential,
}

impl AuthMethod {
    pub const fn can_renew_unattended(self) -> bool {
        matches!(self, Self::StoredCredential)
    }
}

/// Who the warehouse session is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account: String,
    pub user: String,
    pub warehouse: String,
}

/// An authenticated warehouse session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user: String,
    pub method: AuthMethod,
    pub established_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub trait Authenticator: Send + Sync {
    fn method(&self) -> AuthMethod;

    fn authenticate(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Session, FetchError>;
}

fn new_session(
    identity: &Identity,
    method: AuthMethod,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Session {
    Session {
        id: Uuid::new_v4(),
        user: identity.user.clone(),
        method,
        established_at: now,
        expires_at: now + ttl,
    }
}

/// Authenticates with a secret loaded from configuration.
///
/// The embedded warehouse has no login of its own, so the secret is only
/// checked for presence and never verified against anything. A missing user
/// or empty secret fails the login.
pub struct StoredCredentialAuthenticator {
    secret: String,
    session_ttl: Duration,
}

impl StoredCredentialAuthenticator {
    pub const fn new(secret: String, session_ttl: Duration) -> Self {
        Self {
            secret,
            session_ttl,
        }
    }
}

impl fmt::Debug for StoredCredentialAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentialAuthenticator")
            .field("secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl Authenticator for StoredCredentialAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::StoredCredential
    }

    fn authenticate(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Session, FetchError> {
        if identity.user.is_empty() {
            return Err(FetchError::Connection("no warehouse user configured".to_string()));
        }
        if self.secret.is_empty() {
            return Err(FetchError::Connection(format!(
                "no stored credential configured for user {}",
                identity.user
            )));
        }
        Ok(new_session(
            identity,
            AuthMethod::StoredCredential,
            now,
            self.session_ttl,
        ))
    }
}

/// Confirmation callback for interactive login. Returns `true` once the
/// operator has completed the login for the given identity.
pub type LoginPrompt = Box<dyn Fn(&Identity) -> bool + Send + Sync>;

/// Authenticates by asking an operator to complete the login.
pub struct InteractiveAuthenticator {
    prompt: LoginPrompt,
    session_ttl: Duration,
}

impl InteractiveAuthenticator {
    pub fn new(prompt: LoginPrompt, session_ttl: Duration) -> Self {
        Self {
            prompt,
            session_ttl,
        }
    }
}

impl Authenticator for InteractiveAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::Interactive
    }

    fn authenticate(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Session, FetchError> {
        tracing::info!(
            account = %identity.account,
            user = %identity.user,
            "Interactive warehouse login requested"
        );
        if !(self.prompt)(identity) {
            return Err(FetchError::Connection(format!(
                "interactive login for {} was not completed",
                identity.user
            )));
        }
        Ok(new_session(
            identity,
            AuthMethod::Interactive,
            now,
            self.session_ttl,
        ))
    }
}
