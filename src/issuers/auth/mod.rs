//! Credential providers for the Vault issuer.
//!
//! A provider answers one question before every issuance: "which credential
//! should this call use?" The answer is an immutable [`Session`] snapshot, so a
//! caller holding one is never affected by a renewal that happens mid-request.
//!
//! - [`ConstantToken`]: a fixed token, no background work.
//! - [`RenewingToken`]: a renewable token kept alive by a background task that
//!   renews it `renew_before` ahead of expiry.

mod constant;
mod renewing;

pub use constant::ConstantToken;
pub use renewing::RenewingToken;

use crate::config::{AuthMethodKind, VaultAuth};
use crate::errors::Result;
use crate::secrets::SecretString;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A credential as seen by one issuance call.
///
/// Sessions are never mutated. Renewal publishes a new `Arc<Session>` with a
/// higher generation.
#[derive(Debug)]
pub struct Session {
    token: SecretString,
    expires_at: Option<Instant>,
    renew_at: Option<Instant>,
    generation: u64,
}

impl Session {
    /// A session that never expires.
    pub fn unbounded(token: SecretString) -> Self {
        Self { token, expires_at: None, renew_at: None, generation: 0 }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// When the credential stops being accepted, if it expires at all.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// When the renewal loop should next renew this credential.
    pub fn renew_at(&self) -> Option<Instant> {
        self.renew_at
    }

    /// Incremented on every successful renewal.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// A token lease returned by Vault's token endpoints.
#[derive(Debug, Clone)]
pub struct TokenLease {
    pub token: SecretString,
    /// Zero for tokens that never expire.
    pub lease_duration: Duration,
    pub renewable: bool,
}

/// The part of the Vault API that keeps tokens alive.
#[async_trait]
pub trait TokenAuthority: Send + Sync + std::fmt::Debug {
    /// Renew `token` (Vault `auth/token/renew-self`), asking for `increment` more lifetime.
    async fn renew_self(&self, token: &SecretString, increment: Duration) -> Result<TokenLease>;
}

/// The configured credential provider.
#[derive(Debug)]
pub enum AuthMethod {
    Constant(ConstantToken),
    Renewing(RenewingToken),
}

impl AuthMethod {
    /// Build the provider for resolved Vault credentials.
    ///
    /// A renewing provider binds its background task to a child of `shutdown`.
    pub fn new(
        auth: VaultAuth,
        authority: Arc<dyn TokenAuthority>,
        shutdown: &CancellationToken,
    ) -> Self {
        match auth {
            VaultAuth::Constant(token) => Self::Constant(ConstantToken::new(token)),
            VaultAuth::Renewing(config) => {
                Self::Renewing(RenewingToken::new(config, authority, shutdown.child_token()))
            }
        }
    }

    /// Ensure there is an active, authorized session and return it.
    pub async fn ensure_authorized(&self) -> Result<Arc<Session>> {
        match self {
            Self::Constant(token) => token.ensure_authorized(),
            Self::Renewing(token) => token.ensure_authorized().await,
        }
    }

    pub fn kind(&self) -> AuthMethodKind {
        match self {
            Self::Constant(_) => AuthMethodKind::ConstantToken,
            Self::Renewing(_) => AuthMethodKind::RenewingToken,
        }
    }
}
