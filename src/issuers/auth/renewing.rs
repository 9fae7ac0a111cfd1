//! Renewable Vault token with a background renewal task.
//!
//! The first `ensure_authorized` call renews the configured initial token to
//! obtain a lease of `time_to_live`, publishes the resulting [`Session`] and
//! spawns the renewal task. The task sleeps until `renew_before` ahead of the
//! lease expiry, renews, and publishes a fresh session. Failed renewals are
//! retried with capped exponential backoff while the current session keeps
//! being served; once that session actually expires, callers get an
//! authorization error until a renewal succeeds.
//!
//! Sessions are published through a `watch` channel holding
//! `Option<Arc<Session>>`. A renewal replaces the whole `Arc`, so readers see
//! either the previous or the new session, never a mix.

use super::{Session, TokenAuthority, TokenLease};
use crate::config::RenewingTokenConfig;
use crate::errors::{IssuerError, Result};
use crate::issuers::backoff::RetryConfig;
use crate::issuers::encoding::format_duration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// Shortest interval between scheduled renewals of a short lease.
const MIN_RENEWAL_INTERVAL: Duration = Duration::from_secs(1);

/// A renewable token kept alive by a background task.
pub struct RenewingToken {
    state: Arc<RenewalState>,
    login: Mutex<()>,
    retry: RetryConfig,
    shutdown: CancellationToken,
    _stop_on_drop: DropGuard,
}

impl std::fmt::Debug for RenewingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewingToken")
            .field("renew_before", &self.state.config.renew_before)
            .field("time_to_live", &self.state.config.time_to_live)
            .field("session", &self.state.session.borrow().as_ref().map(|s| s.generation()))
            .finish()
    }
}

struct RenewalState {
    config: RenewingTokenConfig,
    authority: Arc<dyn TokenAuthority>,
    session: watch::Sender<Option<Arc<Session>>>,
    wake: Notify,
}

impl RenewingToken {
    /// Create the provider. Nothing is contacted until the first `ensure_authorized`.
    ///
    /// The renewal task stops when `shutdown` is cancelled or this provider is
    /// dropped. Dropping the provider leaves `shutdown` itself untouched.
    pub fn new(
        config: RenewingTokenConfig,
        authority: Arc<dyn TokenAuthority>,
        shutdown: CancellationToken,
    ) -> Self {
        let (session, _) = watch::channel(None);
        let task_shutdown = shutdown.child_token();
        Self {
            state: Arc::new(RenewalState { config, authority, session, wake: Notify::new() }),
            login: Mutex::new(()),
            retry: RetryConfig::renewal(),
            shutdown: task_shutdown.clone(),
            _stop_on_drop: task_shutdown.drop_guard(),
        }
    }

    /// Override the backoff used after failed renewals.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Return the current session, logging in on first use.
    ///
    /// Fails with an authorization error if the initial login fails or the
    /// current session has expired without a successful renewal.
    pub async fn ensure_authorized(&self) -> Result<Arc<Session>> {
        if let Some(session) = self.state.current() {
            return check_unexpired(session);
        }

        let _guard = self.login.lock().await;
        if let Some(session) = self.state.current() {
            return check_unexpired(session);
        }

        let lease = self
            .state
            .authority
            .renew_self(&self.state.config.initial, self.state.config.time_to_live)
            .await
            .map_err(|e| match e {
                IssuerError::Authorization { .. } => e,
                other => IssuerError::authorization(format!("initial Vault token renewal failed: {}", other)),
            })?;

        if !lease.renewable {
            warn!("Initial Vault token is not renewable, renewals will fail until it expires");
        }

        let session = self.state.publish(lease, &self.state.config.initial);
        info!(
            lease = %format_duration(session_lease(&session)),
            renew_before = %format_duration(self.state.config.renew_before),
            "Authenticated against Vault with renewing token"
        );

        tokio::spawn(Arc::clone(&self.state).run(self.retry.clone(), self.shutdown.clone()));

        Ok(session)
    }

    /// Wake the renewal task for an immediate renewal.
    pub fn force_refresh(&self) {
        self.state.wake.notify_one();
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.state.session.subscribe()
    }
}

fn check_unexpired(session: Arc<Session>) -> Result<Arc<Session>> {
    if session.is_expired() {
        let expired_for = session
            .expires_at()
            .map(|at| Instant::now().saturating_duration_since(at))
            .unwrap_or_default();
        return Err(IssuerError::authorization(format!(
            "Vault token expired {} ago and has not been renewed",
            format_duration(Duration::from_secs(expired_for.as_secs()))
        )));
    }
    Ok(session)
}

fn session_lease(session: &Session) -> Duration {
    session.expires_at().map(|at| at.saturating_duration_since(Instant::now())).unwrap_or_default()
}

impl RenewalState {
    fn current(&self) -> Option<Arc<Session>> {
        self.session.borrow().clone()
    }

    /// Build a session from a lease and replace the current one.
    fn publish(&self, lease: TokenLease, previous_token: &crate::secrets::SecretString) -> Arc<Session> {
        let now = Instant::now();
        let generation = self.current().map(|s| s.generation() + 1).unwrap_or(0);

        let (expires_at, renew_at) = if lease.lease_duration.is_zero() {
            (None, None)
        } else {
            let lead = if lease.lease_duration > self.config.renew_before {
                lease.lease_duration - self.config.renew_before
            } else {
                warn!(
                    lease = %format_duration(lease.lease_duration),
                    renew_before = %format_duration(self.config.renew_before),
                    "Vault granted a lease shorter than renew_before, renewing at half the lease"
                );
                (lease.lease_duration / 2).max(MIN_RENEWAL_INTERVAL).min(lease.lease_duration)
            };
            (Some(now + lease.lease_duration), Some(now + lead))
        };

        let token = if lease.token.is_blank() { previous_token.clone() } else { lease.token };

        let session = Arc::new(Session { token, expires_at, renew_at, generation });
        self.session.send_replace(Some(Arc::clone(&session)));
        session
    }

    async fn renew(&self) -> Result<Arc<Session>> {
        let current = self.current().ok_or_else(|| IssuerError::renewal("no session to renew"))?;

        let lease = self
            .authority
            .renew_self(current.token(), self.config.time_to_live)
            .await
            .map_err(|e| IssuerError::renewal(e.to_string()))?;

        // A zero lease for an expiring token means Vault will not extend it
        // any further (max TTL reached); keep the old expiry and retry.
        if lease.lease_duration.is_zero() && current.expires_at().is_some() {
            return Err(IssuerError::renewal(
                "Vault granted a zero lease, the token has reached its maximum TTL",
            ));
        }

        Ok(self.publish(lease, current.token()))
    }

    /// How long to sleep before the next scheduled renewal. `None` means never.
    fn until_next_renewal(&self) -> Option<Duration> {
        self.current()
            .and_then(|session| session.renew_at())
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    async fn run(self: Arc<Self>, retry: RetryConfig, shutdown: CancellationToken) {
        debug!("Vault token renewal task started");
        let mut failures: u32 = 0;

        loop {
            let wait = if failures == 0 {
                self.until_next_renewal()
            } else {
                Some(retry.backoff_for_attempt(failures))
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Vault token renewal task stopped");
                    return;
                }
                _ = self.wake.notified() => {
                    debug!("Forced Vault token renewal");
                }
                _ = async {
                    match wait {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {}
            }

            match self.renew().await {
                Ok(session) => {
                    if failures > 0 {
                        info!(failed_attempts = failures, "Vault token renewal recovered");
                    }
                    failures = 0;
                    metrics::counter!("pkiproxy_token_renewals_total", "status" => "success").increment(1);
                    info!(
                        generation = session.generation(),
                        lease = %format_duration(session_lease(&session)),
                        "Renewed Vault token"
                    );
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    metrics::counter!("pkiproxy_token_renewals_total", "status" => "error").increment(1);
                    let retry_in = retry.backoff_for_attempt(failures);

                    let expired = self.current().map(|s| s.is_expired()).unwrap_or(true);
                    if expired {
                        error!(
                            error = %e,
                            attempt = failures,
                            retry_in = %format_duration(retry_in),
                            "Vault token has expired and renewal keeps failing, issuance is blocked"
                        );
                    } else {
                        warn!(
                            error = %e,
                            attempt = failures,
                            retry_in = %format_duration(retry_in),
                            "Vault token renewal failed, current token remains valid"
                        );
                    }
                }
            }
        }
    }
}
