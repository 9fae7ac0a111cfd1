use std::sync::Arc;
use std::time::Duration;

use pkiproxy::config::RenewingTokenConfig;
use pkiproxy::issuers::auth::RenewingToken;
use pkiproxy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::support::FakeVault;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

fn config() -> RenewingTokenConfig {
    RenewingTokenConfig {
        initial: SecretString::new("hvs.initial"),
        renew_before: 30 * MINUTE,
        time_to_live: 24 * HOUR,
    }
}

#[tokio::test(start_paused = true)]
async fn first_renewal_happens_renew_before_expiry() {
    let vault = Arc::new(FakeVault::new(24 * HOUR));
    let token = RenewingToken::new(config(), vault.clone(), CancellationToken::new());

    let first = token.ensure_authorized().await.unwrap();
    assert_eq!(vault.renewals(), 1);

    tokio::time::sleep(23 * HOUR + 29 * MINUTE).await;
    assert_eq!(vault.renewals(), 1);

    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
    assert_eq!(vault.renewals(), 2);

    let second = token.ensure_authorized().await.unwrap();
    assert_eq!(second.generation(), first.generation() + 1);
    assert_ne!(second.token().expose_secret(), first.token().expose_secret());
}

#[tokio::test(start_paused = true)]
async fn failing_renewals_serve_until_expiry_then_recover() {
    let vault = Arc::new(FakeVault::new(24 * HOUR));
    let token = RenewingToken::new(config(), vault.clone(), CancellationToken::new());

    let first = token.ensure_authorized().await.unwrap();
    vault.fail_renewals(true);

    tokio::time::sleep(24 * HOUR - Duration::from_secs(1)).await;
    let current = token.ensure_authorized().await.unwrap();
    assert!(Arc::ptr_eq(&first, &current));
    assert!(vault.renewals() > 2, "renewal should be retried with backoff");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let err = token.ensure_authorized().await.unwrap_err();
    assert!(err.is_authorization());

    vault.fail_renewals(false);
    tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
    let recovered = token.ensure_authorized().await.unwrap();
    assert!(recovered.generation() > first.generation());
}

#[tokio::test(start_paused = true)]
async fn backoff_bounds_retry_rate() {
    let vault = Arc::new(FakeVault::new(24 * HOUR));
    let token = RenewingToken::new(config(), vault.clone(), CancellationToken::new());

    token.ensure_authorized().await.unwrap();
    vault.fail_renewals(true);

    // 30 minutes of failures with a one minute cap is well under a hundred attempts.
    tokio::time::sleep(24 * HOUR).await;
    assert!(vault.renewals() < 100, "retried {} times", vault.renewals());
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_callers_share_one_login() {
    let vault = Arc::new(FakeVault::new(24 * HOUR));
    let token = Arc::new(RenewingToken::new(config(), vault.clone(), CancellationToken::new()));

    let callers: Vec<_> = (0..10)
        .map(|_| {
            let token = Arc::clone(&token);
            tokio::spawn(async move { token.ensure_authorized().await.unwrap().generation() })
        })
        .collect();

    for caller in callers {
        assert_eq!(caller.await.unwrap(), 0);
    }
    assert_eq!(vault.renewals(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_renewals() {
    let vault = Arc::new(FakeVault::new(HOUR));
    let shutdown = CancellationToken::new();
    let token = RenewingToken::new(
        RenewingTokenConfig { time_to_live: HOUR, ..config() },
        vault.clone(),
        shutdown.child_token(),
    );

    token.ensure_authorized().await.unwrap();
    shutdown.cancel();
    tokio::time::sleep(4 * HOUR).await;

    assert_eq!(vault.renewals(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_token_stops_renewals() {
    let vault = Arc::new(FakeVault::new(HOUR));
    let process_shutdown = CancellationToken::new();
    let token = RenewingToken::new(
        RenewingTokenConfig { time_to_live: HOUR, ..config() },
        vault.clone(),
        process_shutdown.clone(),
    );

    token.ensure_authorized().await.unwrap();
    drop(token);
    tokio::time::sleep(4 * HOUR).await;

    assert_eq!(vault.renewals(), 1);
    assert!(!process_shutdown.is_cancelled(), "dropping one provider must not shut the process down");
}
