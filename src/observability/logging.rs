//! # Structured Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber. `RUST_LOG` takes precedence
//! over the configured level so operators can raise verbosity per module
//! (`RUST_LOG=pkiproxy::issuers::auth=debug`).

use crate::config::{IssuerConfig, LoggingConfig, Settings};
use crate::errors::{IssuerError, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Build the filter for `config`, honouring `RUST_LOG` when set.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| IssuerError::config(format!("invalid log level '{}': {}", config.level, e)))
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (tests, an embedding process) is kept.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let builder = FmtSubscriber::builder().with_env_filter(env_filter(config)?);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already set, keeping it");
    }
    Ok(())
}

/// Log the effective configuration. Secrets are never included.
pub fn log_config_info(settings: &Settings) {
    match &settings.issuer {
        IssuerConfig::Vault(vault) => tracing::info!(
            issuer = "vault",
            url = ?vault.url.as_ref().map(|url| url.as_str()),
            mount = %vault.mount,
            role = %vault.role,
            auth_method = %vault.auth_method.as_str(),
            uri_sans = vault.uri_sans.len(),
            other_sans = vault.other_sans.len(),
            "pkiproxy configuration"
        ),
        IssuerConfig::Cfssl(cfssl) => tracing::info!(
            issuer = "cfssl",
            url = ?cfssl.url.as_ref().map(|url| url.as_str()),
            profile = ?cfssl.profile,
            authenticated = cfssl.auth_key.is_some(),
            "pkiproxy configuration"
        ),
        IssuerConfig::Aws(aws) => tracing::info!(
            issuer = "aws",
            region = %aws.region,
            certificate_authority_arn = %aws.certificate_authority_arn,
            time_to_live_days = aws.time_to_live_days,
            explicit_credentials = aws.access_key_id.is_some(),
            "pkiproxy configuration"
        ),
    }
}
