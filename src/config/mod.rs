//! # Configuration Management
//!
//! Loads issuer and logging settings from environment-style key/value text.
//! All keys share the [`ENV_PREFIX`] prefix, e.g. `PKIPROXY_ISSUER=vault` or
//! `PKIPROXY_VAULT_AUTH_METHOD=renewing`. Only the keys of the selected issuer
//! are read.

pub mod kinds;
pub mod settings;
pub mod tls;

pub use kinds::{AuthMethodKind, IssuerKind};
pub use settings::{
    AwsConfig, CfsslConfig, IssuerConfig, LoggingConfig, RenewingTokenConfig, VaultAuth,
    VaultConfig,
};
pub use tls::CaBundle;

use crate::errors::{IssuerError, Result};
use crate::issuers::encoding::{decode_sans, parse_duration};
use crate::secrets::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Prefix shared by every configuration key.
pub const ENV_PREFIX: &str = "PKIPROXY_";

/// Top-level settings: the active issuer plus logging.
#[derive(Debug, Clone)]
pub struct Settings {
    pub issuer: IssuerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from any key/value source. Keys include [`ENV_PREFIX`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = EnvSource { lookup };

        let logging = LoggingConfig {
            level: source.string("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json: source
                .string("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let kind: IssuerKind = source
            .string("ISSUER")
            .ok_or_else(|| IssuerError::config(format!("{}ISSUER is required", ENV_PREFIX)))?
            .parse()?;

        let issuer = match kind {
            IssuerKind::Vault => IssuerConfig::Vault(vault_from_source(&source)?),
            IssuerKind::Cfssl => IssuerConfig::Cfssl(cfssl_from_source(&source)?),
            IssuerKind::Aws => IssuerConfig::Aws(aws_from_source(&source)?),
        };

        Ok(Self { issuer, logging })
    }
}

fn vault_from_source<F: Fn(&str) -> Option<String>>(source: &EnvSource<F>) -> Result<VaultConfig> {
    let defaults = VaultConfig::default();
    let renewing_defaults = RenewingTokenConfig::default();

    Ok(VaultConfig {
        url: source.url("VAULT_URL")?,
        token: source.secret("VAULT_TOKEN"),
        auth_method: source
            .string("VAULT_AUTH_METHOD")
            .map(|method| AuthMethodKind::parse(&method))
            .unwrap_or_default(),
        renewing_token: RenewingTokenConfig {
            initial: source.secret("VAULT_AUTH_METHOD_RENEWING_TOKEN_INITIAL"),
            renew_before: source.duration(
                "VAULT_AUTH_METHOD_RENEWING_TOKEN_RENEW_BEFORE",
                renewing_defaults.renew_before,
            )?,
            time_to_live: source.duration(
                "VAULT_AUTH_METHOD_RENEWING_TOKEN_TIME_TO_LIVE",
                renewing_defaults.time_to_live,
            )?,
        },
        constant_token: source.secret("VAULT_AUTH_METHOD_CONSTANT_TOKEN"),
        mount: source.string("VAULT_MOUNT").unwrap_or(defaults.mount),
        role: source.string("VAULT_ROLE").unwrap_or_default(),
        ca_cert_path: source.path("VAULT_CA_CERT_PATH"),
        time_to_live: source.duration("VAULT_TIME_TO_LIVE", defaults.time_to_live)?,
        uri_sans: source.list("VAULT_URI_SUBJECT_ALTERNATIVE_NAMES"),
        other_sans: source.list("VAULT_OTHER_SUBJECT_ALTERNATIVE_NAMES"),
    })
}

fn cfssl_from_source<F: Fn(&str) -> Option<String>>(source: &EnvSource<F>) -> Result<CfsslConfig> {
    Ok(CfsslConfig {
        url: source.url("CFSSL_URL")?,
        ca_cert_path: source.path("CFSSL_CA_CERT_PATH"),
        profile: source.string("CFSSL_PROFILE"),
        auth_key: source.string("CFSSL_AUTH_KEY").map(SecretString::new),
    })
}

fn aws_from_source<F: Fn(&str) -> Option<String>>(source: &EnvSource<F>) -> Result<AwsConfig> {
    let defaults = AwsConfig::default();

    let time_to_live_days = match source.string("AWS_TIME_TO_LIVE") {
        Some(days) => days.parse::<u32>().map_err(|e| {
            IssuerError::config(format!("invalid {}AWS_TIME_TO_LIVE '{}': {}", ENV_PREFIX, days, e))
        })?,
        None => defaults.time_to_live_days,
    };

    Ok(AwsConfig {
        region: source.string("AWS_REGION").unwrap_or_default(),
        access_key_id: source.string("AWS_ACCESS_KEY_ID"),
        access_key_secret: source.string("AWS_ACCESS_KEY_SECRET").map(SecretString::new),
        certificate_authority_arn: source.string("AWS_CERTIFICATE_AUTHORITY_ARN").unwrap_or_default(),
        time_to_live_days,
        signing_algorithm: source.string("AWS_SIGNING_ALGORITHM").unwrap_or(defaults.signing_algorithm),
    })
}

/// Typed access to prefixed keys. Blank values count as unset.
struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, key))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn secret(&self, key: &str) -> SecretString {
        self.string(key).map(SecretString::new).unwrap_or_default()
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.string(key).map(PathBuf::from)
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.string(key).map(|value| decode_sans(&value)).unwrap_or_default()
    }

    fn url(&self, key: &str) -> Result<Option<Url>> {
        self.string(key)
            .map(|value| {
                Url::parse(&value).map_err(|e| {
                    IssuerError::config(format!("invalid {}{} '{}': {}", ENV_PREFIX, key, value, e))
                })
            })
            .transpose()
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.string(key) {
            Some(value) => parse_duration(&value).map_err(|e| {
                IssuerError::config(format!("invalid {}{}: {}", ENV_PREFIX, key, e))
            }),
            None => Ok(default),
        }
    }
}
