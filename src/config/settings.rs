//! # Issuer Settings
//!
//! Backend-specific configuration records. Each record validates itself with
//! `validator` rules for required fields plus custom cross-field checks.

use crate::config::kinds::{AuthMethodKind, IssuerKind};
use crate::errors::{IssuerError, Result};
use crate::secrets::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default mount path of the Vault PKI secrets engine.
pub const DEFAULT_VAULT_MOUNT: &str = "pki";

/// Default lifetime of certificates requested from Vault.
pub const DEFAULT_VAULT_CERT_TTL: Duration = Duration::from_secs(720 * 3600);

/// Default lifetime of certificates requested from AWS, in days.
pub const DEFAULT_AWS_TTL_DAYS: u32 = 30;

/// Default ACM PCA signing algorithm.
pub const DEFAULT_AWS_SIGNING_ALGORITHM: &str = "SHA256WITHRSA";

/// Configuration for one issuer. Only the active variant is ever read.
#[derive(Debug, Clone)]
pub enum IssuerConfig {
    Vault(VaultConfig),
    Cfssl(CfsslConfig),
    Aws(AwsConfig),
}

impl IssuerConfig {
    /// The issuer family this configuration selects.
    pub fn kind(&self) -> IssuerKind {
        match self {
            Self::Vault(_) => IssuerKind::Vault,
            Self::Cfssl(_) => IssuerKind::Cfssl,
            Self::Aws(_) => IssuerKind::Aws,
        }
    }

    /// Validate the active variant.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Vault(config) => config.validate(),
            Self::Cfssl(config) => config.validate(),
            Self::Aws(config) => config.validate(),
        }
    }
}

/// Settings for a token that is renewed in the background.
#[derive(Debug, Clone)]
pub struct RenewingTokenConfig {
    /// Token used to initially authenticate against Vault. Must be renewable.
    pub initial: SecretString,
    /// How long before expiry the token is renewed.
    pub renew_before: Duration,
    /// Lifetime requested on every renewal.
    pub time_to_live: Duration,
}

impl Default for RenewingTokenConfig {
    fn default() -> Self {
        Self {
            initial: SecretString::default(),
            renew_before: Duration::from_secs(30 * 60),
            time_to_live: Duration::from_secs(24 * 3600),
        }
    }
}

impl RenewingTokenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial.is_blank() {
            return Err(IssuerError::config("renewing token requires an initial token"));
        }
        if self.time_to_live.is_zero() {
            return Err(IssuerError::config("renewing token time to live must be positive"));
        }
        if self.renew_before >= self.time_to_live {
            return Err(IssuerError::config(format!(
                "renewing token renew_before ({:?}) must be shorter than its time to live ({:?})",
                self.renew_before, self.time_to_live
            )));
        }
        Ok(())
    }
}

/// How the Vault issuer authenticates, after resolving the configured method.
#[derive(Debug, Clone)]
pub enum VaultAuth {
    Constant(SecretString),
    Renewing(RenewingTokenConfig),
}

/// Vault PKI issuer configuration.
#[derive(Debug, Clone, Validate)]
pub struct VaultConfig {
    /// Address of the Vault server.
    pub url: Option<Url>,
    /// Deprecated constant token, used only when no auth method is configured.
    pub token: SecretString,
    /// Method used to authenticate against Vault.
    pub auth_method: AuthMethodKind,
    pub renewing_token: RenewingTokenConfig,
    pub constant_token: SecretString,
    /// Name under which the PKI secrets engine is mounted.
    #[validate(length(min = 1, message = "Vault mount cannot be empty"))]
    pub mount: String,
    /// Vault role used when issuing certificates.
    #[validate(length(min = 1, message = "Vault role is required"))]
    pub role: String,
    /// CA bundle for the Vault connection. Public roots are used when unset.
    pub ca_cert_path: Option<PathBuf>,
    /// Lifetime of certificates when the request does not ask for one.
    pub time_to_live: Duration,
    /// URI SANs added to every request, e.g. `spiffe://cluster.local/ns/default/sa/proxy`.
    pub uri_sans: Vec<String>,
    /// OID/UTF8 SANs added to every request, in OpenSSL `<oid>;UTF8:<value>` form.
    pub other_sans: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: SecretString::default(),
            auth_method: AuthMethodKind::Unknown,
            renewing_token: RenewingTokenConfig::default(),
            constant_token: SecretString::default(),
            mount: DEFAULT_VAULT_MOUNT.to_string(),
            role: String::new(),
            ca_cert_path: None,
            time_to_live: DEFAULT_VAULT_CERT_TTL,
            uri_sans: Vec::new(),
            other_sans: Vec::new(),
        }
    }
}

impl VaultConfig {
    /// Validate the Vault settings, including the auth method.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        if self.url.is_none() {
            return Err(IssuerError::config("Vault URL is required"));
        }
        if self.time_to_live.is_zero() {
            return Err(IssuerError::config("Vault certificate time to live must be positive"));
        }

        self.auth().map(|_| ())
    }

    /// Resolve the configured auth method into concrete credentials.
    ///
    /// Without an auth method, the deprecated `token` is used as a constant token.
    pub fn auth(&self) -> Result<VaultAuth> {
        match self.auth_method {
            AuthMethodKind::ConstantToken => {
                if self.constant_token.is_blank() {
                    return Err(IssuerError::config("constant token auth method requires a token"));
                }
                Ok(VaultAuth::Constant(self.constant_token.clone()))
            }
            AuthMethodKind::RenewingToken => {
                self.renewing_token.validate()?;
                Ok(VaultAuth::Renewing(self.renewing_token.clone()))
            }
            AuthMethodKind::Unknown if !self.token.is_blank() => {
                Ok(VaultAuth::Constant(self.token.clone()))
            }
            AuthMethodKind::Unknown => Err(IssuerError::config(
                r#"unknown Vault auth method, supported methods are "constant" and "renewing""#,
            )),
        }
    }
}

/// CFSSL issuer configuration.
#[derive(Debug, Clone, Default)]
pub struct CfsslConfig {
    /// Address of the CFSSL server.
    pub url: Option<Url>,
    /// CA bundle for the CFSSL connection. Public roots are used when unset.
    pub ca_cert_path: Option<PathBuf>,
    /// Signing profile. The server default is used when unset.
    pub profile: Option<String>,
    /// Hex-encoded HMAC key for authenticated signing.
    pub auth_key: Option<SecretString>,
}

impl CfsslConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() {
            return Err(IssuerError::config("CFSSL URL is required"));
        }
        self.auth_key_bytes().map(|_| ())
    }

    /// Decode the configured auth key.
    pub fn auth_key_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.auth_key
            .as_ref()
            .map(|key| {
                hex::decode(key.expose_secret().trim())
                    .map_err(|e| IssuerError::config(format!("CFSSL auth key is not valid hex: {}", e)))
            })
            .transpose()
    }
}

/// AWS ACM Private CA issuer configuration.
#[derive(Debug, Clone, Validate)]
pub struct AwsConfig {
    #[validate(length(min = 1, message = "AWS region is required"))]
    pub region: String,
    /// Explicit credentials. The SDK default chain is used when both are unset.
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<SecretString>,
    /// ARN of a pre-created CA which issues the certificates.
    #[validate(length(min = 1, message = "AWS certificate authority ARN is required"))]
    pub certificate_authority_arn: String,
    /// Lifetime of certificates when the request does not ask for one, in days.
    #[validate(range(min = 1, message = "AWS certificate lifetime must be at least one day"))]
    pub time_to_live_days: u32,
    pub signing_algorithm: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            access_key_id: None,
            access_key_secret: None,
            certificate_authority_arn: String::new(),
            time_to_live_days: DEFAULT_AWS_TTL_DAYS,
            signing_algorithm: DEFAULT_AWS_SIGNING_ALGORITHM.to_string(),
        }
    }
}

impl AwsConfig {
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        if !self.certificate_authority_arn.starts_with("arn:") {
            return Err(IssuerError::config(format!(
                "AWS certificate authority ARN '{}' is not an ARN",
                self.certificate_authority_arn
            )));
        }
        if self.access_key_id.is_some() != self.access_key_secret.is_some() {
            return Err(IssuerError::config(
                "AWS access key ID and secret must be configured together",
            ));
        }
        Ok(())
    }
}

/// Log output settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
