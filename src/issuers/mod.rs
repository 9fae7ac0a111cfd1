//! # Certificate Issuers
//!
//! [`Issuer`] is the single entry point the proxy uses to obtain certificates.
//! It is a closed set of backends, selected by configuration:
//!
//! - **Vault**: HashiCorp Vault PKI secrets engine, authenticated with a
//!   constant or background-renewed token (see [`auth`]).
//! - **CFSSL**: CloudFlare's PKI toolkit over its HTTP API.
//! - **AWS**: ACM Private CA (requires the `aws` feature for the SDK transport).
//!
//! Every backend normalizes its answer into a [`Certificate`], and every
//! failure into an [`IssuerError`](crate::errors::IssuerError) that tells
//! authorization problems apart from CA refusals.

pub mod auth;
pub mod aws;
pub mod backoff;
pub mod cfssl;
pub mod encoding;
pub mod request;
pub mod vault;

pub use aws::{AcmPcaApi, AwsIssuer};
pub use cfssl::CfsslIssuer;
pub use request::{Certificate, CertificateRequest};
pub use vault::{VaultApi, VaultHttpClient, VaultIssuer};

use crate::config::{AwsConfig, CaBundle, CfsslConfig, IssuerConfig, IssuerKind, VaultConfig};
use crate::errors::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// A configured certificate issuer.
#[derive(Debug)]
pub enum Issuer {
    Vault(VaultIssuer),
    Cfssl(CfsslIssuer),
    Aws(AwsIssuer),
}

impl Issuer {
    /// Validate `config` and build the selected backend with its network transport.
    ///
    /// Background work (token renewal) is bound to children of `shutdown`.
    pub async fn connect(config: &IssuerConfig, shutdown: &CancellationToken) -> Result<Self> {
        config.validate()?;

        match config {
            IssuerConfig::Vault(vault) => {
                CaBundle::load_optional(vault.ca_cert_path.as_deref())?;
                let api = Arc::new(VaultHttpClient::new(vault)?);
                Self::vault(vault.clone(), api, shutdown)
            }
            IssuerConfig::Cfssl(cfssl) => Self::cfssl(cfssl.clone()),
            IssuerConfig::Aws(aws) => Self::connect_aws(aws).await,
        }
    }

    #[cfg(feature = "aws")]
    async fn connect_aws(config: &AwsConfig) -> Result<Self> {
        let api = Arc::new(aws::AcmPcaClient::new(config).await);
        Self::aws(config.clone(), api)
    }

    #[cfg(not(feature = "aws"))]
    async fn connect_aws(_config: &AwsConfig) -> Result<Self> {
        Err(crate::errors::IssuerError::config(
            "the AWS issuer is not available in this build, enable the `aws` feature",
        ))
    }

    /// Vault issuer over the given API.
    pub fn vault(
        config: VaultConfig,
        api: Arc<dyn VaultApi>,
        shutdown: &CancellationToken,
    ) -> Result<Self> {
        Ok(Self::Vault(VaultIssuer::new(config, api, shutdown)?))
    }

    pub fn cfssl(config: CfsslConfig) -> Result<Self> {
        Ok(Self::Cfssl(CfsslIssuer::new(config)?))
    }

    /// AWS issuer over the given API.
    pub fn aws(config: AwsConfig, api: Arc<dyn AcmPcaApi>) -> Result<Self> {
        Ok(Self::Aws(AwsIssuer::new(config, api)?))
    }

    pub fn kind(&self) -> IssuerKind {
        match self {
            Self::Vault(_) => IssuerKind::Vault,
            Self::Cfssl(_) => IssuerKind::Cfssl,
            Self::Aws(_) => IssuerKind::Aws,
        }
    }

    /// Issue a certificate.
    ///
    /// Performs a single backend call; retrying is up to the caller.
    #[instrument(skip(self, request), fields(issuer = %self.kind(), common_name = %request.common_name))]
    pub async fn issue(&self, request: &CertificateRequest) -> Result<Certificate> {
        let result = match request.validate() {
            Ok(()) => match self {
                Self::Vault(issuer) => issuer.issue(request).await,
                Self::Cfssl(issuer) => issuer.issue(request).await,
                Self::Aws(issuer) => issuer.issue(request).await,
            },
            Err(e) => Err(e),
        };

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "pkiproxy_certificates_issued_total",
            "issuer" => self.kind().as_str(),
            "status" => status
        )
        .increment(1);

        match &result {
            Ok(certificate) => info!(
                serial_number = ?certificate.serial_number,
                expires_at = ?certificate.expires_at,
                chain_len = certificate.ca_chain.len(),
                "Issued certificate"
            ),
            Err(e) => warn!(error = %e, authorization = e.is_authorization(), "Certificate issuance failed"),
        }

        result
    }
}
