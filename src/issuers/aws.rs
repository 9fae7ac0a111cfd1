//! AWS ACM Private CA issuer.
//!
//! ACM PCA only signs CSRs. Issuance is asynchronous on the AWS side:
//! `IssueCertificate` returns a certificate ARN and `GetCertificate` reports
//! the request as in progress until the CA has signed it, so the issuer polls
//! with a bounded backoff.

use crate::config::{AwsConfig, IssuerKind};
use crate::errors::{IssuerError, Result};
use crate::issuers::backoff::RetryConfig;
use crate::issuers::request::{Certificate, CertificateRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Input of an `IssueCertificate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCertificateInput {
    pub certificate_authority_arn: String,
    pub csr: String,
    pub signing_algorithm: String,
    pub validity_days: u32,
    pub idempotency_token: String,
}

/// Outcome of a `GetCertificate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    /// The CA has not finished signing.
    InProgress,
    Issued { certificate: String, certificate_chain: Option<String> },
}

/// The ACM PCA operations used by the issuer.
#[async_trait]
pub trait AcmPcaApi: Send + Sync + std::fmt::Debug {
    /// Returns the ARN of the certificate being issued.
    async fn issue_certificate(&self, input: &IssueCertificateInput) -> Result<String>;

    async fn get_certificate(
        &self,
        certificate_authority_arn: &str,
        certificate_arn: &str,
    ) -> Result<CertificateStatus>;
}

/// Convert a requested lifetime to ACM PCA validity days.
///
/// Whole days, rounded down, never less than one. Zero means `default_days`.
pub fn ttl_to_days(time_to_live: Duration, default_days: u32) -> u32 {
    if time_to_live.is_zero() {
        return default_days;
    }
    let days = time_to_live.as_secs() / SECONDS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX).max(1)
}

/// Issues certificates from an ACM Private CA.
#[derive(Debug)]
pub struct AwsIssuer {
    config: AwsConfig,
    api: Arc<dyn AcmPcaApi>,
    poll: RetryConfig,
}

impl AwsIssuer {
    pub fn new(config: AwsConfig, api: Arc<dyn AcmPcaApi>) -> Result<Self> {
        config.validate()?;
        info!(
            region = %config.region,
            certificate_authority_arn = %config.certificate_authority_arn,
            "AWS ACM PCA issuer initialized"
        );
        Ok(Self { config, api, poll: RetryConfig::issuance_poll() })
    }

    /// Override how `GetCertificate` is polled.
    pub fn with_poll_config(mut self, poll: RetryConfig) -> Self {
        self.poll = poll;
        self
    }

    pub async fn issue(&self, request: &CertificateRequest) -> Result<Certificate> {
        let csr = request
            .csr
            .as_deref()
            .ok_or_else(|| IssuerError::invalid_request("AWS ACM PCA requires a CSR"))?;

        let input = IssueCertificateInput {
            certificate_authority_arn: self.config.certificate_authority_arn.clone(),
            csr: csr.to_string(),
            signing_algorithm: self.config.signing_algorithm.clone(),
            validity_days: ttl_to_days(request.time_to_live, self.config.time_to_live_days),
            idempotency_token: uuid::Uuid::new_v4().simple().to_string(),
        };

        let certificate_arn = self.api.issue_certificate(&input).await?;
        debug!(
            certificate_arn = %certificate_arn,
            validity_days = input.validity_days,
            "ACM PCA accepted certificate request"
        );

        for attempt in 0..self.poll.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.poll.backoff_for_attempt(attempt)).await;
            }

            match self
                .api
                .get_certificate(&self.config.certificate_authority_arn, &certificate_arn)
                .await?
            {
                CertificateStatus::Issued { certificate, certificate_chain } => {
                    return Ok(Certificate {
                        certificate,
                        ca_chain: certificate_chain.as_deref().map(split_pem_chain).unwrap_or_default(),
                        private_key: None,
                        serial_number: serial_from_arn(&certificate_arn),
                        expires_at: None,
                    });
                }
                CertificateStatus::InProgress => {
                    debug!(certificate_arn = %certificate_arn, attempt = attempt + 1, "Certificate still in progress");
                }
            }
        }

        Err(IssuerError::backend(
            IssuerKind::Aws,
            format!(
                "certificate {} still in progress after {} attempts",
                certificate_arn, self.poll.max_attempts
            ),
        ))
    }
}

/// The serial is the last path segment of a certificate ARN.
fn serial_from_arn(certificate_arn: &str) -> Option<String> {
    certificate_arn
        .rsplit_once("/certificate/")
        .map(|(_, serial)| serial.to_string())
        .filter(|serial| !serial.is_empty())
}

/// Split a concatenated PEM chain into individual certificates.
fn split_pem_chain(chain: &str) -> Vec<String> {
    const END: &str = "-----END CERTIFICATE-----";
    chain
        .split_inclusive(END)
        .map(str::trim)
        .filter(|pem| pem.ends_with(END))
        .map(str::to_string)
        .collect()
}

#[cfg(feature = "aws")]
pub use sdk::AcmPcaClient;

#[cfg(feature = "aws")]
mod sdk {
    use super::{AcmPcaApi, CertificateStatus, IssueCertificateInput};
    use crate::config::{AwsConfig, IssuerKind};
    use crate::errors::{IssuerError, Result};
    use async_trait::async_trait;
    use aws_sdk_acmpca::error::{DisplayErrorContext, SdkError};
    use aws_sdk_acmpca::primitives::Blob;
    use aws_sdk_acmpca::types::{SigningAlgorithm, Validity, ValidityPeriodType};

    /// [`AcmPcaApi`] backed by the AWS SDK.
    #[derive(Debug)]
    pub struct AcmPcaClient {
        client: aws_sdk_acmpca::Client,
    }

    impl AcmPcaClient {
        /// Build a client for the configured region. Explicit credentials take
        /// precedence over the SDK's default provider chain.
        pub async fn new(config: &AwsConfig) -> Self {
            let mut loader =
                aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

            if let (Some(access_key), Some(secret_key)) =
                (&config.access_key_id, &config.access_key_secret)
            {
                let credentials = aws_sdk_acmpca::config::Credentials::new(
                    access_key,
                    secret_key.expose_secret(),
                    None,
                    None,
                    "pkiproxy-explicit",
                );
                loader = loader.credentials_provider(credentials);
            }

            let sdk_config = loader.load().await;
            Self { client: aws_sdk_acmpca::Client::new(&sdk_config) }
        }
    }

    fn sdk_error<E>(operation: &str, error: SdkError<E>) -> IssuerError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let status = error.raw_response().map(|raw| raw.status().as_u16());
        let message = format!("{} failed: {}", operation, DisplayErrorContext(&error));
        match status {
            Some(code) => IssuerError::from_status(IssuerKind::Aws, code, message),
            None => IssuerError::backend(IssuerKind::Aws, message),
        }
    }

    #[async_trait]
    impl AcmPcaApi for AcmPcaClient {
        async fn issue_certificate(&self, input: &IssueCertificateInput) -> Result<String> {
            let validity = Validity::builder()
                .r#type(ValidityPeriodType::Days)
                .value(i64::from(input.validity_days))
                .build()
                .map_err(|e| IssuerError::invalid_request(format!("invalid validity: {}", e)))?;

            let output = self
                .client
                .issue_certificate()
                .certificate_authority_arn(&input.certificate_authority_arn)
                .csr(Blob::new(input.csr.as_bytes()))
                .signing_algorithm(SigningAlgorithm::from(input.signing_algorithm.as_str()))
                .validity(validity)
                .idempotency_token(&input.idempotency_token)
                .send()
                .await
                .map_err(|e| sdk_error("IssueCertificate", e))?;

            output.certificate_arn().map(str::to_string).ok_or_else(|| {
                IssuerError::backend(IssuerKind::Aws, "IssueCertificate returned no certificate ARN")
            })
        }

        async fn get_certificate(
            &self,
            certificate_authority_arn: &str,
            certificate_arn: &str,
        ) -> Result<CertificateStatus> {
            let result = self
                .client
                .get_certificate()
                .certificate_authority_arn(certificate_authority_arn)
                .certificate_arn(certificate_arn)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let certificate = output.certificate().map(str::to_string).ok_or_else(|| {
                        IssuerError::backend(IssuerKind::Aws, "GetCertificate returned no certificate")
                    })?;
                    Ok(CertificateStatus::Issued {
                        certificate,
                        certificate_chain: output.certificate_chain().map(str::to_string),
                    })
                }
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|service| service.is_request_in_progress_exception()) =>
                {
                    Ok(CertificateStatus::InProgress)
                }
                Err(e) => Err(sdk_error("GetCertificate", e)),
            }
        }
    }
}
