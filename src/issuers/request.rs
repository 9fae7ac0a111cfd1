//! Normalized certificate request and result shared by all issuers.

use crate::errors::{IssuerError, Result};
use crate::secrets::SecretString;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Output format requested when the caller does not choose one.
pub const DEFAULT_OUTPUT_FORMAT: &str = "pem";

/// A certificate request in backend-neutral form.
///
/// SAN lists keep the caller's order; backends that flatten them into a
/// delimited string render them in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub common_name: String,
    /// Keep the common name out of the DNS/email SANs.
    pub exclude_cn_from_sans: bool,
    pub uri_sans: Vec<String>,
    /// OID/UTF8 SANs in OpenSSL `<oid>;UTF8:<value>` form.
    pub other_sans: Vec<String>,
    /// Requested validity. Zero means the issuer's configured default.
    pub time_to_live: Duration,
    pub output_format: String,
    /// PEM-encoded CSR. When absent, backends that can generate the key do so.
    pub csr: Option<String>,
}

impl CertificateRequest {
    /// Start a request for `common_name` with backend defaults for everything else.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            exclude_cn_from_sans: false,
            uri_sans: Vec::new(),
            other_sans: Vec::new(),
            time_to_live: Duration::ZERO,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            csr: None,
        }
    }

    pub fn with_ttl(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    pub fn with_uri_san(mut self, san: impl Into<String>) -> Self {
        self.uri_sans.push(san.into());
        self
    }

    pub fn with_other_san(mut self, san: impl Into<String>) -> Self {
        self.other_sans.push(san.into());
        self
    }

    pub fn with_csr(mut self, csr: impl Into<String>) -> Self {
        self.csr = Some(csr.into());
        self
    }

    pub fn excluding_cn_from_sans(mut self) -> Self {
        self.exclude_cn_from_sans = true;
        self
    }

    /// The requested TTL, or `default` when none was requested.
    pub fn effective_ttl(&self, default: Duration) -> Duration {
        if self.time_to_live.is_zero() {
            default
        } else {
            self.time_to_live
        }
    }

    /// Reject requests no backend could honor.
    pub fn validate(&self) -> Result<()> {
        if self.common_name.trim().is_empty() {
            return Err(IssuerError::invalid_request("common name cannot be empty"));
        }
        if let Some(san) =
            self.uri_sans.iter().chain(self.other_sans.iter()).find(|san| san.contains(','))
        {
            return Err(IssuerError::invalid_request(format!(
                "SAN '{}' contains a comma, which is the list delimiter",
                san
            )));
        }
        if self.csr.as_deref().is_some_and(|csr| !csr.contains("CERTIFICATE REQUEST")) {
            return Err(IssuerError::invalid_request("CSR is not PEM encoded"));
        }
        Ok(())
    }
}

/// A certificate returned by an issuer.
#[derive(Clone, Serialize)]
pub struct Certificate {
    /// PEM-encoded leaf certificate.
    pub certificate: String,
    /// PEM-encoded issuing chain, closest issuer first.
    pub ca_chain: Vec<String>,
    /// Present when the CA generated the key pair.
    pub private_key: Option<SecretString>,
    pub serial_number: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Certificate {
    /// Leaf followed by the chain, as a TLS server presents it.
    pub fn full_chain_pem(&self) -> String {
        let mut pem = self.certificate.trim_end().to_string();
        for ca in &self.ca_chain {
            pem.push('\n');
            pem.push_str(ca.trim_end());
        }
        pem.push('\n');
        pem
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("certificate", &format!("[{} bytes PEM]", self.certificate.len()))
            .field("ca_chain", &format!("[{} certificates]", self.ca_chain.len()))
            .field("private_key", &self.private_key)
            .field("serial_number", &self.serial_number)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
