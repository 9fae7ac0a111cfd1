//! CFSSL issuer.
//!
//! Talks to the CFSSL HTTP API:
//! - `POST /api/v1/cfssl/sign` signs a caller-supplied CSR,
//! - `POST /api/v1/cfssl/authsign` does the same with an HMAC-authenticated envelope,
//! - `POST /api/v1/cfssl/newcert` generates the key pair server side,
//! - `POST /api/v1/cfssl/info` returns the signing CA, fetched once per issuer.

use crate::config::{CaBundle, CfsslConfig, IssuerKind};
use crate::errors::{IssuerError, Result};
use crate::issuers::request::{Certificate, CertificateRequest};
use crate::secrets::SecretString;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Signing request for `sign` and, wrapped, `authsign`.
#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    certificate_request: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
}

/// `authsign` envelope: the serialized request plus its HMAC.
#[derive(Debug, Serialize)]
struct AuthSignRequest {
    token: String,
    request: String,
}

#[derive(Debug, Serialize)]
struct NewCertRequest<'a> {
    request: KeyRequest<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct KeyRequest<'a> {
    #[serde(rename = "CN")]
    common_name: &'a str,
    hosts: Vec<String>,
    key: KeySpec,
}

#[derive(Debug, Serialize)]
struct KeySpec {
    algo: &'static str,
    size: u32,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self { algo: "ecdsa", size: 256 }
    }
}

#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
}

/// Envelope of every CFSSL API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CertificateResult {
    certificate: String,
    #[serde(default)]
    private_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoResult {
    certificate: String,
}

/// Issues certificates from a CFSSL server.
pub struct CfsslIssuer {
    base_url: Url,
    profile: Option<String>,
    auth_key: Option<Zeroizing<Vec<u8>>>,
    client: reqwest::Client,
    ca_certificate: OnceCell<String>,
}

impl std::fmt::Debug for CfsslIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfsslIssuer")
            .field("base_url", &self.base_url.as_str())
            .field("profile", &self.profile)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CfsslIssuer {
    /// Validate `config` and build the HTTP client, trusting the configured CA bundle.
    pub fn new(config: CfsslConfig) -> Result<Self> {
        config.validate()?;
        let ca_bundle = CaBundle::load_optional(config.ca_cert_path.as_deref())?;

        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(bundle) = &ca_bundle {
            let certificate = reqwest::Certificate::from_pem(&bundle.pem).map_err(|e| {
                IssuerError::config(format!("invalid CA cert '{}': {}", bundle.path.display(), e))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| IssuerError::config(format!("Failed to create HTTP client: {}", e)))?;

        Self::with_client(config, client)
    }

    /// Like [`CfsslIssuer::new`] with a caller-built HTTP client.
    pub fn with_client(config: CfsslConfig, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let auth_key = config.auth_key_bytes()?.map(Zeroizing::new);
        let base_url = config.url.ok_or_else(|| IssuerError::config("CFSSL URL is required"))?;

        Ok(Self {
            base_url,
            profile: config.profile.filter(|profile| !profile.trim().is_empty()),
            auth_key,
            client,
            ca_certificate: OnceCell::new(),
        })
    }

    pub async fn issue(&self, request: &CertificateRequest) -> Result<Certificate> {
        if !request.other_sans.is_empty() {
            return Err(IssuerError::invalid_request("CFSSL does not support other SANs"));
        }

        let hosts = hosts(request);
        let result: CertificateResult = match request.csr.as_deref() {
            Some(csr) => {
                let sign = SignRequest {
                    certificate_request: csr,
                    hosts,
                    profile: self.profile.as_deref(),
                };
                match &self.auth_key {
                    Some(key) => {
                        let envelope = authsign_envelope(key, &sign)?;
                        self.call("authsign", &envelope).await?
                    }
                    None => self.call("sign", &sign).await?,
                }
            }
            None => {
                if self.auth_key.is_some() {
                    return Err(IssuerError::invalid_request(
                        "CFSSL key generation is unauthenticated, supply a CSR when an auth key is configured",
                    ));
                }
                let newcert = NewCertRequest {
                    request: KeyRequest {
                        common_name: &request.common_name,
                        hosts,
                        key: KeySpec::default(),
                    },
                    profile: self.profile.as_deref(),
                };
                self.call("newcert", &newcert).await?
            }
        };

        Ok(Certificate {
            certificate: result.certificate,
            ca_chain: self.ca_chain().await,
            private_key: result.private_key.filter(|key| !key.is_empty()).map(SecretString::new),
            serial_number: None,
            expires_at: None,
        })
    }

    /// The signing CA, fetched on first use. Empty if the server cannot say.
    async fn ca_chain(&self) -> Vec<String> {
        let fetched = self
            .ca_certificate
            .get_or_try_init(|| async {
                let info = InfoRequest { label: "", profile: self.profile.as_deref() };
                let result: InfoResult = self.call("info", &info).await?;
                Ok::<_, IssuerError>(result.certificate)
            })
            .await;

        match fetched {
            Ok(ca) => vec![ca.clone()],
            Err(e) => {
                warn!(error = %e, "Could not fetch CFSSL CA certificate, returning leaf without chain");
                Vec::new()
            }
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/v1/cfssl/{}", self.base_url.as_str().trim_end_matches('/'), name)
    }

    async fn call<B, T>(&self, name: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(name);
        debug!(endpoint = %url, "Calling CFSSL");

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            IssuerError::backend(IssuerKind::Cfssl, format!("{} request failed: {}", name, e))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            IssuerError::backend_status(
                IssuerKind::Cfssl,
                status,
                format!("{} response could not be read: {}", name, e),
            )
        })?;

        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&text).ok();
        match parsed {
            Some(ApiResponse { success: true, result: Some(result), .. })
                if (200..300).contains(&status) =>
            {
                Ok(result)
            }
            Some(ApiResponse { errors, .. }) if !errors.is_empty() => {
                Err(IssuerError::from_status(IssuerKind::Cfssl, status, describe(name, &errors)))
            }
            _ => Err(IssuerError::from_status(
                IssuerKind::Cfssl,
                status,
                format!("{} failed: {}", name, text.trim()),
            )),
        }
    }
}

/// `hosts` for a request: the common name unless excluded, then the URI SANs.
fn hosts(request: &CertificateRequest) -> Vec<String> {
    let mut hosts = Vec::with_capacity(request.uri_sans.len() + 1);
    if !request.exclude_cn_from_sans {
        hosts.push(request.common_name.clone());
    }
    hosts.extend(request.uri_sans.iter().cloned());
    hosts
}

fn describe(name: &str, errors: &[ApiMessage]) -> String {
    let details: Vec<String> =
        errors.iter().map(|e| format!("{} (code {})", e.message, e.code)).collect();
    format!("{} failed: {}", name, details.join("; "))
}

/// Wrap a signing request for `authsign`.
fn authsign_envelope(key: &[u8], request: &SignRequest<'_>) -> Result<AuthSignRequest> {
    let body = serde_json::to_vec(request)?;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| IssuerError::config(format!("invalid CFSSL auth key: {}", e)))?;
    mac.update(&body);

    Ok(AuthSignRequest {
        token: BASE64.encode(mac.finalize().into_bytes()),
        request: BASE64.encode(&body),
    })
}
