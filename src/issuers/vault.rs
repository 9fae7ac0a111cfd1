//! Vault PKI issuer.
//!
//! Certificates come from the PKI secrets engine's `issue` endpoint (Vault
//! generates the key) or its `sign` endpoint when the request carries a CSR.
//! Every call authenticates with the session of the configured [`AuthMethod`].

use crate::config::{AuthMethodKind, IssuerKind, VaultConfig};
use crate::errors::{IssuerError, Result};
use crate::issuers::auth::{AuthMethod, TokenAuthority, TokenLease};
use crate::issuers::encoding::{decode_sans, encode_sans, format_duration};
use crate::issuers::request::{Certificate, CertificateRequest};
use crate::secrets::SecretString;
use async_trait::async_trait;
use chrono::DateTime;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

/// Body of a Vault PKI `issue` or `sign` call.
///
/// SAN lists are already comma-joined; `None` fields are left out of the
/// request entirely so Vault applies the role defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultCertificateRequest {
    pub common_name: String,
    pub exclude_cn_from_sans: bool,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_sans: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_sans: Option<String>,
    pub ttl: String,
}

/// The fields of a Vault PKI response the issuer uses.
#[derive(Debug, Clone, Default)]
pub struct VaultCertificateResponse {
    pub certificate: String,
    pub issuing_ca: String,
    /// Full chain, when Vault returns one.
    pub ca_chain: Vec<String>,
    /// Only set by `issue`.
    pub private_key: Option<SecretString>,
    pub serial_number: String,
    /// Unix timestamp.
    pub expiration: Option<u64>,
}

/// The Vault endpoints used by the issuer and its credential provider.
#[async_trait]
pub trait VaultApi: TokenAuthority {
    /// `POST /v1/{mount}/issue/{role}`
    async fn issue(
        &self,
        token: &SecretString,
        mount: &str,
        role: &str,
        request: &VaultCertificateRequest,
    ) -> Result<VaultCertificateResponse>;

    /// `POST /v1/{mount}/sign/{role}`
    async fn sign(
        &self,
        token: &SecretString,
        mount: &str,
        role: &str,
        request: &VaultCertificateRequest,
    ) -> Result<VaultCertificateResponse>;
}

/// Exposes the token endpoints of a [`VaultApi`] to the credential provider.
#[derive(Debug)]
struct ApiAuthority(Arc<dyn VaultApi>);

#[async_trait]
impl TokenAuthority for ApiAuthority {
    async fn renew_self(&self, token: &SecretString, increment: Duration) -> Result<TokenLease> {
        self.0.renew_self(token, increment).await
    }
}

/// Issues certificates from a Vault PKI mount.
pub struct VaultIssuer {
    config: VaultConfig,
    auth: AuthMethod,
    api: Arc<dyn VaultApi>,
}

impl std::fmt::Debug for VaultIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultIssuer")
            .field("url", &self.config.url.as_ref().map(|url| url.as_str()))
            .field("mount", &self.config.mount)
            .field("role", &self.config.role)
            .field("auth_method", &self.auth.kind())
            .field("api", &"[VaultApi]")
            .finish()
    }
}

impl VaultIssuer {
    /// Validate `config` and bind the credential provider to `api`.
    ///
    /// A renewing token's background task stops when `shutdown` is cancelled.
    pub fn new(
        config: VaultConfig,
        api: Arc<dyn VaultApi>,
        shutdown: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        if config.auth_method == AuthMethodKind::Unknown {
            warn!("Vault token setting is deprecated, configure the constant auth method instead");
        }
        let auth = AuthMethod::new(config.auth()?, Arc::new(ApiAuthority(api.clone())), shutdown);

        info!(
            url = ?config.url.as_ref().map(|url| url.as_str()),
            mount = %config.mount,
            role = %config.role,
            auth_method = %auth.kind().as_str(),
            "Vault PKI issuer initialized"
        );

        Ok(Self { config, auth, api })
    }

    pub fn auth(&self) -> &AuthMethod {
        &self.auth
    }

    /// Translate a request into Vault's wire form.
    pub fn build_request(&self, request: &CertificateRequest) -> VaultCertificateRequest {
        VaultCertificateRequest {
            common_name: request.common_name.clone(),
            exclude_cn_from_sans: request.exclude_cn_from_sans,
            format: request.output_format.clone(),
            csr: request.csr.clone(),
            uri_sans: encode_sans(&merge_sans(&request.uri_sans, &self.config.uri_sans)),
            other_sans: encode_sans(&merge_sans(&request.other_sans, &self.config.other_sans)),
            ttl: format_duration(request.effective_ttl(self.config.time_to_live)),
        }
    }

    pub async fn issue(&self, request: &CertificateRequest) -> Result<Certificate> {
        let session = self.auth.ensure_authorized().await?;
        let body = self.build_request(request);

        debug!(
            common_name = %body.common_name,
            ttl = %body.ttl,
            signing = body.csr.is_some(),
            generation = session.generation(),
            "Requesting certificate from Vault PKI"
        );

        let response = if body.csr.is_some() {
            self.api.sign(session.token(), &self.config.mount, &self.config.role, &body).await?
        } else {
            self.api.issue(session.token(), &self.config.mount, &self.config.role, &body).await?
        };

        Ok(normalize(response))
    }
}

/// Request SANs first, then configured ones; duplicates dropped, order kept.
fn merge_sans(requested: &[String], configured: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(requested.len() + configured.len());
    for san in requested.iter().chain(configured) {
        if !merged.contains(san) {
            merged.push(san.clone());
        }
    }
    merged
}

fn normalize(response: VaultCertificateResponse) -> Certificate {
    let ca_chain = if !response.ca_chain.is_empty() {
        response.ca_chain
    } else if !response.issuing_ca.trim().is_empty() {
        vec![response.issuing_ca]
    } else {
        Vec::new()
    };

    Certificate {
        certificate: response.certificate,
        ca_chain,
        private_key: response.private_key.filter(|key| !key.is_blank()),
        serial_number: Some(response.serial_number).filter(|serial| !serial.is_empty()),
        expires_at: response
            .expiration
            .and_then(|ts| i64::try_from(ts).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
    }
}

/// [`VaultApi`] over HTTP, using `vaultrs`.
///
/// A `VaultClient` carries its token, so one client is kept for the most
/// recently used token and rebuilt when the token changes.
pub struct VaultHttpClient {
    address: String,
    ca_cert_path: Option<PathBuf>,
    client: Mutex<Option<(SecretString, Arc<VaultClient>)>>,
}

impl std::fmt::Debug for VaultHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultHttpClient")
            .field("address", &self.address)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultHttpClient {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let address = config
            .url
            .as_ref()
            .ok_or_else(|| IssuerError::config("Vault URL is required"))?
            .to_string();

        Ok(Self { address, ca_cert_path: config.ca_cert_path.clone(), client: Mutex::new(None) })
    }

    fn client_for(&self, token: &SecretString) -> Result<Arc<VaultClient>> {
        let mut cached = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_token, client)) = cached.as_ref() {
            if cached_token.expose_secret() == token.expose_secret() {
                return Ok(Arc::clone(client));
            }
        }

        let mut builder = VaultClientSettingsBuilder::default();
        builder.address(self.address.as_str()).token(token.expose_secret());
        if let Some(path) = &self.ca_cert_path {
            builder.ca_certs(vec![path.to_string_lossy().into_owned()]);
        }

        let settings = builder
            .build()
            .map_err(|e| IssuerError::config(format!("Invalid Vault configuration: {}", e)))?;
        let client = Arc::new(VaultClient::new(settings).map_err(|e| {
            IssuerError::backend(IssuerKind::Vault, format!("Failed to create Vault client: {}", e))
        })?);

        *cached = Some((token.clone(), Arc::clone(&client)));
        Ok(client)
    }
}

fn vault_error(context: &str, error: ClientError) -> IssuerError {
    match error {
        ClientError::APIError { code, errors } => {
            IssuerError::from_status(IssuerKind::Vault, code, format!("{}: {}", context, errors.join("; ")))
        }
        other => IssuerError::backend(IssuerKind::Vault, format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl TokenAuthority for VaultHttpClient {
    async fn renew_self(&self, token: &SecretString, increment: Duration) -> Result<TokenLease> {
        let client = self.client_for(token)?;
        let increment = format_duration(increment);

        let auth = vaultrs::token::renew_self(client.as_ref(), Some(increment.as_str()))
            .await
            .map_err(|e| vault_error("token renewal failed", e))?;

        Ok(TokenLease {
            token: SecretString::new(auth.client_token),
            lease_duration: Duration::from_secs(auth.lease_duration),
            renewable: auth.renewable,
        })
    }
}

#[async_trait]
impl VaultApi for VaultHttpClient {
    async fn issue(
        &self,
        token: &SecretString,
        mount: &str,
        role: &str,
        request: &VaultCertificateRequest,
    ) -> Result<VaultCertificateResponse> {
        use vaultrs::api::pki::requests::GenerateCertificateRequestBuilder;

        let client = self.client_for(token)?;

        let mut opts = GenerateCertificateRequestBuilder::default();
        opts.common_name(request.common_name.as_str())
            .exclude_cn_from_sans(request.exclude_cn_from_sans)
            .format(request.format.as_str())
            .ttl(request.ttl.as_str());
        if let Some(uri_sans) = &request.uri_sans {
            opts.uri_sans(uri_sans.as_str());
        }
        if let Some(other_sans) = &request.other_sans {
            opts.other_sans(decode_sans(other_sans));
        }

        let response = vaultrs::pki::cert::generate(client.as_ref(), mount, role, Some(&mut opts))
            .await
            .map_err(|e| vault_error("certificate issuance failed", e))?;

        Ok(VaultCertificateResponse {
            certificate: response.certificate,
            issuing_ca: response.issuing_ca,
            ca_chain: response.ca_chain.unwrap_or_default(),
            private_key: Some(SecretString::new(response.private_key)),
            serial_number: response.serial_number,
            expiration: response.expiration,
        })
    }

    async fn sign(
        &self,
        token: &SecretString,
        mount: &str,
        role: &str,
        request: &VaultCertificateRequest,
    ) -> Result<VaultCertificateResponse> {
        use vaultrs::api::pki::requests::SignCertificateRequestBuilder;

        let csr = request
            .csr
            .as_deref()
            .ok_or_else(|| IssuerError::invalid_request("signing requires a CSR"))?;
        let client = self.client_for(token)?;

        let mut opts = SignCertificateRequestBuilder::default();
        opts.exclude_cn_from_sans(request.exclude_cn_from_sans)
            .format(request.format.as_str())
            .ttl(request.ttl.as_str());
        if let Some(uri_sans) = &request.uri_sans {
            opts.uri_sans(uri_sans.as_str());
        }
        if let Some(other_sans) = &request.other_sans {
            opts.other_sans(decode_sans(other_sans));
        }

        let response = vaultrs::pki::cert::ca::sign(
            client.as_ref(),
            mount,
            role,
            csr,
            &request.common_name,
            Some(&mut opts),
        )
        .await
        .map_err(|e| vault_error("certificate signing failed", e))?;

        Ok(VaultCertificateResponse {
            certificate: response.certificate,
            issuing_ca: response.issuing_ca,
            ca_chain: response.ca_chain.unwrap_or_default(),
            private_key: None,
            serial_number: response.serial_number,
            expiration: None,
        })
    }
}
