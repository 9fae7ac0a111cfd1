//! # pkiproxy
//!
//! Pluggable X.509 certificate issuance for a proxy that needs short-lived
//! certificates. One [`Issuer`] hides the differences between HashiCorp Vault
//! PKI, CFSSL and AWS ACM Private CA behind a single `issue` call, and keeps
//! Vault credentials alive with a background renewal task.
//!
//! ## Architecture
//!
//! ```text
//! Settings (PKIPROXY_* env) → Issuer::connect → Vault | CFSSL | AWS
//!                                                 ↓
//!                                  AuthMethod (constant | renewing token)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pkiproxy::{CertificateRequest, Issuer, Result, Settings};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = Settings::from_env()?;
//!     let shutdown = CancellationToken::new();
//!     let issuer = Issuer::connect(&settings.issuer, &shutdown).await?;
//!
//!     let request = CertificateRequest::new("svc.example.com")
//!         .with_ttl(Duration::from_secs(24 * 3600));
//!     let certificate = issuer.issue(&request).await?;
//!     println!("{}", certificate.full_chain_pem());
//!
//!     shutdown.cancel();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod issuers;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::{IssuerConfig, IssuerKind, Settings};
pub use errors::{IssuerError, Result};
pub use issuers::{Certificate, CertificateRequest, Issuer};
pub use secrets::SecretString;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
