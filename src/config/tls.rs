use std::path::{Path, PathBuf};

use crate::errors::{IssuerError, Result};

/// A CA bundle used to verify the TLS connection to a certificate authority.
#[derive(Debug, Clone)]
pub struct CaBundle {
    pub path: PathBuf,
    pub pem: Vec<u8>,
}

impl CaBundle {
    /// Read and sanity-check a PEM CA bundle.
    ///
    /// Fails with a configuration error if the file cannot be read or holds no
    /// PEM certificate, so a bad path is caught at startup instead of on the
    /// first issuance.
    pub fn load(path: &Path) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            IssuerError::config(format!("cannot read CA cert '{}': {}", path.display(), e))
        })?;

        if !String::from_utf8_lossy(&pem).contains("-----BEGIN CERTIFICATE-----") {
            return Err(IssuerError::config(format!(
                "CA cert '{}' does not contain a PEM certificate",
                path.display()
            )));
        }

        Ok(Self { path: path.to_path_buf(), pem })
    }

    /// Load the bundle when a path is configured.
    pub fn load_optional(path: Option<&Path>) -> Result<Option<Self>> {
        path.map(Self::load).transpose()
    }
}
