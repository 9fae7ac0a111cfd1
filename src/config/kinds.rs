//! Configuration enums parsed from environment text.
//!
//! The two enums parse differently: an unknown issuer is a hard
//! configuration error, while an unknown auth method resolves to
//! [`AuthMethodKind::Unknown`] and is only rejected when the Vault settings are
//! validated.

use crate::errors::IssuerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported certificate authority families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerKind {
    /// HashiCorp Vault PKI secrets engine
    Vault,
    /// Cloudflare CFSSL signing service
    Cfssl,
    /// AWS ACM Private CA
    Aws,
}

impl IssuerKind {
    /// Returns the canonical configuration name of the issuer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Cfssl => "cfssl",
            Self::Aws => "aws",
        }
    }
}

impl fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssuerKind {
    type Err = IssuerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vault" | "hashicorp" => Ok(Self::Vault),
            "cfssl" | "cloudflare" => Ok(Self::Cfssl),
            "aws" | "amazon" | "acmpca" | "awscmpca" => Ok(Self::Aws),
            _ => Err(IssuerError::config(
                r#"invalid issuer specified, supported issuers are "vault", "cfssl" and "aws""#,
            )),
        }
    }
}

/// Methods for authenticating against Vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethodKind {
    /// Not configured or not recognized; rejected during validation.
    #[default]
    Unknown,
    /// A fixed token that is never renewed.
    ConstantToken,
    /// A renewable token kept alive by a background task.
    RenewingToken,
}

impl AuthMethodKind {
    /// Parse auth method text. Never fails: unrecognized text maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "constant" | "token" | "constant_token" => Self::ConstantToken,
            "renewing" | "renewing_token" => Self::RenewingToken,
            _ => Self::Unknown,
        }
    }

    /// Returns the canonical configuration name of the auth method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::ConstantToken => "constant",
            Self::RenewingToken => "renewing",
        }
    }
}

impl fmt::Display for AuthMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthMethodKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
