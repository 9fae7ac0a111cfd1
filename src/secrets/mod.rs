//! Secret value handling shared by every issuer backend.

pub mod types;

pub use types::SecretString;
