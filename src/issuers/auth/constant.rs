use super::Session;
use crate::errors::{IssuerError, Result};
use crate::secrets::SecretString;
use std::sync::Arc;

/// A fixed token. Never renewed.
#[derive(Debug)]
pub struct ConstantToken {
    session: Arc<Session>,
}

impl ConstantToken {
    pub fn new(token: SecretString) -> Self {
        Self { session: Arc::new(Session::unbounded(token)) }
    }

    pub fn ensure_authorized(&self) -> Result<Arc<Session>> {
        if self.session.token().is_blank() {
            return Err(IssuerError::authorization("constant Vault token is empty"));
        }
        Ok(Arc::clone(&self.session))
    }
}
