//! Short-lived engine credentials derived from a signature over the session id.

use std::fmt::Write;
use std::sync::Arc;
use uuid::Uuid;

use super::engine::UserCredentials;
use crate::error_handling::types::ConnectionError;

/// Signs messages on behalf of an unlocked identity.
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String>;
}

/// Returns the signer for a consumer identity.
pub type SignerFactory = Arc<dyn Fn(&str) -> Arc<dyn Signer> + Send + Sync>;

pub trait CredentialProvider: Send + Sync {
    fn credentials(
        &self,
        session_id: Uuid,
        signer: &dyn Signer,
    ) -> Result<UserCredentials, ConnectionError>;
}

/// Username is the session id, password the hex signature of it.
pub struct SignatureCredentialProvider;

impl CredentialProvider for SignatureCredentialProvider {
    fn credentials(
        &self,
        session_id: Uuid,
        signer: &dyn Signer,
    ) -> Result<UserCredentials, ConnectionError> {
        let username = session_id.to_string();
        let signature = signer
            .sign(username.as_bytes())
            .map_err(ConnectionError::CredentialError)?;

        let mut password = String::with_capacity(signature.len() * 2);
        for byte in signature {
            let _ = write!(password, "{:02x}", byte);
        }
        Ok(UserCredentials { username, password })
    }
}
