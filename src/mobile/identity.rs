use log::{debug, warn};

use crate::error_handling::types::IdentityError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: String,
}

/// Resolves and unlocks the identity a node acts as.
pub trait IdentitySelector: Send + Sync {
    /// Unlocks `address`, or the default identity when `address` is empty.
    fn use_or_create(
        &self,
        address: &str,
        passphrase: &str,
        chain_id: i64,
    ) -> Result<Identity, IdentityError>;
}

/// Selector backed by a single identity from the configuration file.
pub struct ConfiguredIdentitySelector {
    address: String,
    passphrase: String,
}

impl ConfiguredIdentitySelector {
    pub fn new(address: &str, passphrase: &str) -> Self {
        Self {
            address: address.to_string(),
            passphrase: passphrase.to_string(),
        }
    }
}

impl IdentitySelector for ConfiguredIdentitySelector {
    fn use_or_create(
        &self,
        address: &str,
        passphrase: &str,
        chain_id: i64,
    ) -> Result<Identity, IdentityError> {
        let address = if address.is_empty() {
            self.address.as_str()
        } else {
            address
        };
        if address.is_empty() {
            return Err(IdentityError::NoIdentity);
        }
        if !address.eq_ignore_ascii_case(&self.address) || passphrase != self.passphrase {
            warn!("Refusing to unlock identity {}", address);
            return Err(IdentityError::UnlockFailed(address.to_string()));
        }

        debug!("Identity {} unlocked on chain {}", address, chain_id);
        Ok(Identity {
            address: address.to_string(),
        })
    }
}
