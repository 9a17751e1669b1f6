use log::debug;
use sha3::{Digest, Sha3_256};

use crate::signer::{self, PublicKey, SecretKey};

/// A keyholder identity on the QFC ledger.
///
/// The address is derived once from the public key (first 20 bytes of its
/// SHA3-256 digest, `0x`-prefixed) and never changes for the wallet's
/// lifetime.
pub struct Wallet {
    public_key: PublicKey,
    secret_key: SecretKey,
    address: String,
}

impl Wallet {
    pub fn new() -> Self {
        let (public_key, secret_key) = signer::generate_keypair();
        let address = derive_address(&public_key);
        debug!("Wallet created for address {}", address);
        Wallet {
            public_key,
            secret_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Sign an arbitrary payload with this wallet's secret key.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        signer::sign(message, &self.secret_key)
    }

    /// Verify a payload against this wallet's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        signer::verify(message, signature, &self.public_key)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the `0x`-prefixed ledger address for a public key.
pub fn derive_address(public_key: &PublicKey) -> String {
    use pqcrypto_traits::sign::PublicKey as _;

    let digest = Sha3_256::digest(public_key.as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}
