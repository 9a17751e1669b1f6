// Quantum-safe detached signatures using pqcrypto Dilithium2.
// The ledger core depends only on this contract: keypair generation,
// sign over bytes, verify over bytes. Verification failures are `false`,
// never a panic, so a bad signature cannot abort a validation batch.

use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::DetachedSignature as _;

pub use dilithium2::{PublicKey, SecretKey};

/// Generate a fresh Dilithium2 keypair.
pub fn generate_keypair() -> (PublicKey, SecretKey) {
    dilithium2::keypair()
}

/// Produce a detached signature over `message`.
pub fn sign(message: &[u8], secret_key: &SecretKey) -> Vec<u8> {
    dilithium2::detached_sign(message, secret_key)
        .as_bytes()
        .to_vec()
}

/// Verify a detached signature over `message`.
///
/// Malformed signature bytes and genuine mismatches both verify as `false`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &PublicKey) -> bool {
    let detached_sig = match dilithium2::DetachedSignature::from_bytes(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    dilithium2::verify_detached_signature(&detached_sig, message, public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let (pk, sk) = generate_keypair();
        let sig = sign(b"qfc payload", &sk);
        assert!(verify(b"qfc payload", &sig, &pk));
    }

    #[test]
    fn test_verify_rejects_wrong_keypair() {
        let (_, sk) = generate_keypair();
        let (other_pk, _) = generate_keypair();
        let sig = sign(b"qfc payload", &sk);
        assert!(!verify(b"qfc payload", &sig, &other_pk));
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let (pk, sk) = generate_keypair();
        let sig = sign(b"qfc payload", &sk);
        assert!(!verify(b"qfc payload!", &sig, &pk));
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        let (pk, _) = generate_keypair();
        assert!(!verify(b"qfc payload", &[0u8; 7], &pk));
    }
}
