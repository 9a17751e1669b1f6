use chrono::Utc;
use qfc_crypto::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChainError;

/// Fee rate applied to every transfer: 1% of the amount, derived at
/// construction and never set independently.
pub const FEE_RATE: f64 = 0.01;

/// Native asset ticker.
pub const NATIVE_ASSET: &str = "QFC";

/// A value transfer between two ledger addresses.
///
/// Lifecycle: constructed unsigned, signed by the sender's secret key,
/// submitted, validated against the state manager, included in exactly one
/// block, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub asset: String,
    pub fee: f64,
    pub timestamp: f64,
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, amount: f64) -> Self {
        let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        Transaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            asset: NATIVE_ASSET.to_string(),
            fee: FEE_RATE * amount,
            timestamp,
            signature: None,
        }
    }

    /// Hex SHA-256 digest over the identifying fields.
    ///
    /// The signature is not part of the digest, so signing does not change
    /// the hash it covers.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{}",
            self.sender, self.recipient, self.amount, self.timestamp
        ));
        hex::encode(hasher.finalize())
    }

    /// Sign the transaction hash with the sender's secret key.
    ///
    /// Re-signing requires an explicit [`reset_signature`](Self::reset_signature)
    /// first; silently overwriting would invalidate prior verifications.
    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), ChainError> {
        if self.signature.is_some() {
            return Err(ChainError::AlreadySigned);
        }
        self.signature = Some(qfc_crypto::sign(self.hash().as_bytes(), secret_key));
        Ok(())
    }

    /// Discard the current signature so the transaction can be re-signed.
    pub fn reset_signature(&mut self) {
        self.signature = None;
    }

    /// Verify the attached signature against a public key.
    ///
    /// An unsigned transaction is a hard error; a signature that fails to
    /// verify is `Ok(false)`, never a panic.
    pub fn verify_signature(&self, public_key: &PublicKey) -> Result<bool, ChainError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(ChainError::MissingSignature)?;
        Ok(qfc_crypto::verify(
            self.hash().as_bytes(),
            signature,
            public_key,
        ))
    }

    /// Structural checks independent of ledger state.
    pub fn check_well_formed(&self) -> Result<(), ChainError> {
        if self.sender.is_empty() || self.recipient.is_empty() {
            return Err(ChainError::MalformedTransaction(
                "missing sender or recipient".into(),
            ));
        }
        if self.sender == self.recipient {
            return Err(ChainError::MalformedTransaction(
                "sender and recipient are the same address".into(),
            ));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ChainError::MalformedTransaction(
                "amount must be a positive finite number".into(),
            ));
        }
        Ok(())
    }
}
