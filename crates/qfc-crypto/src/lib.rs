pub mod signer;
pub mod wallet;

pub use signer::{generate_keypair, sign, verify, PublicKey, SecretKey};
pub use wallet::Wallet;
