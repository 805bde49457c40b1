//! Wallet keypair decoding and ed25519 signing.

use anyhow::{bail, Context, Result};
use ed25519_dalek::{Signer, SigningKey};

/// Environment variable holding the wallet secret.
pub const PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

/// A Solana wallet backed by a single ed25519 signing key.
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Decode a wallet secret.
    ///
    /// Accepted formats:
    /// - base58 of a 64-byte keypair (`seed || pubkey`)
    /// - base58 of a 32-byte seed
    /// - JSON array of 64 or 32 integers (solana-keygen file contents)
    pub fn from_secret(secret: &str) -> Result<Self> {
        let secret = secret.trim();

        let bytes = if secret.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(secret)
                .context("Invalid keypair JSON array")?
        } else {
            bs58::decode(secret)
                .into_vec()
                .context("Private key is not valid base58")?
        };

        Self::from_bytes(&bytes)
    }

    /// Build from raw key bytes (64-byte keypair or 32-byte seed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let signing_key = match bytes.len() {
            64 => {
                let keypair: [u8; 64] = bytes.try_into()?;
                SigningKey::from_keypair_bytes(&keypair)
                    .context("Keypair public key does not match its secret")?
            }
            32 => {
                let seed: [u8; 32] = bytes.try_into()?;
                SigningKey::from_bytes(&seed)
            }
            n => bail!("Private key must be 32 or 64 bytes, got {}", n),
        };

        Ok(Self { signing_key })
    }

    /// Load the wallet from `WALLET_PRIVATE_KEY`.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(PRIVATE_KEY_ENV)
            .with_context(|| format!("{} not set", PRIVATE_KEY_ENV))?;
        Self::from_secret(&secret)
    }

    /// Base58 public key (the wallet address).
    pub fn pubkey(&self) -> String {
        bs58::encode(self.pubkey_bytes()).into_string()
    }

    pub fn pubkey_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign arbitrary bytes.
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
