//! Ephemeral boot key.
//!
//! The boot node signs the whole boot sequence with a key generated for
//! this run only, then hands the private half to the other operators as
//! proof it kept no privileged access.

use crate::error::{Error, Result};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::fmt;

pub struct EphemeralKey {
    signing_key: SigningKey,
}

impl EphemeralKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Hex public key, as embedded in genesis data.
    pub fn public_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Hex private key, revealed only at handoff.
    pub fn private_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

// Never print the private half.
impl fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKey")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

/// Hex public key matching a hex private key.
pub fn public_key_of(private_hex: &str) -> Result<String> {
    let bytes = hex::decode(private_hex.trim()).map_err(|e| Error::Key(e.to_string()))?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Key(format!("expected 32 bytes, got {}", b.len())))?;
    let signing_key = SigningKey::from_bytes(&secret);
    Ok(hex::encode(signing_key.verifying_key().as_bytes()))
}
