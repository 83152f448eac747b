//! Genesis parameters for the target chain.

use crate::error::{Error, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout the target chain expects.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Genesis data the boot node publishes and joiners start from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisData {
    pub initial_timestamp: String,
    /// Ephemeral public key the boot node booted with
    pub initial_key: String,
    #[serde(default)]
    pub initial_chain_id: String,
}

impl GenesisData {
    pub fn new(at: DateTime<Utc>, initial_key: &str, chain_id: &str) -> Self {
        Self {
            initial_timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            initial_key: initial_key.to_string(),
            initial_chain_id: chain_id.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Unpadded base64 of the JSON form, easy to paste between operators.
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD_NO_PAD.encode(self.to_json()?))
    }

    /// Decode raw JSON, or base64 JSON (which always starts with `ey`).
    pub fn decode(input: &str) -> Result<Self> {
        let text = input.trim();
        let json = if text.starts_with("ey") {
            let bytes = STANDARD_NO_PAD
                .decode(text)
                .or_else(|_| STANDARD.decode(text))
                .map_err(|e| Error::Genesis(format!("bad base64: {}", e)))?;
            String::from_utf8(bytes).map_err(|e| Error::Genesis(e.to_string()))?
        } else {
            text.to_string()
        };

        if !json.starts_with('{') {
            return Err(Error::Genesis("neither JSON nor base64-encoded JSON".into()));
        }
        Ok(serde_json::from_str(&json)?)
    }
}
