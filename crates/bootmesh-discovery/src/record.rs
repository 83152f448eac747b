//! Discovery records as published on the coordination chain.

use crate::error::Result;
use crate::name::AccountName;
use serde::{Deserialize, Serialize};

/// Literal `target_p2p_address` value that opts a peer out of the mesh.
pub const NO_P2P_ADDRESS: &str = "none";

/// A directed trust link declared by a peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerLink {
    pub account: AccountName,
    /// 0..=100
    pub weight: u8,
    #[serde(default)]
    pub comment: String,
}

/// A named, content-addressed artifact a peer wants to boot from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub comment: String,
}

/// One key in an authority.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: String,
    pub weight: u16,
}

/// A weighted-key permission on the target chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
}

impl Authority {
    /// Single-key authority with threshold 1.
    pub fn single_key(key: impl Into<String>) -> Self {
        Self {
            threshold: 1,
            keys: vec![KeyWeight {
                key: key.into(),
                weight: 1,
            }],
        }
    }

    /// Threshold 0, no keys. Nobody can sign for it.
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Owner and active authorities a peer wants its producer account created with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct InitialAuthority {
    pub owner: Authority,
    pub active: Authority,
}

/// A peer's self-published description of itself and the network it
/// wants to launch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Discovery {
    pub seed_network_account_name: AccountName,
    #[serde(default)]
    pub seed_network_peers: Vec<PeerLink>,
    #[serde(default)]
    pub seed_network_launch_block: u64,
    #[serde(default)]
    pub target_network_is_test: u8,
    #[serde(default)]
    pub target_chain_id: String,
    #[serde(default)]
    pub target_account_name: AccountName,
    #[serde(default)]
    pub target_p2p_address: String,
    #[serde(default)]
    pub target_http_address: String,
    #[serde(default)]
    pub target_appointed_block_producer_signing_key: String,
    #[serde(default)]
    pub target_initial_authority: InitialAuthority,
    #[serde(default)]
    pub target_contents: Vec<ContentRef>,
}

impl Discovery {
    /// Decode a YAML discovery document.
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Decode a JSON discovery document.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Look up a declared content reference by artifact name.
    pub fn content_ref(&self, name: &str) -> Option<&ContentRef> {
        self.target_contents.iter().find(|c| c.name == name)
    }

    /// Whether this peer declares a dialable P2P address.
    pub fn has_p2p_address(&self) -> bool {
        !self.target_p2p_address.is_empty() && self.target_p2p_address != NO_P2P_ADDRESS
    }

    pub fn is_test_network(&self) -> bool {
        self.target_network_is_test != 0
    }
}

/// A row of the coordination chain's discovery table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRow {
    /// The account that signed the row.
    pub id: AccountName,
    pub content: Discovery,
    /// Unix seconds of the last publication.
    pub updated_at: u64,
}

impl DiscoveryRow {
    /// The published record with its account name forced to the signer.
    pub fn into_discovery(self) -> Discovery {
        let mut content = self.content;
        content.seed_network_account_name = self.id;
        content
    }

    /// Whether the row was refreshed within `window_secs` of `now`.
    pub fn is_active(&self, now: u64, window_secs: u64) -> bool {
        now.saturating_sub(self.updated_at) <= window_secs
    }
}

/// Decode a JSON array of discovery rows.
pub fn rows_from_json(input: &str) -> Result<Vec<DiscoveryRow>> {
    Ok(serde_json::from_str(input)?)
}

/// Decode a YAML list of discovery rows.
pub fn rows_from_yaml(input: &str) -> Result<Vec<DiscoveryRow>> {
    Ok(serde_yaml::from_str(input)?)
}
