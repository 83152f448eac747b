//! Peers as they move through ordering and scheduling.

use bootmesh_discovery::{AccountName, Discovery};

/// A validated peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Packed seed-network account name.
    pub id: u64,
    pub discovery: Discovery,
    /// Sum of inbound link weights from the peer's own network.
    pub total_weight: u64,
    /// Published recently enough to count as live.
    pub active: bool,
    /// Producer name override when this entry pads the schedule.
    pub clone_name: Option<AccountName>,
}

impl Peer {
    pub fn new(id: u64, discovery: Discovery, active: bool) -> Self {
        Self {
            id,
            discovery,
            total_weight: 0,
            active,
            clone_name: None,
        }
    }

    /// Coordination-chain account.
    pub fn account(&self) -> &AccountName {
        &self.discovery.seed_network_account_name
    }

    /// Target-chain producer account, honoring the clone override.
    pub fn producer_name(&self) -> &AccountName {
        self.clone_name
            .as_ref()
            .unwrap_or(&self.discovery.target_account_name)
    }

    pub fn is_clone(&self) -> bool {
        self.clone_name.is_some()
    }
}
