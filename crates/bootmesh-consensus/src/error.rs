//! Error types for consensus ordering.

use bootmesh_discovery::AccountName;
use thiserror::Error;

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ordering peers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The local peer is not in any network and none of its links resolve.
    #[error("{account} belongs to no discovered network and links to none")]
    NoReachableNetwork { account: AccountName },

    /// No peer survived validation.
    #[error("no valid peers discovered")]
    EmptyGraph,
}
