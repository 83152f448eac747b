//! Error types for discovery records.

use thiserror::Error;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A chain account name that cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("account name is empty")]
    Empty,

    #[error("account name {name:?} is longer than 13 characters")]
    TooLong { name: String },

    #[error("account name {name:?} has invalid character {ch:?} at position {position}")]
    InvalidChar { name: String, ch: char, position: usize },
}

/// A malformed discovery document.
///
/// Raised per peer: the peer carrying the document is isolated from the
/// graph and the rest of the build continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("seed_network_account_name: {0}")]
    SeedAccount(NameError),

    #[error("seed_network_peers[{index}] ({account}): weight {weight} outside 0..=100")]
    PeerWeight { index: usize, account: String, weight: u8 },

    #[error("target_account_name is missing")]
    TargetAccountMissing,

    #[error("target_account_name {0:?} must be exactly 12 characters")]
    TargetAccountLength(String),

    #[error("target_account_name {0:?} must not contain '.'")]
    TargetAccountDot(String),

    #[error("target_p2p_address {0:?} must not contain a scheme")]
    P2pScheme(String),

    #[error("target_p2p_address {0:?} must be host:port")]
    P2pMissingPort(String),

    #[error("target_p2p_address {0:?} contains invalid characters")]
    P2pInvalidChars(String),

    #[error("target_http_address {0:?} must include a scheme")]
    HttpScheme(String),

    #[error("target_http_address {0:?} must not contain spaces")]
    HttpSpaces(String),

    #[error("target_initial_authority.{permission} has no keys")]
    AuthorityNoKeys { permission: &'static str },

    #[error("target_initial_authority.{permission} key {index} has zero weight")]
    AuthorityZeroWeight { permission: &'static str, index: usize },
}

/// Errors raised while reading discovery documents.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid account name: {0}")]
    Name(#[from] NameError),

    #[error("Invalid discovery document: {0}")]
    Validation(#[from] ValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
