//! Error types for the orchestrator.

use crate::replay::ValidationErrors;
use thiserror::Error;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while booting or joining a network.
#[derive(Debug, Error)]
pub enum Error {
    /// Discovery document could not be read
    #[error("Discovery error: {0}")]
    Discovery(#[from] bootmesh_discovery::Error),

    /// Ordering failed (no reachable network, empty graph)
    #[error("Consensus error: {0}")]
    Consensus(#[from] bootmesh_consensus::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chain RPC collaborator failure
    #[error("Chain RPC error: {0}")]
    Rpc(String),

    /// Reference is not `blake3:<64 hex>`
    #[error("Invalid content reference {0:?}")]
    InvalidReference(String),

    /// The launch discovery doesn't declare an artifact an operation needs
    #[error("Content {0:?} not found in target contents")]
    MissingContent(String),

    /// Downloaded bytes don't hash to the declared digest
    #[error("Content {reference} hashes to {actual}, expected {expected}")]
    ContentIntegrity {
        reference: String,
        expected: String,
        actual: String,
    },

    /// Content store could not deliver a reference
    #[error("Fetching {reference}: {reason}")]
    ContentFetch { reference: String, reason: String },

    /// Boot sequence names an operation outside the registry
    #[error("Unknown operation {tag:?}, use one of: {expected}")]
    UnknownOperation { tag: String, expected: String },

    /// Operation data doesn't match its tag's shape
    #[error("Operation {label:?} [{op}]: invalid data: {reason}")]
    OperationData {
        label: String,
        op: String,
        reason: String,
    },

    /// Operation failed to produce its actions
    #[error("Operation {label:?} [{op}]: {source}")]
    Operation {
        label: String,
        op: String,
        source: Box<Error>,
    },

    /// Chain rejected a chunk after every retry
    #[error("Operation {label:?} [{op}] chunk {chunk} rejected: {source}")]
    ActionSubmission {
        label: String,
        op: String,
        chunk: usize,
        source: Box<Error>,
    },

    /// Retry policy gave up
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: Box<Error> },

    /// Two operations produced byte-identical actions
    #[error("Action {action} produced twice (key {key})")]
    DuplicateExpectedAction { key: String, action: String },

    /// Replay found actions the boot sequence doesn't account for
    #[error("Chain validation failed with {count} mismatch(es):\n{errors}", count = .0.len(), errors = .0)]
    AggregateValidation(ValidationErrors),

    /// Malformed snapshot line
    #[error("Snapshot line {line}: {reason}")]
    Snapshot { line: usize, reason: String },

    /// Genesis data unreadable
    #[error("Invalid genesis data: {0}")]
    Genesis(String),

    /// Malformed key material
    #[error("Invalid key: {0}")]
    Key(String),

    /// Shutdown signalled during a poll loop
    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    /// Poll loop ran past its deadline
    #[error("Timed out waiting for {0}")]
    TimedOut(String),

    /// Canonical action encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
