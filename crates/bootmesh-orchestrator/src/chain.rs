//! Collaborator interfaces: the coordination chain, the target chain, the
//! content store and the operator console.
//!
//! The orchestrator consumes these and never implements the wire side.
//! Every implementation must be `Send + Sync` so a single instance can be
//! shared behind an `Arc` for the whole run.

use crate::action::Action;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bootmesh_discovery::{AccountName, DiscoveryRow};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// A row of the coordination chain's genesis table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisRow {
    /// Publishing account
    pub id: AccountName,
    pub genesis_json: String,
    #[serde(default)]
    pub initial_p2p_addresses: Vec<String>,
}

/// The pre-existing chain that hosts discovery and genesis tables.
#[async_trait]
pub trait SeedChain: Send + Sync {
    /// All rows of the discovery table.
    async fn discovery_rows(&self) -> Result<Vec<DiscoveryRow>>;

    /// Genesis row published by `account`, if any.
    async fn genesis_row(&self, account: &AccountName) -> Result<Option<GenesisRow>>;

    /// Height of the current head block.
    async fn head_block_num(&self) -> Result<u64>;

    /// Hex id of the block at `height`.
    async fn block_id(&self, height: u64) -> Result<String>;

    async fn publish_genesis(
        &self,
        account: &AccountName,
        genesis_json: &str,
        initial_p2p_addresses: &[String],
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub id: String,
    pub transactions: Vec<Transaction>,
}

/// A named permission as reported by the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub parent: String,
    pub threshold: u32,
}

/// The chain being launched.
#[async_trait]
pub trait TargetChain: Send + Sync {
    /// Sign and push one batch of actions as a single transaction.
    async fn push_actions(&self, actions: &[Action]) -> Result<()>;

    /// Block at `height`, or `None` if not produced yet.
    async fn block(&self, height: u64) -> Result<Option<Block>>;

    async fn account_permissions(&self, account: &AccountName) -> Result<Vec<Permission>>;
}

/// Content-addressed blob store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Raw bytes for `reference`. The caller verifies the digest.
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Interactive operator input.
#[async_trait]
pub trait OperatorInput: Send + Sync {
    /// Show `prompt` and read one trimmed line.
    async fn read_line(&self, prompt: &str) -> Result<String>;
}

/// Operator input over the process's stdin and stderr.
pub struct StdinInput {
    reader: Mutex<BufReader<tokio::io::Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorInput for StdinInput {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        let read = self.reader.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "operator input closed",
            )));
        }
        Ok(line.trim().to_string())
    }
}
