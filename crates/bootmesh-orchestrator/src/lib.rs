//! Bootmesh Orchestrator
//!
//! Drives one node through the launch of a new chain: agree on the network
//! with the other operators, wait for the launch block, boot the chain or
//! join it, and verify what the boot node did.
//!
//! # Architecture
//!
//! - **Launch**: discovery rows to a [`NetworkView`] and the launch-block seed
//! - **Content**: digest-addressed downloads into a local [`ContentCache`]
//! - **Ops**: the boot sequence and the actions each operation produces
//! - **Replay**: re-derives the expected actions and checks the chain
//! - **Orchestrator**: the state machine tying it together
//!
//! Chains, content storage and operator input sit behind the traits in
//! [`chain`]; operators plug their node in through [`Hooks`].
//!
//! # Example
//!
//! ```no_run
//! use bootmesh_orchestrator::{Collaborators, Orchestrator, OrchestratorConfig};
//!
//! async fn launch(services: Collaborators) -> bootmesh_orchestrator::Result<()> {
//!     let config = OrchestratorConfig::from_env()?;
//!     let mut orchestrator = Orchestrator::from_config(config, services)?;
//!     orchestrator.orchestrate().await?;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod chain;
pub mod config;
pub mod content;
pub mod error;
pub mod genesis;
pub mod hooks;
pub mod keys;
pub mod launch;
pub mod ops;
pub mod orchestrator;
pub mod poll;
pub mod replay;
pub mod retry;
pub mod snapshot;
pub mod system;

pub use action::{Action, ActionKey, PermissionLevel};
pub use chain::{ContentStore, GenesisRow, OperatorInput, SeedChain, StdinInput, TargetChain};
pub use config::OrchestratorConfig;
pub use content::{ContentCache, ContentFetcher};
pub use error::{Error, Result};
pub use genesis::GenesisData;
pub use hooks::{Hooks, LoggingHooks};
pub use keys::EphemeralKey;
pub use launch::NetworkView;
pub use ops::{BootSequence, BootStep, Operation};
pub use orchestrator::{Collaborators, Orchestrator, Outcome, Stage};
pub use poll::{Poller, Shutdown};
pub use replay::{ExpectedActions, ReplayReport, ValidationErrors};
pub use retry::RetryPolicy;
