//! Operator hooks fired at each stage of a run.
//!
//! Hooks are where an operator wires the orchestrator to their node: start
//! the chain with the genesis data, point it at the mesh, announce the
//! handoff. Every method defaults to logging, so implementors override only
//! what they need. A hook error aborts the run.

use crate::error::Result;
use crate::genesis::GenesisData;
use async_trait::async_trait;
use bootmesh_discovery::AccountName;
use tracing::info;

#[async_trait]
pub trait Hooks: Send + Sync {
    /// A run of `operation` (`orchestrate`, `boot` or `join`) is starting.
    async fn init(&self, operation: &str) -> Result<()> {
        info!("Starting {}", operation);
        Ok(())
    }

    /// Genesis was published to the coordination chain.
    async fn boot_publish_genesis(&self, genesis: &GenesisData) -> Result<()> {
        info!("Published genesis for chain {:?}", genesis.initial_chain_id);
        Ok(())
    }

    /// Start the boot node's chain. The private key signs the boot sequence.
    async fn boot_node(&self, genesis: &GenesisData, public_key: &str, _private_key: &str) -> Result<()> {
        info!(
            "Boot node starting at {} with key {}",
            genesis.initial_timestamp, public_key
        );
        Ok(())
    }

    /// Dial the bootstrap peers once the boot sequence is on chain.
    async fn boot_connect_mesh(&self, addresses: &[String]) -> Result<()> {
        info!("Connecting to {} bootstrap peer(s)", addresses.len());
        Ok(())
    }

    /// Reveal the ephemeral key pair to the other operators.
    async fn boot_publish_handoff(&self, public_key: &str, _private_key: &str) -> Result<()> {
        info!("Handing off ephemeral key {}", public_key);
        Ok(())
    }

    /// Start a joining node with the producer names it serves.
    async fn join_network(
        &self,
        genesis: &GenesisData,
        producer_names: &[AccountName],
        mesh_addresses: &[String],
    ) -> Result<()> {
        info!(
            "Joining chain {:?} as {} producer(s), dialing {} peer(s)",
            genesis.initial_chain_id,
            producer_names.len(),
            mesh_addresses.len()
        );
        Ok(())
    }

    async fn done(&self, operation: &str) -> Result<()> {
        info!("Finished {}", operation);
        Ok(())
    }
}

/// Hooks that only log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl Hooks for LoggingHooks {}

/// Hooks that record every call, for tests.
#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingHooks {
        pub calls: Mutex<Vec<String>>,
        pub mesh: Mutex<Vec<String>>,
        pub producer_names: Mutex<Vec<AccountName>>,
        pub handoff_private_key: Mutex<Option<String>>,
        pub genesis: Mutex<Option<GenesisData>>,
    }

    impl RecordingHooks {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl Hooks for RecordingHooks {
        async fn init(&self, operation: &str) -> Result<()> {
            self.record(&format!("init:{}", operation));
            Ok(())
        }

        async fn boot_publish_genesis(&self, genesis: &GenesisData) -> Result<()> {
            self.record("boot_publish_genesis");
            *self.genesis.lock().unwrap() = Some(genesis.clone());
            Ok(())
        }

        async fn boot_node(&self, genesis: &GenesisData, _public_key: &str, _private_key: &str) -> Result<()> {
            self.record("boot_node");
            *self.genesis.lock().unwrap() = Some(genesis.clone());
            Ok(())
        }

        async fn boot_connect_mesh(&self, addresses: &[String]) -> Result<()> {
            self.record("boot_connect_mesh");
            *self.mesh.lock().unwrap() = addresses.to_vec();
            Ok(())
        }

        async fn boot_publish_handoff(&self, _public_key: &str, private_key: &str) -> Result<()> {
            self.record("boot_publish_handoff");
            *self.handoff_private_key.lock().unwrap() = Some(private_key.to_string());
            Ok(())
        }

        async fn join_network(
            &self,
            genesis: &GenesisData,
            producer_names: &[AccountName],
            mesh_addresses: &[String],
        ) -> Result<()> {
            self.record("join_network");
            *self.genesis.lock().unwrap() = Some(genesis.clone());
            *self.producer_names.lock().unwrap() = producer_names.to_vec();
            *self.mesh.lock().unwrap() = mesh_addresses.to_vec();
            Ok(())
        }

        async fn done(&self, operation: &str) -> Result<()> {
            self.record(&format!("done:{}", operation));
            Ok(())
        }
    }
}
