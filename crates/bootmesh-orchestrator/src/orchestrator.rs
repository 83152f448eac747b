//! Boot orchestration state machine.
//!
//! One [`Orchestrator`] drives one node through a launch:
//!
//! ```text
//! Init -> WaitLaunchBlock -> Rediscover -> BootNode    -> Done
//!                                       \-> Join -> Verify -> Handoff -> Done
//! ```
//!
//! The role fork depends only on the node's slot in the final schedule.

use crate::action::Action;
use crate::chain::{ContentStore, OperatorInput, SeedChain, TargetChain};
use crate::config::OrchestratorConfig;
use crate::content::{ContentCache, ContentFetcher};
use crate::error::{Error, Result};
use crate::genesis::GenesisData;
use crate::hooks::Hooks;
use crate::keys::{public_key_of, EphemeralKey};
use crate::launch::{now_secs, wait_for_launch_block, NetworkView};
use crate::ops::{BootSequence, OpContext};
use crate::poll::{Poller, Shutdown};
use crate::replay::{replay, wait_for_disabled_authority, ExpectedActions, ReplayReport};
use crate::system::SystemActions;
use bootmesh_consensus::{Peer, Role, Schedule};
use bootmesh_discovery::{AccountName, Authority, Discovery};
use bootmesh_topology::{bootstrap_addresses, mesh_addresses};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Content name of the agreed boot sequence.
pub const BOOT_SEQUENCE_CONTENT: &str = "boot_sequence.yaml";

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    WaitLaunchBlock,
    Rediscover,
    BootNode,
    Join,
    Verify,
    Handoff,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::WaitLaunchBlock => "wait-launch-block",
            Stage::Rediscover => "rediscover",
            Stage::BootNode => "boot-node",
            Stage::Join => "join",
            Stage::Verify => "verify",
            Stage::Handoff => "handoff",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// This node booted the chain.
    Booted {
        genesis: GenesisData,
        public_key: String,
        bootstrap: Vec<String>,
    },
    /// This node joined a chain someone else booted.
    Joined {
        genesis: GenesisData,
        role: Role,
        mesh: Vec<String>,
        /// Present when the chain was verified
        report: Option<ReplayReport>,
    },
}

/// External services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub seed: Arc<dyn SeedChain>,
    pub target: Arc<dyn TargetChain>,
    pub content: Arc<dyn ContentStore>,
    pub operator: Arc<dyn OperatorInput>,
    pub hooks: Arc<dyn Hooks>,
}

/// Network view and boot sequence agreed during init.
struct Prepared {
    view: NetworkView,
    launch: Discovery,
    sequence: BootSequence,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    me: Discovery,
    cache: ContentCache,
    system: SystemActions,
    services: Collaborators,
    shutdown: Shutdown,
    stage: Stage,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, me: Discovery, services: Collaborators) -> Result<Self> {
        me.validate().map_err(bootmesh_discovery::Error::from)?;
        let cache = ContentCache::open(&config.cache_dir)?;
        let system = SystemActions::new(&config.system_account);
        Ok(Self {
            config,
            me,
            cache,
            system,
            services,
            shutdown: Shutdown::never(),
            stage: Stage::Init,
        })
    }

    /// Read the local discovery document named by the config.
    pub fn from_config(config: OrchestratorConfig, services: Collaborators) -> Result<Self> {
        let me = Discovery::from_yaml(&std::fs::read_to_string(&config.my_discovery)?)?;
        Self::new(config, me, services)
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    fn account(&self) -> &AccountName {
        &self.me.seed_network_account_name
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn poller(&self) -> Poller {
        Poller::new(self.config.poll_interval)
            .with_timeout(self.config.poll_timeout)
            .with_shutdown(self.shutdown.clone())
    }

    /// Full launch: agree, wait for the launch block, shuffle, then boot or
    /// join depending on the slot this node lands in.
    pub async fn orchestrate(&mut self) -> Result<Outcome> {
        let prepared = self.prepare().await?;
        self.services.hooks.init("orchestrate").await?;

        let schedule = if self.config.single {
            Schedule::unshuffled(prepared.view.ordered)
        } else {
            self.enter(Stage::WaitLaunchBlock);
            let height = prepared.launch.seed_network_launch_block;
            let seed = wait_for_launch_block(self.services.seed.as_ref(), &self.poller(), height).await?;

            self.enter(Stage::Rediscover);
            let view = self.discover().await?;
            view.log_order();
            Schedule::from_seed(view.ordered, seed)
        };
        log_schedule(&schedule);

        let outcome = match schedule.role_of(self.account()) {
            Role::BootNode => self.run_boot(&schedule, &prepared.launch, prepared.sequence).await?,
            _ => {
                let verify = self.config.verify;
                self.run_join(&schedule, &prepared.launch, prepared.sequence, verify)
                    .await?
            }
        };

        self.finish("orchestrate").await?;
        Ok(outcome)
    }

    /// Boot without waiting for a launch block, over the unshuffled order.
    pub async fn boot(&mut self) -> Result<Outcome> {
        let prepared = self.prepare().await?;
        self.services.hooks.init("boot").await?;
        let schedule = Schedule::unshuffled(prepared.view.ordered);
        log_schedule(&schedule);
        let outcome = self.run_boot(&schedule, &prepared.launch, prepared.sequence).await?;
        self.finish("boot").await?;
        Ok(outcome)
    }

    /// Join without waiting for a launch block, over the unshuffled order.
    pub async fn join(&mut self, verify: bool) -> Result<Outcome> {
        let prepared = self.prepare().await?;
        self.services.hooks.init("join").await?;
        let schedule = Schedule::unshuffled(prepared.view.ordered);
        log_schedule(&schedule);
        let outcome = self
            .run_join(&schedule, &prepared.launch, prepared.sequence, verify)
            .await?;
        self.finish("join").await?;
        Ok(outcome)
    }

    async fn finish(&mut self, operation: &str) -> Result<()> {
        self.services.hooks.done(operation).await?;
        self.enter(Stage::Done);
        Ok(())
    }

    async fn discover(&self) -> Result<NetworkView> {
        if self.config.single {
            return NetworkView::single(&self.me);
        }
        let rows = self.services.seed.discovery_rows().await?;
        debug!("Discovered {} row(s)", rows.len());
        NetworkView::from_rows(
            rows,
            &self.me,
            now_secs(),
            self.config.active_window_secs,
            self.config.elect.as_ref(),
        )
    }

    /// Order the network, fetch the launch contents and load the boot
    /// sequence.
    async fn prepare(&mut self) -> Result<Prepared> {
        self.enter(Stage::Init);
        let view = self.discover().await?;
        view.log_order();
        let launch = view.launch()?.clone();

        let fetcher = ContentFetcher::new(
            self.services.content.as_ref(),
            &self.cache,
            self.config.fetch_concurrency,
        );
        fetcher.fetch_all(view.launch_references()?).await?;

        let sequence = match &self.config.boot_sequence_override {
            Some(path) => {
                info!("Using boot sequence from {}", path.display());
                BootSequence::load(path)?
            }
            None => {
                let content = launch
                    .content_ref(BOOT_SEQUENCE_CONTENT)
                    .ok_or_else(|| Error::MissingContent(BOOT_SEQUENCE_CONTENT.to_string()))?;
                BootSequence::from_bytes(&self.cache.read(&content.reference)?)?
            }
        };
        info!("Boot sequence has {} operation(s)", sequence.len());

        Ok(Prepared {
            view,
            launch,
            sequence,
        })
    }

    fn effective_sequence(&self, launch: &Discovery, mut sequence: BootSequence) -> BootSequence {
        if !launch.is_test_network() {
            sequence.reset_testnet_options();
        }
        sequence
    }

    async fn run_boot(
        &mut self,
        schedule: &Schedule,
        launch: &Discovery,
        sequence: BootSequence,
    ) -> Result<Outcome> {
        self.enter(Stage::BootNode);
        info!("{} is the boot node", self.account());

        let key = EphemeralKey::generate();
        let public_key = key.public_hex();
        let genesis = GenesisData::new(chrono::Utc::now(), &public_key, &launch.target_chain_id);
        let hooks = self.services.hooks.clone();

        if !self.me.seed_network_peers.is_empty() && !self.config.single {
            let addresses = vec![self.me.target_p2p_address.clone()];
            self.services
                .seed
                .publish_genesis(self.account(), &genesis.to_json()?, &addresses)
                .await?;
            hooks.boot_publish_genesis(&genesis).await?;
        }
        hooks.boot_node(&genesis, &public_key, &key.private_hex()).await?;

        let sequence = self.effective_sequence(launch, sequence);
        self.execute(&sequence, schedule, launch, &public_key).await?;

        info!("Boot sequence applied, waiting {:?} for finalization", self.config.finalize_pause);
        tokio::select! {
            _ = tokio::time::sleep(self.config.finalize_pause) => {}
            _ = self.shutdown.cancelled() => return Err(Error::Cancelled("finalization".into())),
        }

        let bootstrap = {
            let mut rng = StdRng::from_entropy();
            bootstrap_addresses(schedule.peers(), self.account(), &mut rng)
        };
        hooks.boot_connect_mesh(&bootstrap).await?;
        hooks.boot_publish_handoff(&public_key, &key.private_hex()).await?;

        Ok(Outcome::Booted {
            genesis,
            public_key,
            bootstrap,
        })
    }

    /// Compute and submit every step, chunk by chunk.
    async fn execute(
        &self,
        sequence: &BootSequence,
        schedule: &Schedule,
        launch: &Discovery,
        ephemeral_key: &str,
    ) -> Result<()> {
        let ctx = OpContext {
            ephemeral_key,
            schedule,
            launch,
            cache: &self.cache,
            system: &self.system,
        };

        for step in &sequence.steps {
            let actions = step.actions(&ctx)?;
            if actions.is_empty() {
                debug!("{}: nothing to submit", step.label);
                continue;
            }
            info!("{} [{}]: {} action(s)", step.label, step.op.tag(), actions.len());

            for (chunk, batch) in actions.chunks(self.config.chunk_size).enumerate() {
                self.submit(batch)
                    .await
                    .map_err(|e| Error::ActionSubmission {
                        label: step.label.clone(),
                        op: step.op.tag().to_string(),
                        chunk,
                        source: Box::new(e),
                    })?;
            }
        }
        Ok(())
    }

    async fn submit(&self, batch: &[Action]) -> Result<()> {
        let target = self.services.target.as_ref();
        self.config
            .retry
            .run("push actions", || target.push_actions(batch))
            .await
    }

    async fn run_join(
        &mut self,
        schedule: &Schedule,
        launch: &Discovery,
        sequence: BootSequence,
        verify: bool,
    ) -> Result<Outcome> {
        self.enter(Stage::Join);
        let role = schedule.role_of(self.account());
        info!("{} joins as {}", self.account(), role);

        let boot_node = schedule.boot_node().ok_or(Error::Consensus(bootmesh_consensus::Error::EmptyGraph))?;
        let genesis = self.read_genesis(boot_node).await?;

        let mesh = mesh_addresses(schedule.peers(), self.account());
        let producer_names = schedule.producer_names_of(self.account());
        self.services
            .hooks
            .join_network(&genesis, &producer_names, &mesh)
            .await?;

        let report = if verify {
            self.enter(Stage::Verify);
            let sequence = self.effective_sequence(launch, sequence);
            let report = self.verify(&sequence, schedule, launch, &genesis).await?;

            self.enter(Stage::Handoff);
            self.await_handoff(&genesis).await?;
            Some(report)
        } else {
            None
        };

        Ok(Outcome::Joined {
            genesis,
            role,
            mesh,
            report,
        })
    }

    /// Replay the chain against the boot sequence and check the system
    /// account was relinquished.
    async fn verify(
        &self,
        sequence: &BootSequence,
        schedule: &Schedule,
        launch: &Discovery,
        genesis: &GenesisData,
    ) -> Result<ReplayReport> {
        let expected = {
            let ctx = OpContext {
                ephemeral_key: &genesis.initial_key,
                schedule,
                launch,
                cache: &self.cache,
                system: &self.system,
            };
            ExpectedActions::build(&sequence.steps, &ctx)?
        };

        let target = self.services.target.as_ref();
        let poller = self.poller();
        let report = replay(target, &expected, &poller).await?;
        if self.disables_system_account(&expected)? {
            wait_for_disabled_authority(target, &self.config.system_account, &poller).await?;
        } else {
            info!(
                "Boot sequence leaves {} usable, not waiting for it to be disabled",
                self.config.system_account
            );
        }

        let report = report.into_result()?;
        info!("Chain verified against the boot sequence");
        Ok(report)
    }

    /// Whether the expected actions drop both permissions of the system
    /// account.
    fn disables_system_account(&self, expected: &ExpectedActions) -> Result<bool> {
        let account = &self.config.system_account;
        for (permission, parent) in [("active", "owner"), ("owner", "")] {
            let action = self.system.update_auth(account, permission, parent, Authority::disabled())?;
            if !expected.contains(&action.key()?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn read_genesis(&self, boot_node: &Peer) -> Result<GenesisData> {
        if self.config.single {
            loop {
                let line = self.operator_line("Paste the genesis data: ").await?;
                match GenesisData::decode(&line) {
                    Ok(genesis) => return Ok(genesis),
                    Err(e) => warn!("{}", e),
                }
            }
        }

        let seed = self.services.seed.as_ref();
        let account = boot_node.account();
        info!("Waiting for {} to publish genesis", account);
        let poller = self.poller().with_interval(self.config.genesis_poll_interval);
        poller
            .until("genesis", || async {
                match seed.genesis_row(account).await? {
                    Some(row) => GenesisData::decode(&row.genesis_json).map(Some),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Wait for the operator to paste the boot node's private key.
    async fn await_handoff(&self, genesis: &GenesisData) -> Result<()> {
        loop {
            let line = self
                .operator_line("Paste the boot node's ephemeral private key: ")
                .await?;
            match public_key_of(&line) {
                Ok(public_key) if public_key == genesis.initial_key => {
                    info!("Handoff key matches genesis, the boot node kept nothing");
                    return Ok(());
                }
                Ok(public_key) => warn!(
                    "Key {} doesn't match genesis key {}, keep waiting",
                    public_key, genesis.initial_key
                ),
                Err(e) => warn!("{}", e),
            }
        }
    }

    async fn operator_line(&self, prompt: &str) -> Result<String> {
        tokio::select! {
            line = self.services.operator.read_line(prompt) => line,
            _ = self.shutdown.cancelled() => Err(Error::Cancelled("operator input".into())),
        }
    }
}

fn log_schedule(schedule: &Schedule) {
    for (i, peer) in schedule.peers().iter().enumerate() {
        info!(
            "{:>3}. {:<13} {:<13} {}",
            i,
            peer.account(),
            peer.producer_name(),
            Role::at(i)
        );
    }
}
