//! Action generation for each operation.
//!
//! `actions` is a pure function of the context: booting and verifying
//! nodes call it with the same inputs and must get byte-identical results.

use super::{
    BootStep, CreateTokenOp, DestroyAccountsOp, InjectSnapshotOp, IssueTokenOp, NewAccountOp, Operation,
    SetCodeOp, SetPrivOp, EPHEMERAL,
};
use crate::action::Action;
use crate::content::ContentCache;
use crate::error::{Error, Result};
use crate::snapshot;
use crate::system::{ProducerKey, SystemActions};
use bootmesh_consensus::{Peer, Schedule, APPOINTED_PRODUCERS};
use bootmesh_discovery::{AccountName, Authority, Discovery};
use tracing::debug;

/// Snapshot content name in the launch discovery.
pub const SNAPSHOT_CONTENT: &str = "snapshot.csv";

/// Everything an operation may read.
pub struct OpContext<'a> {
    /// Hex public key of the boot node's ephemeral key
    pub ephemeral_key: &'a str,
    pub schedule: &'a Schedule,
    /// Discovery of the top-ordered peer, which names the agreed contents
    pub launch: &'a Discovery,
    pub cache: &'a ContentCache,
    pub system: &'a SystemActions,
}

impl OpContext<'_> {
    /// Cached bytes of the launch discovery's content `name`.
    pub fn content(&self, name: &str) -> Result<Vec<u8>> {
        let content = self
            .launch
            .content_ref(name)
            .ok_or_else(|| Error::MissingContent(name.to_string()))?;
        self.cache.read(&content.reference)
    }

    fn system_account(&self) -> &AccountName {
        self.system.system_account()
    }

    /// Producer account for a scheduled peer. A peer targeting the system
    /// account itself (single-node runs) falls back to its seed account.
    fn producer_account<'p>(&self, peer: &'p Peer) -> &'p AccountName {
        let name = peer.producer_name();
        if name == self.system_account() {
            peer.account()
        } else {
            name
        }
    }
}

impl BootStep {
    /// Actions for this step, with failures tagged by label and op.
    pub fn actions(&self, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
        self.op.actions(ctx).map_err(|e| Error::Operation {
            label: self.label.clone(),
            op: self.op.tag().to_string(),
            source: Box::new(e),
        })
    }
}

impl Operation {
    pub fn actions(&self, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
        match self {
            Operation::SetCode(op) => set_code(op, ctx),
            Operation::NewAccount(op) => new_account(op, ctx),
            Operation::SetPriv(op) => set_priv(op, ctx),
            Operation::CreateToken(op) => create_token(op, ctx),
            Operation::IssueToken(op) => issue_token(op, ctx),
            Operation::CreateProducers => create_producers(ctx),
            Operation::SetProds => set_prods(ctx),
            Operation::InjectSnapshot(op) => inject_snapshot(op, ctx),
            Operation::DestroyAccounts(op) => destroy_accounts(op, ctx),
        }
    }
}

fn set_code(op: &SetCodeOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    let code = ctx.content(&format!("{}.wasm", op.contract_name_ref))?;
    let abi = ctx.content(&format!("{}.abi", op.contract_name_ref))?;
    Ok(vec![
        ctx.system.set_code(&op.account, code)?,
        ctx.system.set_abi(&op.account, abi)?,
    ])
}

fn new_account(op: &NewAccountOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    let key = if op.pubkey == EPHEMERAL {
        ctx.ephemeral_key
    } else {
        op.pubkey.as_str()
    };
    if key.is_empty() {
        return Err(Error::Key(format!("no public key for {}", op.new_account)));
    }
    Ok(vec![ctx.system.new_account(&op.creator, &op.new_account, key)?])
}

fn set_priv(op: &SetPrivOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    Ok(vec![ctx.system.set_priv(&op.account)?])
}

fn create_token(op: &CreateTokenOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    Ok(vec![ctx.system.token_create(
        &op.account,
        &op.amount,
        op.can_freeze,
        op.can_recall,
        op.can_whitelist,
    )?])
}

fn issue_token(op: &IssueTokenOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    Ok(vec![ctx.system.token_issue(&op.account, &op.amount, &op.memo)?])
}

/// One account per schedule entry, clones included, with the owner and
/// active authorities the peer asked for.
fn create_producers(ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    ctx.schedule
        .peers()
        .iter()
        .map(|peer| {
            let authority = &peer.discovery.target_initial_authority;
            ctx.system.new_account_with(
                ctx.system_account(),
                ctx.producer_account(peer),
                authority.owner.clone(),
                authority.active.clone(),
            )
        })
        .collect()
}

/// The system account on the ephemeral key, then the appointed producers
/// in schedule order.
fn set_prods(ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    let system = ctx.system_account();
    let mut schedule = vec![ProducerKey {
        producer_name: system.clone(),
        block_signing_key: ctx.ephemeral_key.to_string(),
    }];

    for peer in ctx.schedule.peers().iter().skip(1) {
        if schedule.len() >= APPOINTED_PRODUCERS {
            break;
        }
        let producer_name = peer.producer_name();
        let block_signing_key = if producer_name == system {
            ctx.ephemeral_key.to_string()
        } else {
            peer.discovery.target_appointed_block_producer_signing_key.clone()
        };
        schedule.push(ProducerKey {
            producer_name: producer_name.clone(),
            block_signing_key,
        });
    }

    debug!("Producer schedule has {} entries", schedule.len());
    Ok(vec![ctx.system.set_prods(schedule)?])
}

fn inject_snapshot(op: &InjectSnapshotOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    let mut holders = snapshot::parse(&ctx.content(SNAPSHOT_CONTENT)?)?;
    if holders.is_empty() {
        return Err(Error::Snapshot {
            line: 0,
            reason: "snapshot is empty".into(),
        });
    }
    if op.testnet_truncate_snapshot > 0 && holders.len() > op.testnet_truncate_snapshot {
        debug!("Truncating snapshot to {} holders", op.testnet_truncate_snapshot);
        holders.truncate(op.testnet_truncate_snapshot);
    }

    let system = ctx.system_account();
    let mut out = Vec::with_capacity(holders.len() * 2);
    for holder in &holders {
        out.push(ctx.system.new_account(system, &holder.account, &holder.public_key)?);
        out.push(
            ctx.system
                .transfer(system, &holder.account, &holder.balance, &holder.welcome_memo())?,
        );
    }
    Ok(out)
}

/// Set both permissions of every account to an unsatisfiable authority.
fn destroy_accounts(op: &DestroyAccountsOp, ctx: &OpContext<'_>) -> Result<Vec<Action>> {
    if op.testnet_keep_accounts {
        debug!("Keeping {} system account(s) usable", op.accounts.len());
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(op.accounts.len() * 2);
    for account in &op.accounts {
        out.push(ctx.system.update_auth(account, "active", "owner", Authority::disabled())?);
        out.push(ctx.system.update_auth(account, "owner", "", Authority::disabled())?);
    }
    Ok(out)
}
