//! Chain replay verification.
//!
//! A joining node recomputes every action the boot sequence should have
//! produced, indexes them by canonical key, then walks the target chain
//! from block 1 and checks each action it finds against that index.
//! Mismatches are collected, never fail-fast, and surface together at the
//! end of the scan.

use crate::action::{Action, ActionKey};
use crate::chain::TargetChain;
use crate::error::{Error, Result};
use crate::ops::{BootStep, OpContext};
use crate::poll::Poller;
use bootmesh_discovery::AccountName;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Why a replayed action failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// Not produced by any boot operation
    NotExpected,
    /// Expected, but already seen earlier in the chain
    Duplicate,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::NotExpected => write!(f, "not in the boot sequence"),
            MismatchReason::Duplicate => write!(f, "applied more than once"),
        }
    }
}

/// One action on chain that doesn't fit the boot sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMismatch {
    pub block: u64,
    pub transaction: usize,
    pub index: usize,
    pub action: Action,
    pub key: ActionKey,
    pub reason: MismatchReason,
}

impl fmt::Display for ActionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} tx {} action {} ({}): {}",
            self.block, self.transaction, self.index, self.action, self.reason
        )
    }
}

/// Every mismatch found in one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ActionMismatch>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionMismatch> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mismatch) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", mismatch)?;
        }
        Ok(())
    }
}

/// Expected actions indexed by canonical key.
#[derive(Debug, Clone, Default)]
pub struct ExpectedActions {
    index: HashMap<ActionKey, Action>,
}

impl ExpectedActions {
    /// Run every step against `ctx`.
    ///
    /// Two steps producing byte-identical actions is an internal fault and
    /// fails with [`Error::DuplicateExpectedAction`].
    pub fn build(steps: &[BootStep], ctx: &OpContext<'_>) -> Result<Self> {
        let mut expected = Self::default();
        for step in steps {
            for action in step.actions(ctx)? {
                expected.insert(action)?;
            }
        }
        info!("Expecting {} action(s) on chain", expected.len());
        Ok(expected)
    }

    pub fn from_actions<I: IntoIterator<Item = Action>>(actions: I) -> Result<Self> {
        let mut expected = Self::default();
        for action in actions {
            expected.insert(action)?;
        }
        Ok(expected)
    }

    pub fn insert(&mut self, action: Action) -> Result<()> {
        let key = action.key()?;
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateExpectedAction {
                key: key.to_string(),
                action: action.to_string(),
            });
        }
        self.index.insert(key, action);
        Ok(())
    }

    pub fn contains(&self, key: &ActionKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Outcome of a replay scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Highest block read
    pub last_block: u64,
    pub matched: usize,
    pub expected: usize,
    pub mismatches: ValidationErrors,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.matched == self.expected
    }

    /// Fold the mismatches into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.mismatches.is_empty() {
            Ok(self)
        } else {
            Err(Error::AggregateValidation(self.mismatches))
        }
    }
}

/// Scan blocks from height 1 until every expected action has been seen.
///
/// Blocks not produced yet are polled for. The scan stops at the end of the
/// block holding the last expected action; an empty expectation reads
/// nothing.
pub async fn replay(chain: &dyn TargetChain, expected: &ExpectedActions, poller: &Poller) -> Result<ReplayReport> {
    let mut report = ReplayReport {
        expected: expected.len(),
        ..Default::default()
    };
    let mut seen: HashSet<ActionKey> = HashSet::with_capacity(expected.len());
    let mut height = 1;

    while report.matched < report.expected {
        let what = format!("block {}", height);
        let block = poller.until(&what, || chain.block(height)).await?;
        debug!("Replaying block {} ({} transaction(s))", block.number, block.transactions.len());

        for (tx, transaction) in block.transactions.into_iter().enumerate() {
            for (index, action) in transaction.actions.into_iter().enumerate() {
                let key = action.key()?;
                let reason = if !expected.contains(&key) {
                    MismatchReason::NotExpected
                } else if !seen.insert(key) {
                    MismatchReason::Duplicate
                } else {
                    report.matched += 1;
                    continue;
                };
                warn!("Block {} action {}: {}", height, action, reason);
                report.mismatches.0.push(ActionMismatch {
                    block: height,
                    transaction: tx,
                    index,
                    action,
                    key,
                    reason,
                });
            }
        }

        report.last_block = height;
        height += 1;
    }

    info!(
        "Replayed {} block(s): {}/{} expected action(s), {} mismatch(es)",
        report.last_block,
        report.matched,
        report.expected,
        report.mismatches.len()
    );
    Ok(report)
}

/// Poll until `account` has both owner and active permissions at
/// threshold 0.
pub async fn wait_for_disabled_authority(
    chain: &dyn TargetChain,
    account: &AccountName,
    poller: &Poller,
) -> Result<()> {
    let what = format!("{} authority to be disabled", account);
    poller
        .until(&what, || async {
            let permissions = chain.account_permissions(account).await?;
            let disabled = |name: &str| {
                permissions
                    .iter()
                    .any(|p| p.name == name && p.threshold == 0)
            };
            Ok((disabled("owner") && disabled("active")).then_some(()))
        })
        .await?;
    info!("{} has no usable authority left", account);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockTargetChain;
    use crate::system::SystemActions;
    use proptest::prelude::*;
    use std::time::Duration;

    fn actions(n: usize) -> Vec<Action> {
        let sys = SystemActions::new(&"eosio".into());
        (0..n)
            .map(|i| {
                sys.transfer(&"eosio".into(), &"bob".into(), "1.0000 EOS", &format!("memo {}", i))
                    .unwrap()
            })
            .collect()
    }

    fn expected(actions: &[Action]) -> ExpectedActions {
        ExpectedActions::from_actions(actions.iter().cloned()).unwrap()
    }

    fn poller() -> Poller {
        Poller::new(Duration::from_millis(100))
    }

    #[test]
    fn duplicate_expected_action_is_fatal() {
        let mut list = actions(2);
        list.push(list[0].clone());
        let err = ExpectedActions::from_actions(list).unwrap_err();
        assert!(matches!(err, Error::DuplicateExpectedAction { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn full_chain_in_any_order_verifies() {
        let all = actions(6);
        let chain = MockTargetChain::default();
        chain.push_block(vec![all[4].clone(), all[0].clone()]);
        chain.push_block(vec![all[5].clone(), all[2].clone(), all[1].clone()]);
        chain.push_block(vec![all[3].clone()]);

        let report = replay(&chain, &expected(&all), &poller()).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.last_block, 3);
        assert_eq!(report.matched, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn one_extra_action_is_one_mismatch() {
        let all = actions(4);
        let intruder = actions(5).pop().unwrap();
        let chain = MockTargetChain::default();
        chain.push_block(vec![all[0].clone(), all[1].clone()]);
        chain.push_block(vec![all[2].clone(), intruder.clone(), all[3].clone()]);

        let report = replay(&chain, &expected(&all), &poller()).await.unwrap();
        assert_eq!(report.matched, 4);
        assert_eq!(report.mismatches.len(), 1);
        let mismatch = &report.mismatches.0[0];
        assert_eq!(mismatch.block, 2);
        assert_eq!(mismatch.index, 1);
        assert_eq!(mismatch.action, intruder);
        assert_eq!(mismatch.reason, MismatchReason::NotExpected);

        match report.into_result() {
            Err(Error::AggregateValidation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected aggregate failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_error_lists_every_mismatch() {
        let all = actions(2);
        let extra = actions(4);
        let chain = MockTargetChain::default();
        chain.push_block(vec![extra[2].clone(), all[0].clone()]);
        chain.push_block(vec![all[1].clone(), extra[3].clone()]);

        let report = replay(&chain, &expected(&all), &poller()).await.unwrap();
        let message = report.into_result().unwrap_err().to_string();
        assert!(message.starts_with("Chain validation failed with 2 mismatch(es):\n"));
        assert!(message.contains("block 1 tx 0 action 0"));
        assert!(message.contains("block 2 tx 0 action 1"));
        assert_eq!(message.matches("not in the boot sequence").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_action_is_flagged() {
        let all = actions(2);
        let chain = MockTargetChain::default();
        chain.push_block(vec![all[0].clone(), all[0].clone()]);
        chain.push_block(vec![all[1].clone()]);

        let report = replay(&chain, &expected(&all), &poller()).await.unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches.0[0].reason, MismatchReason::Duplicate);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_blocks_not_yet_produced() {
        let all = actions(2);
        let chain = std::sync::Arc::new(MockTargetChain::default());
        chain.push_block(vec![all[0].clone()]);

        let producer = chain.clone();
        let late = all[1].clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            producer.push_block(vec![late]);
        });

        let report = replay(chain.as_ref(), &expected(&all), &poller()).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.last_block, 2);
    }

    #[tokio::test]
    async fn empty_expectation_reads_nothing() {
        let chain = MockTargetChain::default();
        let report = replay(&chain, &ExpectedActions::default(), &poller()).await.unwrap();
        assert_eq!(report.last_block, 0);
        assert!(report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_system_account_disablement() {
        let chain = MockTargetChain::default();
        *chain.permission_delay.lock().unwrap() = 3;
        chain.disable_system_account();
        let started = tokio::time::Instant::now();
        wait_for_disabled_authority(&chain, &"eosio".into(), &poller())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    fn permuted_blocks() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
        (1usize..12).prop_flat_map(|n| {
            (
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
                prop::collection::vec(1usize..4, n),
            )
        })
    }

    proptest! {
        #[test]
        fn replay_ignores_action_and_block_order((order, sizes) in permuted_blocks()) {
            let all = actions(order.len());
            let chain = MockTargetChain::default();
            let mut rest = order.as_slice();
            for size in sizes {
                if rest.is_empty() {
                    break;
                }
                let (block, tail) = rest.split_at(size.min(rest.len()));
                chain.push_block(block.iter().map(|&i| all[i].clone()).collect());
                rest = tail;
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let report = runtime
                .block_on(replay(&chain, &expected(&all), &poller()))
                .unwrap();
            prop_assert!(report.is_clean());
            prop_assert_eq!(report.matched, all.len());
            prop_assert_eq!(report.last_block as usize, chain.blocks.lock().unwrap().len());
        }
    }
}
