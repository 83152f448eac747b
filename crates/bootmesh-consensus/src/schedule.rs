//! Seeded shuffle and producer schedule.
//!
//! Only the top tier of the consensus order is shuffled, with a fixed
//! number of swap rounds drawn from a generator every participant seeds
//! identically. The result is then padded to a full producer schedule by
//! cloning non-boot peers round-robin.

use crate::peer::Peer;
use bootmesh_discovery::AccountName;
use crate::source::AdditiveSource;
use rand::RngCore;
use std::fmt;
use tracing::debug;

/// Entries in a full schedule: one boot node plus the appointed producers.
pub const SCHEDULE_SIZE: usize = 22;

/// Appointed block producers following the boot node.
pub const APPOINTED_PRODUCERS: usize = SCHEDULE_SIZE - 1;

/// Upper bound on the shuffled tier.
pub const MAX_SHUFFLE_TIER: usize = 5;

/// Swap rounds per shuffle.
pub const SHUFFLE_ROUNDS: usize = 100;

const DRAW_MASK: u64 = (1 << 63) - 1;

/// Characters of the source name kept in a clone name.
pub const CLONE_PREFIX_LEN: usize = 10;

/// Size of the shuffled tier for `n` ordered peers: `min(ceil(n / 4), 5)`.
pub const fn shuffle_tier(n: usize) -> usize {
    let quarter = (n + 3) / 4;
    if quarter < MAX_SHUFFLE_TIER {
        quarter
    } else {
        MAX_SHUFFLE_TIER
    }
}

/// Shuffle the top tier of `items` in place.
///
/// Each of the [`SHUFFLE_ROUNDS`] rounds draws two indices in the tier, each
/// the low 63 bits of a draw modulo the tier, and swaps them when they
/// differ. A tier of one or less leaves the slice and
/// the generator untouched. Returns whether the generator was used.
pub fn shuffle_top<T, R: RngCore>(items: &mut [T], rng: &mut R) -> bool {
    let tier = shuffle_tier(items.len()) as u64;
    if tier <= 1 {
        return false;
    }
    for _ in 0..SHUFFLE_ROUNDS {
        let from = ((rng.next_u64() & DRAW_MASK) % tier) as usize;
        let to = ((rng.next_u64() & DRAW_MASK) % tier) as usize;
        if from != to {
            items.swap(from, to);
        }
    }
    true
}

/// Name of the `count`th clone (1-based) of `source`.
///
/// `mynodeaccntx` becomes `mynodeaccn.a`, then `mynodeaccn.b`, ...
pub fn clone_name(source: &AccountName, count: usize) -> AccountName {
    let prefix: String = source.as_str().chars().take(CLONE_PREFIX_LEN).collect();
    let letter = (b'a' + ((count.saturating_sub(1)) % 26) as u8) as char;
    AccountName::new(format!("{}.{}", prefix, letter))
}

/// Pad `peers` to [`SCHEDULE_SIZE`] by cloning entries `1..` round-robin.
///
/// Lists of one peer or already full lists are left alone.
pub fn pad_schedule(peers: &mut Vec<Peer>) {
    let len = peers.len();
    if len <= 1 || len >= SCHEDULE_SIZE {
        return;
    }
    let sources = len - 1;
    let mut count = 0;
    while peers.len() < SCHEDULE_SIZE {
        let source = &peers[1 + count % sources];
        count += 1;
        let mut clone = source.clone();
        clone.clone_name = Some(clone_name(source.producer_name(), count));
        debug!("Padding schedule with {} cloned from {}", clone.producer_name(), source.account());
        peers.push(clone);
    }
}

/// Role of a schedule slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    BootNode,
    AppointedBlockProducer,
    Participant,
}

impl Role {
    pub const fn at(index: usize) -> Self {
        match index {
            0 => Role::BootNode,
            i if i <= APPOINTED_PRODUCERS => Role::AppointedBlockProducer,
            _ => Role::Participant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::BootNode => write!(f, "boot node"),
            Role::AppointedBlockProducer => write!(f, "appointed block producer"),
            Role::Participant => write!(f, "participant"),
        }
    }
}

/// Final shuffled and padded ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    peers: Vec<Peer>,
}

impl Schedule {
    /// Shuffle with an [`AdditiveSource`] seeded from `seed`, then pad.
    ///
    /// The seed is reinterpreted as signed, so launch checksums above
    /// `i64::MAX` still map onto one stream.
    pub fn from_seed(ordered: Vec<Peer>, seed: u64) -> Self {
        let mut rng = AdditiveSource::new(seed as i64);
        Self::with_rng(ordered, &mut rng)
    }

    pub fn with_rng<R: RngCore>(mut ordered: Vec<Peer>, rng: &mut R) -> Self {
        shuffle_top(&mut ordered, rng);
        pad_schedule(&mut ordered);
        Self { peers: ordered }
    }

    /// Pad without shuffling, for runs that skip the launch block.
    pub fn unshuffled(mut ordered: Vec<Peer>) -> Self {
        pad_schedule(&mut ordered);
        Self { peers: ordered }
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn boot_node(&self) -> Option<&Peer> {
        self.peers.first()
    }

    /// Slots 1..=21.
    pub fn appointed_producers(&self) -> &[Peer] {
        let end = self.peers.len().min(SCHEDULE_SIZE);
        self.peers.get(1..end).unwrap_or(&[])
    }

    /// Slots past the producer schedule.
    pub fn participants(&self) -> &[Peer] {
        self.peers.get(SCHEDULE_SIZE..).unwrap_or(&[])
    }

    /// Slot indexes served by `account`, clones included.
    pub fn slots_of(&self, account: &AccountName) -> Vec<usize> {
        self.peers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.account() == account)
            .map(|(i, _)| i)
            .collect()
    }

    /// Best role `account` holds. Accounts absent from the schedule participate.
    pub fn role_of(&self, account: &AccountName) -> Role {
        self.slots_of(account)
            .first()
            .map_or(Role::Participant, |&i| Role::at(i))
    }

    /// Producer names `account` is expected to produce as.
    pub fn producer_names_of(&self, account: &AccountName) -> Vec<AccountName> {
        self.slots_of(account)
            .into_iter()
            .filter(|&i| Role::at(i) != Role::Participant)
            .map(|i| self.peers[i].producer_name().clone())
            .collect()
    }
}
