//! Bootmesh Consensus Ordering
//!
//! Turns the set of published discovery records into one ordering every
//! honest participant derives identically.
//!
//! # Pipeline
//!
//! 1. [`PeerGraph`] builds a weighted directed graph from trust links and
//!    isolates networks as strongly-connected components
//! 2. Peers of the local network are ordered: active first, heavier
//!    inbound weight first, then account name
//! 3. [`ContentAgreement`] versions every declared artifact and renders a
//!    per-peer signature so disagreement is visible at a glance
//! 4. [`Schedule`] shuffles the top tier with an externally seeded
//!    [`AdditiveSource`] and pads to 22 producer slots
//!
//! Agreement is advisory. Nothing here enforces a quorum; every peer just
//! computes the same answer from the same inputs.

mod agreement;
mod error;
mod graph;
mod peer;
mod schedule;
mod source;

pub use agreement::{ContentAgreement, ABSENT, OVERFLOW};
pub use error::{Error, Result};
pub use graph::{Edge, Network, PeerGraph, PeerRecord, ACTIVE_WINDOW_SECS, ELECTED_WEIGHT};
pub use peer::Peer;
pub use source::AdditiveSource;
pub use schedule::{
    clone_name, pad_schedule, shuffle_tier, shuffle_top, Role, Schedule, APPOINTED_PRODUCERS,
    CLONE_PREFIX_LEN, MAX_SHUFFLE_TIER, SCHEDULE_SIZE, SHUFFLE_ROUNDS,
};
