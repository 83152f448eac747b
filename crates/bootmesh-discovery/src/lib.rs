//! Bootmesh Discovery Records
//!
//! Every operator taking part in a launch publishes one discovery record on
//! the coordination chain. A record names the operator's account, the peers
//! it trusts (weighted links), the future block whose id seeds the shuffle,
//! and everything the boot node needs to create the operator's producer
//! account on the target chain.
//!
//! # Identity
//!
//! Account names pack into a `u64` using the chain's base-32 name encoding.
//! That packed value is the peer's arena id in the consensus graph.
//!
//! # Validation
//!
//! [`Discovery::validate`] enforces field presence and format. A record that
//! fails is dropped from the graph on its own; it never fails the build.

mod error;
mod name;
mod record;
mod validate;

pub use error::{Error, NameError, Result, ValidationError};
pub use name::{AccountName, MAX_NAME_LEN};
pub use record::{
    rows_from_json, rows_from_yaml, Authority, ContentRef, Discovery, DiscoveryRow,
    InitialAuthority, KeyWeight, PeerLink, NO_P2P_ADDRESS,
};
pub use validate::{MAX_LINK_WEIGHT, TARGET_ACCOUNT_LEN};
