//! Bootmesh Mesh Topology
//!
//! After boot every node dials a handful of peers so blocks gossip across
//! the whole network without a full mesh.
//!
//! # Steady-state mesh
//!
//! With `N` meshable peers, node `p` dials `(p + 1) mod N` and the
//! Chord-like fingers `(p + 2^(i+2)) mod N` for `i < ceil(sqrt(N))`. The
//! ring alone guarantees reachability, the fingers bring the diameter down
//! to `O(log N)` hops at `O(sqrt N)` out-degree.
//!
//! # Bootstrap
//!
//! Right after boot the boot node dials a wider, randomly sampled set so
//! the first blocks leave it quickly. See [`bootstrap_peers`].

mod bootstrap;
mod mesh;

pub use bootstrap::{
    bootstrap_addresses, bootstrap_peers, sample, BOOTSTRAP_DIALS, DIAL_ALL_BELOW, STRATIFY_ABOVE,
};
pub use mesh::{link_indexes, mesh_addresses, meshable, required_links};
