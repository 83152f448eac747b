//! One-time bootstrap dial set for the boot node.
//!
//! This set isn't agreed upon, so it draws from any generator the caller
//! hands in rather than the shared launch seed.

use crate::mesh::meshable;
use bootmesh_consensus::Peer;
use bootmesh_discovery::AccountName;
use rand::RngCore;
use std::collections::HashSet;

/// Below this many candidates the boot node dials everybody.
pub const DIAL_ALL_BELOW: usize = 26;

/// Above this many candidates sampling is stratified by consensus rank.
pub const STRATIFY_ABOVE: usize = 50;

/// Dials sampled from the whole list in the middle band.
pub const BOOTSTRAP_DIALS: usize = 25;

/// `(range start, range end, picks)` for the stratified band.
const STRATA: [(usize, Option<usize>, usize); 3] = [(0, Some(20), 15), (20, Some(45), 5), (45, None, 5)];

/// Draw `count` elements without replacement. Each draw takes
/// `next_u64() % remaining` and removes that element from the pool.
pub fn sample<T: Clone, R: RngCore>(pool: &[T], count: usize, rng: &mut R) -> Vec<T> {
    let mut pool = pool.to_vec();
    let mut picked = Vec::with_capacity(count.min(pool.len()));
    while picked.len() < count && !pool.is_empty() {
        let index = (rng.next_u64() % pool.len() as u64) as usize;
        picked.push(pool.remove(index));
    }
    picked
}

/// Pick the bootstrap peers out of `candidates`, kept in consensus order.
pub fn bootstrap_peers<'a, R: RngCore>(candidates: &[&'a Peer], rng: &mut R) -> Vec<&'a Peer> {
    let n = candidates.len();
    if n < DIAL_ALL_BELOW {
        return candidates.to_vec();
    }
    if n > STRATIFY_ABOVE {
        return STRATA
            .iter()
            .flat_map(|&(start, end, picks)| {
                let end = end.unwrap_or(n);
                sample(&candidates[start..end], picks, rng)
            })
            .collect();
    }
    sample(candidates, BOOTSTRAP_DIALS, rng)
}

/// Addresses the boot node `me` dials right after boot, deduplicated.
pub fn bootstrap_addresses<R: RngCore>(peers: &[Peer], me: &AccountName, rng: &mut R) -> Vec<String> {
    let candidates: Vec<&Peer> = meshable(peers)
        .into_iter()
        .filter(|p| p.account() != me)
        .collect();
    let mut seen = HashSet::new();
    bootstrap_peers(&candidates, rng)
        .into_iter()
        .map(|p| p.discovery.target_p2p_address.clone())
        .filter(|addr| seen.insert(addr.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::peer;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn candidates(n: usize) -> Vec<Peer> {
        (0..n).map(|i| peer(i, &format!("host{}:9876", i))).collect()
    }

    #[test]
    fn sample_removes_picked_elements() {
        let pool: Vec<u32> = (0..10).collect();
        assert_eq!(sample(&pool, 3, &mut StepRng::new(0, 1)), vec![0, 2, 4]);
        assert_eq!(sample(&pool, 20, &mut StepRng::new(0, 1)).len(), 10);
    }

    #[test]
    fn small_lists_dial_everyone() {
        let peers = candidates(25);
        let refs: Vec<&Peer> = peers.iter().collect();
        let picked = bootstrap_peers(&refs, &mut StepRng::new(0, 1));
        assert_eq!(picked.len(), 25);
    }

    #[test]
    fn middle_band_samples_twenty_five() {
        for n in [26, 50] {
            let peers = candidates(n);
            let refs: Vec<&Peer> = peers.iter().collect();
            let picked = bootstrap_peers(&refs, &mut ChaCha20Rng::seed_from_u64(n as u64));
            let distinct: HashSet<u64> = picked.iter().map(|p| p.id).collect();
            assert_eq!(picked.len(), BOOTSTRAP_DIALS);
            assert_eq!(distinct.len(), BOOTSTRAP_DIALS, "n = {} sampled a peer twice", n);
        }
    }

    #[test]
    fn large_lists_are_stratified() {
        let peers = candidates(80);
        let refs: Vec<&Peer> = peers.iter().collect();
        let picked = bootstrap_peers(&refs, &mut ChaCha20Rng::seed_from_u64(9));
        assert_eq!(picked.len(), 25);
        assert!(picked[..15].iter().all(|p| p.id < 20));
        assert!(picked[15..20].iter().all(|p| (20..45).contains(&p.id)));
        assert!(picked[20..].iter().all(|p| p.id >= 45));
    }

    #[test]
    fn boot_node_never_dials_itself() {
        let peers = candidates(5);
        let addrs = bootstrap_addresses(&peers, &"peera".into(), &mut StepRng::new(0, 1));
        assert_eq!(addrs.len(), 4);
        assert!(!addrs.contains(&"host0:9876".to_string()));
    }

    #[test]
    fn clone_slots_dial_their_source_once() {
        let mut peers = candidates(3);
        bootmesh_consensus::pad_schedule(&mut peers);
        let addrs = bootstrap_addresses(&peers, &"peera".into(), &mut StepRng::new(0, 1));
        assert_eq!(addrs, vec!["host1:9876", "host2:9876"]);
    }
}
