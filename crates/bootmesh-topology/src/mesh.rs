//! Per-node mesh links.
//!
//! Node `p` of `n` always links to its ring successor `(p + 1) mod n`, plus
//! `k = ceil(sqrt(n))` finger links at `(p + 2^(i + 2)) mod n` for `i` in
//! `0..k`. The ring keeps the overlay connected; the fingers keep its
//! diameter low.

use bootmesh_consensus::Peer;
use bootmesh_discovery::AccountName;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// `ceil(sqrt(n))`, computed without floating point.
pub fn required_links(n: usize) -> usize {
    let mut k = 0usize;
    while k * k < n {
        k += 1;
    }
    k
}

/// Indexes node `position` of `total` dials. May include `position` itself
/// when a finger wraps around exactly.
pub fn link_indexes(total: usize, position: usize) -> BTreeSet<usize> {
    let mut links = BTreeSet::new();
    if total == 0 {
        return links;
    }
    links.insert((position + 1) % total);

    // 2^(i+2) mod total, doubled in place so large k never overflows
    let mut offset = 4 % total;
    for _ in 0..required_links(total) {
        links.insert((position + offset) % total);
        offset = (offset * 2) % total;
    }
    links
}

/// Peers that can take part in the mesh: live, with a dialable address.
///
/// Padding clones stay in as separate slots; they share their source's
/// address, which [`mesh_addresses`] folds away.
pub fn meshable(peers: &[Peer]) -> Vec<&Peer> {
    peers
        .iter()
        .filter(|p| p.active && p.discovery.has_p2p_address())
        .collect()
}

/// P2P addresses `me` dials, in schedule order, deduplicated.
///
/// Empty when `me` is not meshable. A node holding several slots takes
/// its last one. The node's own address is never returned.
pub fn mesh_addresses(peers: &[Peer], me: &AccountName) -> Vec<String> {
    let candidates = meshable(peers);
    let Some(position) = candidates.iter().rposition(|p| p.account() == me) else {
        debug!("{} is not meshable, dialing nobody", me);
        return Vec::new();
    };
    let own = &candidates[position].discovery.target_p2p_address;
    let links = link_indexes(candidates.len(), position);

    let mut seen = HashSet::new();
    candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| links.contains(i))
        .map(|(_, p)| p.discovery.target_p2p_address.clone())
        .filter(|addr| addr != own && seen.insert(addr.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bootmesh_discovery::Discovery;
    use proptest::prelude::*;

    pub(crate) fn peer(i: usize, addr: &str) -> Peer {
        let discovery = Discovery {
            seed_network_account_name: format!("peer{}", (b'a' + (i % 26) as u8) as char).into(),
            target_p2p_address: addr.into(),
            ..Default::default()
        };
        Peer::new(i as u64, discovery, true)
    }

    #[test]
    fn link_count_is_ceil_sqrt() {
        assert_eq!(required_links(0), 0);
        assert_eq!(required_links(1), 1);
        assert_eq!(required_links(4), 2);
        assert_eq!(required_links(5), 3);
        assert_eq!(required_links(10), 4);
        assert_eq!(required_links(100), 10);
        assert_eq!(required_links(101), 11);
    }

    #[test]
    fn ten_nodes_from_zero() {
        let links = link_indexes(10, 0);
        assert_eq!(links, BTreeSet::from([1, 2, 4, 6, 8]));
    }

    #[test]
    fn finger_matches_power_of_two_offsets() {
        for total in [3usize, 7, 12, 35, 121] {
            for position in 0..total {
                let links = link_indexes(total, position);
                for i in 0..required_links(total) {
                    let expected = (position as u128 + (1u128 << (i + 2))) % total as u128;
                    assert!(
                        links.contains(&(expected as usize)),
                        "total {} position {} missing finger {}",
                        total,
                        position,
                        i
                    );
                }
            }
        }
    }

    #[test]
    fn none_address_and_inactive_are_excluded() {
        let mut peers = vec![peer(0, "a:1"), peer(1, "none"), peer(2, "c:1")];
        peers[2].active = false;
        let list = meshable(&peers);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, 0);
    }

    #[test]
    fn clones_are_separate_slots() {
        let mut peers = vec![peer(0, "a:1"), peer(1, "b:1")];
        let mut clone = peers[1].clone();
        clone.clone_name = Some("peerb.a".into());
        peers.push(clone);
        assert_eq!(meshable(&peers).len(), 3);
    }

    #[test]
    fn padded_schedule_links_over_every_slot() {
        let mut peers: Vec<Peer> = (0..5).map(|i| peer(i, &format!("host{}:9876", i))).collect();
        bootmesh_consensus::pad_schedule(&mut peers);
        assert_eq!(peers.len(), 22);

        // 22 slots, k = 5: ring 1, fingers 4, 8, 16, 32%22=10, 64%22=20
        let addrs = mesh_addresses(&peers, &"peera".into());
        assert_eq!(addrs, vec!["host1:9876", "host4:9876", "host2:9876"]);
    }

    #[test]
    fn cloned_operator_links_from_its_last_slot() {
        let mut peers: Vec<Peer> = (0..5).map(|i| peer(i, &format!("host{}:9876", i))).collect();
        bootmesh_consensus::pad_schedule(&mut peers);

        // peerb last sits at slot 21: ring 0, fingers 3, 7, 15, 9, 19
        let addrs = mesh_addresses(&peers, &"peerb".into());
        assert_eq!(addrs, vec!["host0:9876", "host3:9876"]);
    }

    #[test]
    fn addresses_skip_self_and_duplicates() {
        let peers: Vec<Peer> = (0..5).map(|i| peer(i, &format!("host{}:9876", i))).collect();
        // 5 nodes, k = 3: ring 1, fingers 4, 8%5=3, 16%5=1
        let addrs = mesh_addresses(&peers, &"peera".into());
        assert_eq!(addrs, vec!["host1:9876", "host3:9876", "host4:9876"]);

        assert!(mesh_addresses(&peers, &"stranger".into()).is_empty());
    }

    proptest! {
        #[test]
        fn ring_successor_always_linked(total in 2usize..500, seed in any::<usize>()) {
            let position = seed % total;
            let links = link_indexes(total, position);
            prop_assert!(links.contains(&((position + 1) % total)));
            prop_assert!(links.len() <= required_links(total) + 1);
        }
    }
}
