//! Network discovery and the launch block.

use crate::chain::SeedChain;
use crate::error::{Error, Result};
use crate::poll::Poller;
use bootmesh_consensus::{shuffle_tier, ContentAgreement, Peer, PeerGraph, PeerRecord};
use bootmesh_discovery::{AccountName, Discovery, DiscoveryRow};
use crc::{Crc, CRC_64_XZ};
use tracing::{debug, info, warn};

/// CRC-64 in its reflected form (ECMA polynomial, inverted register).
const LAUNCH_CRC: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Shuffle seed for a launch block: the CRC-64 of the hex-decoded block id.
///
/// Decoding stops at the first pair that isn't hex, so a malformed id
/// checksums its valid prefix.
pub fn seed_from_block_id(block_id: &str) -> u64 {
    let raw: Vec<u8> = block_id
        .trim()
        .as_bytes()
        .chunks_exact(2)
        .map_while(|pair| hex::decode(pair).ok().and_then(|b| b.first().copied()))
        .collect();
    LAUNCH_CRC.checksum(&raw)
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Poll until the coordination chain reaches `height` and return the
/// shuffle seed derived from that block.
pub async fn wait_for_launch_block(chain: &dyn SeedChain, poller: &Poller, height: u64) -> Result<u64> {
    info!("Waiting for launch block {}", height);
    let block_id = poller
        .until("launch block", || async {
            let head = chain.head_block_num().await?;
            if head < height {
                debug!("Head is {}, launch block {}", head, height);
                return Ok(None);
            }
            chain.block_id(height).await.map(Some)
        })
        .await?;
    let seed = seed_from_block_id(&block_id);
    info!("Launch block {} has id {}, shuffle seed {}", height, block_id, seed);
    Ok(seed)
}

/// The local network as seen at one point in time.
#[derive(Debug, Clone)]
pub struct NetworkView {
    pub graph: PeerGraph,
    /// Consensus order, before shuffling
    pub ordered: Vec<Peer>,
    pub agreement: ContentAgreement,
}

impl NetworkView {
    /// Order the network `me` belongs to.
    pub fn from_rows(
        rows: Vec<DiscoveryRow>,
        me: &Discovery,
        now: u64,
        window_secs: u64,
        elect: Option<&AccountName>,
    ) -> Result<Self> {
        let graph = PeerGraph::from_rows(rows, now, window_secs);
        Self::from_graph(graph, me, elect)
    }

    /// A network of one: the local discovery, always active.
    pub fn single(me: &Discovery) -> Result<Self> {
        let graph = PeerGraph::build([PeerRecord {
            discovery: me.clone(),
            active: true,
            updated_at: 0,
        }]);
        Self::from_graph(graph, me, None)
    }

    fn from_graph(graph: PeerGraph, me: &Discovery, elect: Option<&AccountName>) -> Result<Self> {
        for (account, reason) in graph.rejected() {
            debug!("Ignoring {}: {}", account, reason);
        }
        let ordered = graph.consensus_order(me, elect)?;
        let agreement = ContentAgreement::compute(&ordered);
        Ok(Self {
            graph,
            ordered,
            agreement,
        })
    }

    /// Discovery of the top-ordered peer. Its contents are the ones booted.
    pub fn launch(&self) -> Result<&Discovery> {
        self.ordered
            .first()
            .map(|p| &p.discovery)
            .ok_or(Error::Consensus(bootmesh_consensus::Error::EmptyGraph))
    }

    /// Whether the peers that may boot the network declare the same contents.
    pub fn top_agree(&self) -> bool {
        let tier = shuffle_tier(self.ordered.len()).max(1);
        self.agreement.top_agree(&self.ordered, tier)
    }

    /// Content references declared by the launch discovery.
    pub fn launch_references(&self) -> Result<Vec<String>> {
        Ok(self
            .launch()?
            .target_contents
            .iter()
            .map(|c| c.reference.clone())
            .collect())
    }

    /// Log the order with each peer's content signature.
    pub fn log_order(&self) {
        info!(
            "Network of {} peer(s), contents [{}]",
            self.ordered.len(),
            self.agreement.names().join(", ")
        );
        for (i, peer) in self.ordered.iter().enumerate() {
            info!(
                "{:>3}. {:<13} weight {:>5} {} {}",
                i,
                peer.account(),
                peer.total_weight,
                self.agreement.signature(&peer.discovery),
                if peer.active { "" } else { "(inactive)" }
            );
        }
        if !self.top_agree() {
            warn!("Top peers disagree on launch contents, booting from the first peer's");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::mock::MockSeedChain;
    use bootmesh_discovery::{Authority, ContentRef, InitialAuthority, PeerLink};
    use std::time::Duration;

    pub(crate) fn discovery(account: &str, links: &[(&str, u8)], content: &str) -> Discovery {
        let target = format!("{:a<12}", account);
        Discovery {
            seed_network_account_name: account.into(),
            seed_network_peers: links
                .iter()
                .map(|&(a, w)| PeerLink {
                    account: a.into(),
                    weight: w,
                    comment: String::new(),
                })
                .collect(),
            seed_network_launch_block: 10,
            target_account_name: target.as_str().into(),
            target_p2p_address: format!("{}.example:9876", account),
            target_http_address: format!("https://{}.example", account),
            target_appointed_block_producer_signing_key: format!("SIGN_{}", account),
            target_initial_authority: InitialAuthority {
                owner: Authority::single_key(format!("OWNER_{}", account)),
                active: Authority::single_key(format!("ACTIVE_{}", account)),
            },
            target_contents: vec![ContentRef {
                name: "boot_sequence.yaml".into(),
                reference: content.into(),
                comment: String::new(),
            }],
            ..Default::default()
        }
    }

    pub(crate) fn row(discovery: Discovery, updated_at: u64) -> DiscoveryRow {
        DiscoveryRow {
            id: discovery.seed_network_account_name.clone(),
            content: discovery,
            updated_at,
        }
    }

    #[test]
    fn seed_is_crc64_of_decoded_id() {
        let id = "0000000a5b7e8e1b3c1f3ad4a0c1b2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9";
        assert_eq!(seed_from_block_id(id), 3_159_399_061_599_036_188);
        assert_eq!(seed_from_block_id(&format!(" {}\n", id)), seed_from_block_id(id));
        assert_ne!(seed_from_block_id(id), seed_from_block_id(&id.replace('9', "8")));
        // "123456789" as raw bytes has the standard check value
        assert_eq!(seed_from_block_id("313233343536373839"), 0x995d_c9bb_df19_39fa);
    }

    #[test]
    fn malformed_id_checksums_its_hex_prefix() {
        assert_eq!(seed_from_block_id("3132zz"), seed_from_block_id("3132"));
        assert_eq!(seed_from_block_id("313"), seed_from_block_id("31"));
        assert_eq!(seed_from_block_id("not hex"), 0);
    }

    #[test]
    fn view_orders_and_names_launch() {
        let rows = vec![
            row(discovery("alice", &[("bob", 50)], "blake3:aa"), 100),
            row(discovery("bob", &[("alice", 80)], "blake3:aa"), 100),
        ];
        let me = discovery("bob", &[("alice", 80)], "blake3:aa");
        let view = NetworkView::from_rows(rows, &me, 200, 1800, None).unwrap();
        assert_eq!(view.ordered[0].account().as_str(), "alice");
        assert_eq!(view.launch().unwrap().seed_network_account_name.as_str(), "alice");
        assert_eq!(view.launch_references().unwrap(), vec!["blake3:aa".to_string()]);
        assert!(view.top_agree());
    }

    #[test]
    fn elect_overrides_weight() {
        let rows = vec![
            row(discovery("alice", &[("bob", 50)], "blake3:aa"), 100),
            row(discovery("bob", &[("alice", 80)], "blake3:aa"), 100),
        ];
        let me = discovery("bob", &[], "blake3:aa");
        let view = NetworkView::from_rows(rows, &me, 200, 1800, Some(&"bob".into())).unwrap();
        assert_eq!(view.ordered[0].account().as_str(), "bob");
    }

    #[test]
    fn single_view_is_just_me() {
        let me = discovery("solo", &[], "blake3:aa");
        let view = NetworkView::single(&me).unwrap();
        assert_eq!(view.ordered.len(), 1);
        assert!(view.ordered[0].active);
    }

    #[test]
    fn stranger_has_no_network() {
        let rows = vec![row(discovery("alice", &[], "blake3:aa"), 100)];
        let me = discovery("zed", &[], "blake3:aa");
        let err = NetworkView::from_rows(rows, &me, 200, 1800, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Consensus(bootmesh_consensus::Error::NoReachableNetwork { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_launch_height() {
        let chain = MockSeedChain::default();
        let poller = Poller::new(Duration::from_secs(1));
        // the mock head advances by one per query
        let seed = wait_for_launch_block(&chain, &poller, 5).await.unwrap();
        assert_eq!(*chain.head.lock().unwrap(), 5);
        assert_eq!(seed, seed_from_block_id(&chain.block_id(5).await.unwrap()));
    }
}
