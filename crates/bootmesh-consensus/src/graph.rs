//! Weighted peer graph and network isolation.
//!
//! Peers live in an arena keyed by their packed account name. Edges are
//! plain `(from, to, weight)` triples indexed by source. Networks are the
//! strongly-connected components of that graph: two peers share a network
//! only if each can reach the other through declared links.

use crate::error::{Error, Result};
use crate::peer::Peer;
use bootmesh_discovery::{AccountName, Discovery, DiscoveryRow, ValidationError};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Weight given to an elected peer so it sorts above everything else.
pub const ELECTED_WEIGHT: u64 = u64::MAX;

/// Default liveness window for discovery rows (30 minutes).
pub const ACTIVE_WINDOW_SECS: u64 = 30 * 60;

/// A directed, weighted trust link between two arena peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: u64,
    pub to: u64,
    pub weight: u8,
}

/// One discovered record and whether its publisher counts as live.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub discovery: Discovery,
    pub active: bool,
    /// When the record was last published, in seconds
    pub updated_at: u64,
}

impl PeerRecord {
    /// Whether `self` should replace `other` for the same account: the
    /// later record wins, then the live one, then the greater content.
    fn supersedes(&self, other: &PeerRecord) -> bool {
        (self.updated_at, self.active, &self.discovery) > (other.updated_at, other.active, &other.discovery)
    }
}

/// A maximal set of mutually reachable peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    members: Vec<u64>,
}

impl Network {
    fn new(mut members: Vec<u64>) -> Self {
        members.sort_unstable();
        Self { members }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.binary_search(&id).is_ok()
    }

    /// Member ids in ascending order.
    pub fn members(&self) -> &[u64] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Graph of validated peers and their trust links.
#[derive(Debug, Clone, Default)]
pub struct PeerGraph {
    peers: BTreeMap<u64, Peer>,
    out_edges: BTreeMap<u64, Vec<Edge>>,
    rejected: Vec<(AccountName, ValidationError)>,
}

impl PeerGraph {
    /// Build the graph from discovered records.
    ///
    /// Invalid records are set aside (see [`PeerGraph::rejected`]). Of
    /// several records for the same account the latest published one is
    /// kept, ties going to the live record and then to the greater
    /// content, whatever the input order. Self links, repeated `(from, to)`
    /// pairs and links to unknown accounts are dropped.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PeerRecord>,
    {
        let mut graph = Self::default();
        let mut kept: BTreeMap<u64, PeerRecord> = BTreeMap::new();

        for record in records {
            let account = record.discovery.seed_network_account_name.clone();
            if let Err(e) = record.discovery.validate() {
                warn!("Isolating peer {}: {}", account, e);
                graph.rejected.push((account, e));
                continue;
            }
            // validate() has already checked that the name encodes
            let Ok(id) = account.to_id() else { continue };
            if let Some(current) = kept.get(&id) {
                warn!("Duplicate discovery record for {}, keeping the newer one", account);
                if !record.supersedes(current) {
                    continue;
                }
            }
            kept.insert(id, record);
        }
        for (id, record) in kept {
            graph.peers.insert(id, Peer::new(id, record.discovery, record.active));
        }

        let mut links = Vec::new();
        for (&from, peer) in &graph.peers {
            for link in &peer.discovery.seed_network_peers {
                let Ok(to) = link.account.to_id() else {
                    debug!("{} links to unencodable account {}", peer.account(), link.account);
                    continue;
                };
                links.push(Edge {
                    from,
                    to,
                    weight: link.weight,
                });
            }
        }
        for edge in links {
            graph.add_edge(edge);
        }

        graph
    }

    /// Build from coordination-chain rows. A row is active when it was
    /// refreshed within `window_secs` of `now`.
    pub fn from_rows(rows: Vec<DiscoveryRow>, now: u64, window_secs: u64) -> Self {
        Self::build(rows.into_iter().map(|row| {
            let active = row.is_active(now, window_secs);
            let updated_at = row.updated_at;
            PeerRecord {
                discovery: row.into_discovery(),
                active,
                updated_at,
            }
        }))
    }

    fn add_edge(&mut self, edge: Edge) -> bool {
        if edge.from == edge.to || !self.peers.contains_key(&edge.to) {
            return false;
        }
        let edges = self.out_edges.entry(edge.from).or_default();
        if edges.iter().any(|e| e.to == edge.to) {
            return false;
        }
        edges.push(edge);
        true
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peer(&self, id: u64) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peer_by_name(&self, account: &AccountName) -> Option<&Peer> {
        account.to_id().ok().and_then(|id| self.peers.get(&id))
    }

    /// Peers in ascending id order.
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Outbound edges of one peer, in declaration order.
    pub fn targets(&self, id: u64) -> &[Edge] {
        self.out_edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.out_edges.values().flatten()
    }

    /// Records that failed validation, with the reason.
    pub fn rejected(&self) -> &[(AccountName, ValidationError)] {
        &self.rejected
    }

    /// Partition the graph into networks.
    ///
    /// Every peer lands in exactly one network. A peer nobody links back to
    /// is a singleton.
    pub fn isolate(&self) -> Vec<Network> {
        let mut tarjan = Tarjan::default();
        for &root in self.peers.keys() {
            if !tarjan.index.contains_key(&root) {
                tarjan.run(self, root);
            }
        }
        tarjan.networks
    }

    /// Inbound weight of every member, counting only edges from the same network.
    pub fn network_weights(&self, network: &Network) -> BTreeMap<u64, u64> {
        let mut weights: BTreeMap<u64, u64> =
            network.members().iter().map(|&id| (id, 0)).collect();
        for edge in self.edges() {
            if !network.contains(edge.from) {
                continue;
            }
            if let Some(total) = weights.get_mut(&edge.to) {
                *total += u64::from(edge.weight);
            }
        }
        weights
    }

    /// Members of `network` with weights filled in, in consensus order.
    ///
    /// Active peers come first, then heavier peers, then ascending account
    /// name. An `elect` account inside the network is pinned to
    /// [`ELECTED_WEIGHT`].
    pub fn order(&self, network: &Network, elect: Option<&AccountName>) -> Vec<Peer> {
        let weights = self.network_weights(network);
        let elected = elect.and_then(|name| name.to_id().ok());
        if let (Some(name), Some(id)) = (elect, elected) {
            if !network.contains(id) {
                warn!("Elected account {} is not part of this network", name);
            }
        }

        let mut ordered: Vec<Peer> = weights
            .into_iter()
            .filter_map(|(id, weight)| {
                let mut peer = self.peers.get(&id)?.clone();
                peer.total_weight = if Some(id) == elected {
                    ELECTED_WEIGHT
                } else {
                    weight
                };
                Some(peer)
            })
            .collect();

        ordered.sort_by(|a, b| {
            b.active
                .cmp(&a.active)
                .then_with(|| b.total_weight.cmp(&a.total_weight))
                .then_with(|| a.account().cmp(b.account()))
        });
        ordered
    }

    /// The network the local peer belongs to.
    ///
    /// Falls back to the network of the first account `me` links to when
    /// `me` itself has not been discovered yet.
    pub fn my_network(&self, me: &Discovery) -> Result<Network> {
        let networks = self.isolate();
        let account = &me.seed_network_account_name;

        let find = |id: u64| networks.iter().find(|n| n.contains(id)).cloned();

        if let Some(network) = account.to_id().ok().and_then(find) {
            return Ok(network);
        }

        let fallback = me
            .seed_network_peers
            .first()
            .and_then(|link| link.account.to_id().ok())
            .and_then(find);
        if let Some(network) = &fallback {
            debug!("{} not discovered yet, joining network of its first link", account);
            return Ok(network.clone());
        }

        Err(Error::NoReachableNetwork {
            account: account.clone(),
        })
    }

    /// Consensus order of the local peer's network.
    pub fn consensus_order(&self, me: &Discovery, elect: Option<&AccountName>) -> Result<Vec<Peer>> {
        if self.is_empty() {
            return Err(Error::EmptyGraph);
        }
        let network = self.my_network(me)?;
        Ok(self.order(&network, elect))
    }
}

/// Iterative Tarjan strongly-connected-components over the arena.
#[derive(Default)]
struct Tarjan {
    next_index: usize,
    index: HashMap<u64, usize>,
    lowlink: HashMap<u64, usize>,
    stack: Vec<u64>,
    on_stack: HashSet<u64>,
    networks: Vec<Network>,
}

impl Tarjan {
    fn visit(&mut self, id: u64) {
        self.index.insert(id, self.next_index);
        self.lowlink.insert(id, self.next_index);
        self.next_index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);
    }

    fn lower(&mut self, id: u64, candidate: usize) {
        if let Some(low) = self.lowlink.get_mut(&id) {
            *low = (*low).min(candidate);
        }
    }

    fn run(&mut self, graph: &PeerGraph, root: u64) {
        // (node, next edge to explore)
        let mut frames: Vec<(u64, usize)> = vec![(root, 0)];
        self.visit(root);

        while let Some(frame) = frames.last_mut() {
            let (v, pos) = *frame;
            if let Some(edge) = graph.targets(v).get(pos) {
                frame.1 += 1;
                let w = edge.to;
                match self.index.get(&w).copied() {
                    None => {
                        self.visit(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) if self.on_stack.contains(&w) => self.lower(v, w_index),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let v_low = self.lowlink.get(&v).copied().unwrap_or(usize::MAX);
            if let Some(&(parent, _)) = frames.last() {
                self.lower(parent, v_low);
            }
            if Some(v_low) == self.index.get(&v).copied() {
                let mut members = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                self.networks.push(Network::new(members));
            }
        }
    }
}
