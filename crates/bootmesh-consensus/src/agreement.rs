//! Content agreement across ordered peers.
//!
//! Each artifact name maps every distinct reference seen for it to a
//! version number, assigned 1, 2, 3... in order of first appearance while
//! scanning peers in consensus order. A peer's signature is one character
//! per artifact name: `.` when it declares nothing, the version digit when
//! it is 9 or less, `X` above that.

use crate::peer::Peer;
use bootmesh_discovery::Discovery;
use std::collections::BTreeMap;

/// Signature character for an artifact a peer doesn't declare.
pub const ABSENT: char = '.';

/// Signature character for versions above 9.
pub const OVERFLOW: char = 'X';

/// Version table built from an ordered peer list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentAgreement {
    names: Vec<String>,
    versions: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ContentAgreement {
    pub fn compute(peers: &[Peer]) -> Self {
        let mut agreement = Self::default();
        for peer in peers {
            for content in &peer.discovery.target_contents {
                agreement.observe(&content.name, &content.reference);
            }
        }
        agreement
    }

    fn observe(&mut self, name: &str, reference: &str) {
        let refs = match self.versions.get_mut(name) {
            Some(refs) => refs,
            None => {
                self.names.push(name.to_string());
                self.versions.entry(name.to_string()).or_default()
            }
        };
        if !refs.contains_key(reference) {
            let next = refs.len() + 1;
            refs.insert(reference.to_string(), next);
        }
    }

    /// Artifact names in order of first appearance.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn version(&self, name: &str, reference: &str) -> Option<usize> {
        self.versions.get(name)?.get(reference).copied()
    }

    /// How many distinct references were seen for `name`.
    pub fn version_count(&self, name: &str) -> usize {
        self.versions.get(name).map_or(0, BTreeMap::len)
    }

    pub fn signature(&self, discovery: &Discovery) -> String {
        self.names
            .iter()
            .map(|name| {
                let version = discovery
                    .content_ref(name)
                    .and_then(|c| self.version(name, &c.reference));
                match version {
                    None => ABSENT,
                    Some(v) if v <= 9 => char::from_digit(v as u32, 10).unwrap_or(OVERFLOW),
                    Some(_) => OVERFLOW,
                }
            })
            .collect()
    }

    /// Whether the first `tier` peers carry byte-identical signatures.
    pub fn top_agree(&self, peers: &[Peer], tier: usize) -> bool {
        let mut signatures = peers
            .iter()
            .take(tier)
            .map(|p| self.signature(&p.discovery));
        match signatures.next() {
            Some(first) => signatures.all(|s| s == first),
            None => true,
        }
    }
}
