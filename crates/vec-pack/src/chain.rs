//! Delta chain planning: decide which objects delta against which bases.
//!
//! Objects of one kind are fingerprinted with overlapping chunk hashes and
//! scored pairwise by Jaccard similarity. High-scoring pairs are linked
//! into chains: a full base object followed by up to [`MAX_CHAIN_DEPTH`]
//! delta descendants, each encoded against its predecessor. Chains are
//! emitted bases-first so a single forward pass can resolve every delta.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use vec_hash::ObjectId;

use crate::{MAX_CHAIN_DEPTH, MIN_CHAIN_SCORE};

/// Chunk length for fingerprinting.
const CHUNK_SIZE: usize = 64;

/// Chunk stride: 50% overlap.
const CHUNK_STEP: usize = CHUNK_SIZE / 2;

/// A planned chain: a base plus its ordered delta descendants with their
/// similarity scores. Descendant `i` is encoded against descendant `i - 1`
/// (or the base for `i == 0`).
#[derive(Debug, Clone)]
pub struct DeltaChain {
    pub base: ObjectId,
    pub targets: Vec<(ObjectId, f64)>,
}

/// The set of 64-bit chunk hashes describing an object's content.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    chunks: HashSet<u64>,
}

impl Fingerprint {
    /// Fingerprint a byte sequence: FNV-1a over overlapping 64-byte chunks.
    pub fn of(data: &[u8]) -> Self {
        let mut chunks = HashSet::new();
        if data.is_empty() {
            return Self { chunks };
        }
        let mut offset = 0;
        loop {
            let end = (offset + CHUNK_SIZE).min(data.len());
            chunks.insert(fnv1a(&data[offset..end]));
            if end == data.len() {
                break;
            }
            offset += CHUNK_STEP;
        }
        Self { chunks }
    }

    /// Jaccard similarity weighted by a set-size ratio penalty.
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.chunks.is_empty() || other.chunks.is_empty() {
            return 0.0;
        }
        let intersection = self.chunks.intersection(&other.chunks).count();
        let union = self.chunks.len() + other.chunks.len() - intersection;
        if union == 0 {
            return 0.0;
        }
        let jaccard = intersection as f64 / union as f64;

        let (small, large) = if self.chunks.len() <= other.chunks.len() {
            (self.chunks.len(), other.chunks.len())
        } else {
            (other.chunks.len(), self.chunks.len())
        };
        jaccard * (small as f64 / large as f64)
    }
}

/// 64-bit FNV-1a.
fn fnv1a(data: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Plan delta chains over a set of same-kind objects.
///
/// Every input object appears in exactly one chain; objects with no good
/// pairing become single-object chains. The larger object of a pair is
/// chosen as base. A pair whose preferred base is already some chain's
/// descendant is skipped rather than flipped: flipping would force
/// regenerating every delta on the path.
pub fn plan_chains(objects: &[(ObjectId, &[u8])]) -> Vec<DeltaChain> {
    if objects.len() < 2 {
        return objects
            .iter()
            .map(|(oid, _)| DeltaChain {
                base: *oid,
                targets: Vec::new(),
            })
            .collect();
    }

    let fingerprints: Vec<Fingerprint> =
        objects.par_iter().map(|(_, data)| Fingerprint::of(data)).collect();

    // Score all pairs above the threshold.
    let mut pairs: Vec<(usize, usize, f64)> = (0..objects.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let fingerprints = &fingerprints;
            (i + 1..objects.len()).filter_map(move |j| {
                let score = fingerprints[i].similarity(&fingerprints[j]);
                (score >= MIN_CHAIN_SCORE).then_some((i, j, score))
            })
        })
        .collect();

    // Best pairs first; ties broken by index for determinism.
    pairs.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.0, a.1).cmp(&(b.0, b.1)))
    });

    let mut chains: Vec<DeltaChain> = Vec::new();
    let mut heads: HashMap<usize, usize> = HashMap::new(); // object idx → chain idx
    let mut assigned: HashSet<usize> = HashSet::new();

    for (i, j, score) in pairs {
        // The larger, denser object maximizes copy opportunities as base.
        let (base, target) = if objects[i].1.len() >= objects[j].1.len() {
            (i, j)
        } else {
            (j, i)
        };

        if assigned.contains(&target) {
            continue;
        }

        if let Some(&chain_idx) = heads.get(&base) {
            let chain = &mut chains[chain_idx];
            if chain.targets.len() < MAX_CHAIN_DEPTH {
                chain.targets.push((objects[target].0, score));
                assigned.insert(target);
            }
        } else if assigned.contains(&base) {
            // Base is a descendant elsewhere; no flipping.
            continue;
        } else {
            let chain_idx = chains.len();
            chains.push(DeltaChain {
                base: objects[base].0,
                targets: vec![(objects[target].0, score)],
            });
            heads.insert(base, chain_idx);
            assigned.insert(base);
            assigned.insert(target);
        }
    }

    // Everything unpaired stands alone.
    for (idx, (oid, _)) in objects.iter().enumerate() {
        if !assigned.contains(&idx) {
            chains.push(DeltaChain {
                base: *oid,
                targets: Vec::new(),
            });
        }
    }

    chains
}
