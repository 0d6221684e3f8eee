//! Compute a delta that transforms a base object into a target object.
//!
//! The matcher indexes every 4-byte seed of the base, then scans the target
//! left to right, extending the longest match available at each position.
//! Matching regions become copy instructions, everything else becomes
//! 127-byte-chunked inserts. The scan is deterministic: candidates are
//! tried in ascending base offset and the first longest match wins.

use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint, MAX_INSERT};

/// Minimum useful match length; shorter matches cost more than a literal.
const MIN_MATCH: usize = 4;

/// Longest single copy instruction we emit.
const MAX_COPY: usize = 65_536;

/// Cap on remembered base positions per seed, to bound the scan on highly
/// repetitive input. Earliest positions win.
const MAX_SEED_POSITIONS: usize = 64;

/// Compute a delta whose application to `base` reconstructs `target`.
pub fn compute_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = Vec::new();
    delta.extend_from_slice(&write_varint(base.len()));
    delta.extend_from_slice(&write_varint(target.len()));

    if target.is_empty() {
        return delta;
    }

    let index = build_seed_index(base);

    let mut tpos = 0;
    let mut pending: Vec<u8> = Vec::new();

    while tpos < target.len() {
        let matched = if target.len() - tpos >= MIN_MATCH {
            find_longest_match(base, &index, target, tpos)
        } else {
            None
        };

        match matched {
            Some((offset, len)) => {
                flush_insert(&mut delta, &mut pending);
                delta.extend_from_slice(&encode_copy(offset as u64, len));
                tpos += len;
            }
            None => {
                pending.push(target[tpos]);
                tpos += 1;
                if pending.len() == MAX_INSERT {
                    flush_insert(&mut delta, &mut pending);
                }
            }
        }
    }

    flush_insert(&mut delta, &mut pending);
    delta
}

type SeedIndex = HashMap<[u8; MIN_MATCH], Vec<usize>>;

fn build_seed_index(base: &[u8]) -> SeedIndex {
    let mut index: SeedIndex = HashMap::new();
    if base.len() < MIN_MATCH {
        return index;
    }
    for offset in 0..=base.len() - MIN_MATCH {
        let mut seed = [0u8; MIN_MATCH];
        seed.copy_from_slice(&base[offset..offset + MIN_MATCH]);
        let positions = index.entry(seed).or_default();
        if positions.len() < MAX_SEED_POSITIONS {
            positions.push(offset);
        }
    }
    index
}

/// The longest match of `target[tpos..]` in `base`, at least MIN_MATCH and
/// at most MAX_COPY bytes. Returns `(base_offset, length)`.
fn find_longest_match(
    base: &[u8],
    index: &SeedIndex,
    target: &[u8],
    tpos: usize,
) -> Option<(usize, usize)> {
    let mut seed = [0u8; MIN_MATCH];
    seed.copy_from_slice(&target[tpos..tpos + MIN_MATCH]);
    let candidates = index.get(&seed)?;

    let mut best: Option<(usize, usize)> = None;
    for &offset in candidates {
        let limit = (base.len() - offset)
            .min(target.len() - tpos)
            .min(MAX_COPY);
        let mut len = MIN_MATCH;
        while len < limit && base[offset + len] == target[tpos + len] {
            len += 1;
        }
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((offset, len));
        }
    }
    best
}

fn flush_insert(delta: &mut Vec<u8>, pending: &mut Vec<u8>) {
    while !pending.is_empty() {
        let chunk_len = pending.len().min(MAX_INSERT);
        let chunk: Vec<u8> = pending.drain(..chunk_len).collect();
        delta.extend_from_slice(&encode_insert(&chunk));
    }
}
