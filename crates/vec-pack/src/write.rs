//! Pack generation: build modern packs, with or without delta compression.
//!
//! The object count is known before writing starts, so the header is final
//! from the first byte and the digest trailer streams over everything that
//! precedes it.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use vec_hash::hasher::Hasher;
use vec_hash::ObjectId;
use vec_object::ObjectKind;

use crate::chain::plan_chains;
use crate::delta::compute_delta;
use crate::entry::encode_entry_header;
use crate::index::write_index;
use crate::{PackError, MIN_DELTA_SAVINGS, PACK_SIGNATURE, PACK_VERSION};

/// Builder for a modern pack.
pub struct PackWriter {
    buf: Vec<u8>,
    declared: u32,
    written: u32,
    entries: Vec<(ObjectId, u64, u32)>,
}

/// A completed pack: container bytes, trailer digest, and index entries.
pub struct FinishedPack {
    pub bytes: Vec<u8>,
    pub digest: ObjectId,
    pub entries: Vec<(ObjectId, u64, u32)>,
}

impl PackWriter {
    /// Start a pack that will hold exactly `num_objects` entries.
    pub fn new(num_objects: u32) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(PACK_SIGNATURE);
        buf.extend_from_slice(&PACK_VERSION.to_be_bytes());
        buf.extend_from_slice(&num_objects.to_be_bytes());

        Self {
            buf,
            declared: num_objects,
            written: 0,
            entries: Vec::with_capacity(num_objects as usize),
        }
    }

    /// Append a full (non-delta) object. Returns its digest.
    pub fn add_object(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, PackError> {
        let oid = Hasher::hash_object(kind.as_str(), payload);
        let kind_num = match kind {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Blob => 3,
        };

        let offset = self.buf.len() as u64;
        let header = encode_entry_header(kind_num, payload.len() as u64);
        let compressed = compress(payload)?;

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(&compressed);

        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(&compressed);
        self.entries.push((oid, offset, crc.finalize()));
        self.written += 1;
        Ok(oid)
    }

    /// Append a delta entry for `target_oid`, encoded against `base`.
    pub fn add_delta(
        &mut self,
        base: ObjectId,
        target_oid: ObjectId,
        delta: &[u8],
    ) -> Result<(), PackError> {
        let offset = self.buf.len() as u64;
        let header = encode_entry_header(7, delta.len() as u64);
        let compressed = compress(delta)?;

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(base.as_bytes());
        crc.update(&compressed);

        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(base.as_bytes());
        self.buf.extend_from_slice(&compressed);
        self.entries.push((target_oid, offset, crc.finalize()));
        self.written += 1;
        Ok(())
    }

    /// Seal the pack with its digest trailer.
    pub fn finish(mut self) -> Result<FinishedPack, PackError> {
        if self.written != self.declared {
            return Err(PackError::InvalidHeader(format!(
                "declared {} objects but wrote {}",
                self.declared, self.written
            )));
        }
        let digest = Hasher::digest(&self.buf);
        self.buf.extend_from_slice(digest.as_bytes());
        Ok(FinishedPack {
            bytes: self.buf,
            digest,
            entries: self.entries,
        })
    }
}

impl FinishedPack {
    /// Write the container bytes to `pack_path`.
    pub fn write_to(&self, pack_path: &Path) -> Result<(), PackError> {
        std::fs::write(pack_path, &self.bytes)?;
        Ok(())
    }

    /// Write the container plus its `.idx` sibling.
    pub fn write_with_index(&self, pack_path: &Path) -> Result<PathBuf, PackError> {
        self.write_to(pack_path)?;
        let idx_path = pack_path.with_extension("idx");
        let mut entries = self.entries.clone();
        write_index(&idx_path, &mut entries, &self.digest)
    }
}

/// Build a pack from a set of objects.
///
/// With `use_deltas`, objects are grouped by kind and run through the chain
/// planner; each chain emits its base in full, then each descendant as a
/// delta against its predecessor, kept only when it saves at least
/// [`MIN_DELTA_SAVINGS`] bytes. Entry order always puts bases before their
/// descendants, so one forward pass resolves everything.
pub fn build_pack(
    objects: &[(ObjectId, ObjectKind, Vec<u8>)],
    use_deltas: bool,
) -> Result<FinishedPack, PackError> {
    let mut writer = PackWriter::new(objects.len() as u32);

    if !use_deltas {
        for (_, kind, payload) in objects {
            writer.add_object(*kind, payload)?;
        }
        return writer.finish();
    }

    let by_oid: std::collections::HashMap<ObjectId, (ObjectKind, &[u8])> = objects
        .iter()
        .map(|(oid, kind, payload)| (*oid, (*kind, payload.as_slice())))
        .collect();

    for kind in [ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob] {
        let group: Vec<(ObjectId, &[u8])> = objects
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(oid, _, payload)| (*oid, payload.as_slice()))
            .collect();
        if group.is_empty() {
            continue;
        }

        for chain in plan_chains(&group) {
            let (_, base_payload) = by_oid[&chain.base];
            writer.add_object(kind, base_payload)?;

            let mut prev_oid = chain.base;
            let mut prev_payload = base_payload;
            for (target_oid, _) in &chain.targets {
                let (_, target_payload) = by_oid[target_oid];
                let delta = compute_delta(prev_payload, target_payload);

                if target_payload.len() >= delta.len() + MIN_DELTA_SAVINGS {
                    writer.add_delta(prev_oid, *target_oid, &delta)?;
                } else {
                    writer.add_object(kind, target_payload)?;
                }
                prev_oid = *target_oid;
                prev_payload = target_payload;
            }
        }
    }

    writer.finish()
}

fn compress(data: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
