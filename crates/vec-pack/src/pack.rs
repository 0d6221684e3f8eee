//! Random access into an on-disk pack through its fanout index.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use memmap2::Mmap;
use vec_hash::{ObjectId, DIGEST_LEN};
use vec_object::ObjectKind;

use crate::entry::parse_entry_header;
use crate::index::PackIndex;
use crate::parse::{check_header, verify_trailer};
use crate::{PackEntryKind, PackError, PackedObject, MAX_CHAIN_DEPTH};

/// A memory-mapped pack with its index.
#[derive(Debug)]
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
}

impl PackFile {
    /// Open a `.pack` file and its `.idx` sibling.
    ///
    /// The header, version, digest trailer, and pack/index object counts
    /// are all validated up front.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        let num_objects = check_header(&data)?;
        verify_trailer(&data)?;

        let index = PackIndex::open(&idx_path)?;
        if index.num_objects() != num_objects {
            return Err(PackError::InvalidHeader(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
        })
    }

    /// Read an object by digest. Returns `None` if it is not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        self.read_object_with_resolver(oid, |_| None)
    }

    /// Read an object by digest, consulting `resolver` for delta bases that
    /// live outside this pack (already resident in the object store).
    pub fn read_object_with_resolver(
        &self,
        oid: &ObjectId,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectKind, Vec<u8>)>,
    ) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(offset) => {
                let obj = self.read_at_offset_with_resolver(offset, resolver)?;
                // The reconstructed bytes must hash back to the identity the
                // index claims for this entry.
                let actual =
                    vec_hash::hasher::Hasher::hash_object(obj.kind.as_str(), &obj.data);
                if actual != *oid {
                    return Err(PackError::DigestMismatch {
                        expected: oid.to_hex(),
                        actual: actual.to_hex(),
                    });
                }
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    /// Read the entry at a known offset, resolving delta chains.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        self.read_at_offset_with_resolver(offset, |_| None)
    }

    fn read_at_offset_with_resolver(
        &self,
        offset: u64,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectKind, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        let body_end = self.data.len() - DIGEST_LEN;

        // Collect the delta chain innermost-first, then apply in reverse.
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut current_offset = offset;

        for _ in 0..=MAX_CHAIN_DEPTH {
            let entry =
                parse_entry_header(&self.data[current_offset as usize..body_end], current_offset)?;

            let compressed = &self.data[entry.data_offset as usize..body_end];
            let mut decoder = ZlibDecoder::new(compressed);
            let mut payload = Vec::with_capacity(entry.uncompressed_size);
            decoder
                .read_to_end(&mut payload)
                .map_err(|_| PackError::CorruptEntry(current_offset))?;
            if payload.len() != entry.uncompressed_size {
                return Err(PackError::CorruptEntry(current_offset));
            }

            match entry.kind {
                PackEntryKind::Commit | PackEntryKind::Tree | PackEntryKind::Blob => {
                    let kind = entry.kind.to_object_kind().expect("non-delta kind");
                    let mut data = payload;
                    for delta in chain.iter().rev() {
                        data = crate::delta::apply_delta(&data, delta)?;
                    }
                    return Ok(PackedObject { kind, data });
                }
                PackEntryKind::Delta { base } => {
                    chain.push(payload);
                    if let Some(base_offset) = self.index.lookup(&base) {
                        current_offset = base_offset;
                    } else if let Some((kind, base_data)) = resolver(&base) {
                        let mut data = base_data;
                        for delta in chain.iter().rev() {
                            data = crate::delta::apply_delta(&data, delta)?;
                        }
                        return Ok(PackedObject { kind, data });
                    } else {
                        return Err(PackError::MissingBase(base));
                    }
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_CHAIN_DEPTH,
        })
    }

    /// Check whether this pack contains the given digest.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.lookup(oid).is_some()
    }

    /// Number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The pack index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Path to the `.pack` file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }
}
