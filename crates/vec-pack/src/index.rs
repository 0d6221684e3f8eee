//! Pack index reading, writing, and lookup.
//!
//! The index maps digests to pack offsets via a 256-entry fan-out table and
//! binary search. Layout (big-endian throughout):
//!
//! ```text
//! Header:  \xff tOc (4 bytes) | version (4 bytes = 2)
//! Fanout:  256 × 4-byte cumulative counts over the first digest byte
//! Digests: N × 32-byte sorted digests
//! CRC32:   N × 4-byte values (zero-filled when not computed)
//! Offsets: N × 4-byte offsets (high bit set → 8-byte table index)
//! 64-bit:  M × 8-byte large offsets (packs ≥ 2 GiB)
//! Trailer: 32-byte pack digest | 32-byte index digest
//! ```
//!
//! Digests are sorted lexicographically and the fan-out counts first-byte
//! prefixes; both are required for the binary search to be sound.

use std::path::{Path, PathBuf};

use memmap2::Mmap;
use vec_hash::fanout::FanoutTable;
use vec_hash::hasher::Hasher;
use vec_hash::{ObjectId, DIGEST_LEN};

use crate::{PackError, IDX_SIGNATURE, IDX_VERSION};

/// A memory-mapped pack index.
#[derive(Debug)]
pub struct PackIndex {
    data: Mmap,
    num_objects: u32,
    oid_offset: usize,
    crc_offset: usize,
    offset32_offset: usize,
    offset64_offset: usize,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open a pack index file.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        // Minimum size: header(8) + fanout(1024) + trailer(2 digests).
        if data.len() < 8 + 1024 + 2 * DIGEST_LEN {
            return Err(PackError::InvalidIndex("file too small".into()));
        }

        if data[0..4] != IDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            )));
        }

        let fanout_offset = 8;
        let last_fanout_pos = fanout_offset + 255 * 4;
        let num_objects = u32::from_be_bytes([
            data[last_fanout_pos],
            data[last_fanout_pos + 1],
            data[last_fanout_pos + 2],
            data[last_fanout_pos + 3],
        ]);

        let n = num_objects as usize;
        let oid_offset = fanout_offset + 1024;
        let crc_offset = oid_offset + n * DIGEST_LEN;
        let offset32_offset = crc_offset + n * 4;
        let offset64_offset = offset32_offset + n * 4;

        // The 64-bit table is variable; check the fixed parts + trailer.
        let min_size = offset64_offset + 2 * DIGEST_LEN;
        if data.len() < min_size {
            return Err(PackError::InvalidIndex(format!(
                "file too small: {} < {min_size}",
                data.len()
            )));
        }

        Ok(Self {
            data,
            num_objects,
            oid_offset,
            crc_offset,
            offset32_offset,
            offset64_offset,
            idx_path,
        })
    }

    /// Look up a digest, returning its pack offset.
    pub fn lookup(&self, oid: &ObjectId) -> Option<u64> {
        let (lo, hi) = self.fanout_range(oid.first_byte());
        let target = oid.as_bytes().as_slice();

        let mut low = lo;
        let mut high = hi;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Some(self.offset_at_index(mid as u32)),
            }
        }
        None
    }

    /// The digest at a sorted index position.
    pub fn oid_at_index(&self, index: u32) -> ObjectId {
        ObjectId::from_bytes(self.oid_bytes_at(index as usize)).expect("digest width in index")
    }

    /// The pack offset at a sorted index position.
    pub fn offset_at_index(&self, index: u32) -> u64 {
        let pos = self.offset32_offset + index as usize * 4;
        let val = u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]);

        if val & 0x8000_0000 != 0 {
            let idx64 = (val & 0x7FFF_FFFF) as usize;
            let pos64 = self.offset64_offset + idx64 * 8;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&self.data[pos64..pos64 + 8]);
            u64::from_be_bytes(bytes)
        } else {
            val as u64
        }
    }

    /// The CRC32 at a sorted index position.
    pub fn crc32_at_index(&self, index: u32) -> u32 {
        let pos = self.crc_offset + index as usize * 4;
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    /// Total number of objects indexed.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path to the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// The pack digest recorded in the trailer.
    pub fn pack_digest(&self) -> ObjectId {
        let start = self.data.len() - 2 * DIGEST_LEN;
        ObjectId::from_bytes(&self.data[start..start + DIGEST_LEN])
            .expect("digest width in trailer")
    }

    /// Iterate `(digest, offset)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, u64)> + '_ {
        (0..self.num_objects).map(|i| (self.oid_at_index(i), self.offset_at_index(i)))
    }

    fn fanout_range(&self, first_byte: u8) -> (usize, usize) {
        let end = self.fanout_entry(first_byte) as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fanout_entry(first_byte - 1) as usize
        };
        (start, end)
    }

    fn fanout_entry(&self, index: u8) -> u32 {
        let pos = 8 + index as usize * 4;
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let start = self.oid_offset + index * DIGEST_LEN;
        &self.data[start..start + DIGEST_LEN]
    }
}

/// Build and write a pack index for `entries`, returning the index path.
///
/// Entries are sorted by digest in place; the fan-out is built by counting
/// first-byte prefixes of the sorted order.
pub fn write_index(
    idx_path: &Path,
    entries: &mut [(ObjectId, u64, u32)],
    pack_digest: &ObjectId,
) -> Result<PathBuf, PackError> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::new();
    buf.extend_from_slice(&IDX_SIGNATURE);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());

    let sorted_oids: Vec<ObjectId> = entries.iter().map(|(oid, _, _)| *oid).collect();
    buf.extend_from_slice(&FanoutTable::build(&sorted_oids).to_bytes());

    for (oid, _, _) in entries.iter() {
        buf.extend_from_slice(oid.as_bytes());
    }

    for (_, _, crc) in entries.iter() {
        buf.extend_from_slice(&crc.to_be_bytes());
    }

    let mut large_offsets: Vec<u64> = Vec::new();
    for (_, offset, _) in entries.iter() {
        if *offset >= 0x8000_0000 {
            let idx = large_offsets.len() as u32;
            buf.extend_from_slice(&(0x8000_0000u32 | idx).to_be_bytes());
            large_offsets.push(*offset);
        } else {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }

    for offset in &large_offsets {
        buf.extend_from_slice(&offset.to_be_bytes());
    }

    buf.extend_from_slice(pack_digest.as_bytes());

    let idx_digest = Hasher::digest(&buf);
    buf.extend_from_slice(idx_digest.as_bytes());

    let idx_path = idx_path.to_path_buf();
    std::fs::write(&idx_path, &buf)?;
    Ok(idx_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_oid(first: u8, last: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[0] = first;
        bytes[31] = last;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn pack_digest() -> ObjectId {
        ObjectId::from_bytes(&[0x99; 32]).unwrap()
    }

    fn write_entries(dir: &Path, entries: &[(ObjectId, u64, u32)]) -> PathBuf {
        let mut entries = entries.to_vec();
        write_index(&dir.join("test.idx"), &mut entries, &pack_digest()).unwrap()
    }

    #[test]
    fn open_and_lookup_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = make_oid(0xab, 0x01);
        let path = write_entries(dir.path(), &[(oid, 12, 0xdeadbeef)]);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 1);
        assert_eq!(idx.lookup(&oid), Some(12));
        assert_eq!(idx.lookup(&make_oid(0xab, 0x02)), None);
    }

    #[test]
    fn lookup_multiple_objects() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x00, 0x01), 100, 0x111),
            (make_oid(0x00, 0x02), 200, 0x222),
            (make_oid(0x0a, 0x01), 300, 0x333),
            (make_oid(0xff, 0x01), 400, 0x444),
        ];
        let path = write_entries(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 4);
        for (oid, offset, _) in &entries {
            assert_eq!(idx.lookup(oid), Some(*offset));
        }
    }

    #[test]
    fn writer_sorts_unsorted_input() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0xff, 0x01), 100, 0),
            (make_oid(0x00, 0x01), 200, 0),
            (make_oid(0x55, 0x01), 300, 0),
        ];
        let path = write_entries(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.oid_at_index(0), make_oid(0x00, 0x01));
        assert_eq!(idx.oid_at_index(1), make_oid(0x55, 0x01));
        assert_eq!(idx.oid_at_index(2), make_oid(0xff, 0x01));
        // Offsets follow their digests through the sort.
        assert_eq!(idx.lookup(&make_oid(0xff, 0x01)), Some(100));
    }

    #[test]
    fn crc_values_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x10, 0x01), 100, 0xAAAA_BBBB),
            (make_oid(0x20, 0x01), 200, 0xCCCC_DDDD),
        ];
        let path = write_entries(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.crc32_at_index(0), 0xAAAA_BBBB);
        assert_eq!(idx.crc32_at_index(1), 0xCCCC_DDDD);
    }

    #[test]
    fn large_offsets_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let big: u64 = 5 * 1024 * 1024 * 1024; // 5 GiB
        let entries = vec![
            (make_oid(0x42, 0x01), big, 0),
            (make_oid(0x43, 0x01), 64, 0),
        ];
        let path = write_entries(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.lookup(&make_oid(0x42, 0x01)), Some(big));
        assert_eq!(idx.lookup(&make_oid(0x43, 0x01)), Some(64));
    }

    #[test]
    fn trailer_holds_pack_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_entries(dir.path(), &[(make_oid(0x01, 0x01), 10, 0)]);
        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.pack_digest(), pack_digest());
    }

    #[test]
    fn empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_entries(dir.path(), &[]);
        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 0);
        assert_eq!(idx.lookup(&make_oid(0, 0)), None);
        assert_eq!(idx.iter().count(), 0);
    }

    #[test]
    fn iterator_yields_sorted_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x02, 0x01), 200, 0),
            (make_oid(0x01, 0x01), 100, 0),
        ];
        let path = write_entries(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        let items: Vec<_> = idx.iter().collect();
        assert_eq!(items, vec![
            (make_oid(0x01, 0x01), 100),
            (make_oid(0x02, 0x01), 200),
        ]);
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.idx");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            PackIndex::open(&path).unwrap_err(),
            PackError::InvalidIndex(_)
        ));
    }

    #[test]
    fn truncated_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.idx");
        std::fs::write(&path, b"\xfftOc").unwrap();
        assert!(PackIndex::open(&path).is_err());
    }
}
