//! Pack and index verification.

use std::path::Path;

use vec_hash::hasher::Hasher;

use crate::pack::PackFile;
use crate::parse::{parse_modern, verify_trailer};
use crate::{PackEntryKind, PackError};

/// What a verification pass established.
#[derive(Debug, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries in the pack.
    pub objects: usize,
    /// How many entries are deltas.
    pub deltas: usize,
    /// Whether an index was present and cross-checked.
    pub indexed: bool,
}

/// Verify a pack file on disk, and its `.idx` sibling when present.
///
/// Always checks the header, version, digest trailer, every entry's zlib
/// stream, and each declared size. With an index, additionally checks that
/// every indexed digest resolves through its recorded offset to bytes that
/// hash back to that digest.
pub fn verify_pack(pack_path: &Path) -> Result<VerifyReport, PackError> {
    let data = std::fs::read(pack_path)?;
    verify_trailer(&data)?;

    let entries = parse_modern(&data)?;
    let deltas = entries
        .iter()
        .filter(|e| matches!(e.kind, PackEntryKind::Delta { .. }))
        .count();

    let idx_path = pack_path.with_extension("idx");
    if !idx_path.exists() {
        return Ok(VerifyReport {
            objects: entries.len(),
            deltas,
            indexed: false,
        });
    }

    let pack = PackFile::open(pack_path)?;
    if pack.index().pack_digest() != verify_trailer(&data)? {
        return Err(PackError::InvalidIndex(
            "index trailer does not match pack digest".into(),
        ));
    }

    for (oid, offset) in pack.index().iter() {
        let obj = pack.read_at_offset(offset)?;
        let actual = Hasher::hash_object(obj.kind.as_str(), &obj.data);
        if actual != oid {
            return Err(PackError::DigestMismatch {
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }

    Ok(VerifyReport {
        objects: entries.len(),
        deltas,
        indexed: true,
    })
}
