//! Legacy flat pack form.
//!
//! The predecessor wire format: a `u32` count, then per object the raw
//! digest bytes, a `u32` payload length, a kind byte, and the uncompressed
//! payload. No compression, no deltas, no trailer. Still accepted on read;
//! never produced by the writer.

use vec_hash::{ObjectId, DIGEST_LEN};

use crate::parse::ParsedEntry;
use crate::{PackEntryKind, PackError};

/// Parse a legacy flat pack into entries.
pub fn parse_legacy(data: &[u8]) -> Result<Vec<ParsedEntry>, PackError> {
    if data.len() < 4 {
        return Err(PackError::InvalidHeader("legacy pack too small".into()));
    }
    let count = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let mut pos = 4usize;
    let mut entries = Vec::with_capacity(count.min(1 << 16));

    for _ in 0..count {
        if pos + DIGEST_LEN + 5 > data.len() {
            return Err(PackError::CorruptEntry(pos as u64));
        }
        let oid = ObjectId::from_bytes(&data[pos..pos + DIGEST_LEN])
            .map_err(|_| PackError::CorruptEntry(pos as u64))?;
        pos += DIGEST_LEN;

        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        pos += 4;

        let kind = match data[pos] {
            1 => PackEntryKind::Commit,
            2 => PackEntryKind::Tree,
            3 => PackEntryKind::Blob,
            other => {
                return Err(PackError::InvalidHeader(format!(
                    "legacy pack: unknown kind byte {other}"
                )))
            }
        };
        pos += 1;

        if pos + len > data.len() {
            return Err(PackError::CorruptEntry(pos as u64));
        }
        entries.push(ParsedEntry {
            kind,
            data: data[pos..pos + len].to_vec(),
            offset: 0,
            expected: Some(oid),
        });
        pos += len;
    }

    if pos != data.len() {
        return Err(PackError::InvalidHeader(format!(
            "legacy pack: {} trailing bytes",
            data.len() - pos
        )));
    }

    Ok(entries)
}

/// Build legacy bytes for reader tests. The production writer never emits
/// this form.
#[cfg(test)]
pub(crate) fn write_legacy_for_tests(objects: &[(ObjectId, u8, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(objects.len() as u32).to_be_bytes());
    for (oid, kind, payload) in objects {
        out.extend_from_slice(oid.as_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.push(*kind);
        out.extend_from_slice(payload);
    }
    out
}
