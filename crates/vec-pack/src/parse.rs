//! Sequential pack parsing: one forward pass over the container bytes.
//!
//! Readers attempt the modern framed form first and fall back to the legacy
//! flat form on signature mismatch. Writers only ever produce modern packs.

use std::io::Read;

use flate2::bufread::ZlibDecoder;
use vec_hash::hasher::Hasher;
use vec_hash::{ObjectId, DIGEST_LEN};
use vec_object::ObjectKind;

use crate::entry::parse_entry_header;
use crate::{legacy, PackEntryKind, PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// A decompressed entry from a single parse pass.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub kind: PackEntryKind,
    pub data: Vec<u8>,
    /// Entry offset in the pack (0 for legacy packs).
    pub offset: u64,
    /// Identity carried by the container, when the format provides one.
    pub expected: Option<ObjectId>,
}

impl ParsedEntry {
    /// The object kind for a non-delta entry.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        self.kind.to_object_kind()
    }
}

/// Parse a pack in either wire form into its decompressed entries.
pub fn parse_pack(data: &[u8]) -> Result<Vec<ParsedEntry>, PackError> {
    if data.len() >= 4 && &data[0..4] == PACK_SIGNATURE {
        parse_modern(data)
    } else {
        legacy::parse_legacy(data)
    }
}

/// Parse a modern pack, validating header, version, and digest trailer.
pub fn parse_modern(data: &[u8]) -> Result<Vec<ParsedEntry>, PackError> {
    let num_objects = check_header(data)?;
    verify_trailer(data)?;

    let body_end = data.len() - DIGEST_LEN;
    let mut pos = PACK_HEADER_SIZE as u64;
    let mut entries = Vec::with_capacity(num_objects as usize);

    for _ in 0..num_objects {
        if pos as usize >= body_end {
            return Err(PackError::CorruptEntry(pos));
        }
        let header = parse_entry_header(&data[pos as usize..body_end], pos)?;

        let compressed = &data[header.data_offset as usize..body_end];
        let mut decoder = ZlibDecoder::new(compressed);
        let mut payload = Vec::with_capacity(header.uncompressed_size);
        decoder
            .read_to_end(&mut payload)
            .map_err(|_| PackError::CorruptEntry(pos))?;

        if payload.len() != header.uncompressed_size {
            return Err(PackError::CorruptEntry(pos));
        }

        entries.push(ParsedEntry {
            kind: header.kind,
            data: payload,
            offset: pos,
            expected: None,
        });

        pos = header.data_offset + decoder.total_in();
    }

    if pos as usize != body_end {
        return Err(PackError::CorruptEntry(pos));
    }

    Ok(entries)
}

/// Validate the pack header, returning the declared object count.
pub fn check_header(data: &[u8]) -> Result<u32, PackError> {
    if data.len() < PACK_HEADER_SIZE + DIGEST_LEN {
        return Err(PackError::InvalidHeader("pack too small".into()));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    Ok(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Verify the digest trailer over everything preceding it.
pub fn verify_trailer(data: &[u8]) -> Result<ObjectId, PackError> {
    if data.len() < PACK_HEADER_SIZE + DIGEST_LEN {
        return Err(PackError::InvalidHeader("pack too small".into()));
    }
    let body = &data[..data.len() - DIGEST_LEN];
    let stored = ObjectId::from_bytes(&data[data.len() - DIGEST_LEN..])
        .map_err(|_| PackError::InvalidHeader("bad trailer digest".into()))?;
    let actual = Hasher::digest(body);
    if actual != stored {
        return Err(PackError::ChecksumMismatch {
            expected: stored.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(stored)
}
