//! Packfile engine: container codec, delta compression, chain planning,
//! fanout index, and the unpack pipeline.
//!
//! A pack combines many objects with per-object zlib compression. Similar
//! objects are stored as delta entries referencing a base by digest. The
//! companion `.idx` file maps digests to pack offsets for random access.

pub mod chain;
pub mod delta;
pub mod entry;
pub mod index;
pub mod legacy;
pub mod pack;
pub mod parse;
pub mod unpack;
pub mod verify;
pub mod write;

use vec_hash::ObjectId;
use vec_object::ObjectKind;

/// Errors that can occur during pack operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("{count} deltas left unresolved after iterative resolution")]
    UnresolvedDelta { count: usize },

    #[error("delta chain too deep (>{max_depth} levels) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("pack checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("digest mismatch: expected {expected}, recomputed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Store(#[from] vec_store::StoreError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),
}

/// Kind of a packed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackEntryKind {
    Commit,
    Tree,
    Blob,
    /// Delta referencing its base object by digest.
    Delta { base: ObjectId },
}

impl PackEntryKind {
    /// The object kind for a non-delta entry.
    pub fn to_object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Delta { .. } => None,
        }
    }

    /// Kind number as used in entry headers.
    pub fn kind_number(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Delta { .. } => 7,
        }
    }

    /// The entry kind for a full (non-delta) object.
    pub fn from_object_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Commit => Self::Commit,
            ObjectKind::Tree => Self::Tree,
            ObjectKind::Blob => Self::Blob,
        }
    }
}

/// A fully resolved object read from a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

/// Pack container constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index constants.
pub const IDX_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63]; // "\377tOc"
pub const IDX_VERSION: u32 = 2;

/// Maximum planned delta chain depth; bounds random-access cost.
pub const MAX_CHAIN_DEPTH: usize = 5;

/// Minimum bytes a delta must save over the full object to be kept.
pub const MIN_DELTA_SAVINGS: usize = 512;

/// Minimum similarity score for a delta candidate pair.
pub const MIN_CHAIN_SCORE: f64 = 0.3;
