//! Object model: blob, tree, and commit parsing and serialization.
//!
//! Objects are immutable typed byte sequences identified by the SHA-256
//! digest of their framed form `<kind> <len>\0<payload>`. Commit and tree
//! payloads use little-endian length-prefixed encoding; the framing header
//! itself is ASCII.

mod blob;
mod commit;
mod tree;
pub mod codec;
pub mod header;

pub use blob::Blob;
pub use commit::Commit;
pub use tree::{EntryKind, Tree, TreeEntry};

use bstr::BString;
use vec_hash::hasher::Hasher;
use vec_hash::{HashError, ObjectId};

/// Errors produced by object operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object kind: {0}")]
    InvalidKind(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid tree entry '{name}': {reason}")]
    InvalidTreeEntry { name: String, reason: String },

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The kinds of stored objects.
///
/// The packfile-internal delta kind is not an object kind; it lives in the
/// pack entry type instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    /// Parse from the kind string in object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            _ => Err(ObjectError::InvalidKind(BString::from(s))),
        }
    }

    /// The canonical byte representation.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Blob => b"blob",
            Self::Tree => b"tree",
            Self::Commit => b"commit",
        }
    }

    /// The canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A parsed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Parse from framed bytes (header + payload).
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (kind, payload_len, header_len) = header::parse_header(data)?;
        let payload = &data[header_len..];
        if payload.len() != payload_len {
            return Err(ObjectError::Truncated {
                expected: payload_len,
                actual: payload.len(),
            });
        }
        Self::parse_payload(kind, payload)
    }

    /// Parse from payload bytes with known kind (no header).
    pub fn parse_payload(kind: ObjectKind, payload: &[u8]) -> Result<Self, ObjectError> {
        match kind {
            ObjectKind::Blob => Ok(Self::Blob(Blob::new(payload.to_vec()))),
            ObjectKind::Tree => Ok(Self::Tree(Tree::parse(payload)?)),
            ObjectKind::Commit => Ok(Self::Commit(Commit::parse(payload)?)),
        }
    }

    /// Serialize to framed form (header + payload).
    pub fn serialize(&self) -> Vec<u8> {
        let payload = self.serialize_payload();
        let hdr = header::write_header(self.kind(), payload.len());
        let mut out = Vec::with_capacity(hdr.len() + payload.len());
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&payload);
        out
    }

    /// Serialize just the payload (no header).
    pub fn serialize_payload(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.data().to_vec(),
            Self::Tree(t) => t.serialize(),
            Self::Commit(c) => c.serialize(),
        }
    }

    /// The object kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
        }
    }

    /// The digest of the framed form.
    pub fn id(&self) -> ObjectId {
        Hasher::hash_object(self.kind().as_str(), &self.serialize_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Commit] {
            assert_eq!(ObjectKind::from_bytes(kind.as_bytes()).unwrap(), kind);
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(ObjectKind::from_bytes(b"tag").is_err());
        assert!(ObjectKind::from_bytes(b"").is_err());
    }

    #[test]
    fn blob_parse_serialize() {
        let obj = Object::parse(b"blob 6\0hello\n").unwrap();
        assert_eq!(obj.kind(), ObjectKind::Blob);
        assert_eq!(obj.serialize(), b"blob 6\0hello\n");
    }

    #[test]
    fn truncated_payload_rejected() {
        let err = Object::parse(b"blob 10\0short").unwrap_err();
        assert!(matches!(
            err,
            ObjectError::Truncated {
                expected: 10,
                actual: 5
            }
        ));
    }

    #[test]
    fn id_is_digest_of_framed_bytes() {
        let obj = Object::Blob(Blob::new(b"hello\n".to_vec()));
        assert_eq!(
            obj.id(),
            vec_hash::hasher::Hasher::digest(b"blob 6\0hello\n")
        );
    }
}
