//! Loose object storage: atomic, deduplicating writes keyed by digest.
//!
//! Each object lives at `objects/XX/YYYY…` where `XX` is the first digest
//! byte in hex and `YYYY…` is the rest. The file holds the framed bytes
//! `<kind> <len>\0<payload>` uncompressed; the read path also accepts
//! zlib-compressed files written by the legacy path.

mod cache;
mod enumerate;
mod read;
mod write;

pub use cache::ObjectCache;
pub use enumerate::LooseIter;

use std::path::{Path, PathBuf};

use vec_hash::ObjectId;
use vec_object::ObjectKind;

/// A raw object as stored: kind plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub payload: Vec<u8>,
}

/// Interface to the loose object directory.
pub struct LooseStore {
    objects_dir: PathBuf,
}

impl LooseStore {
    /// Open the loose object store rooted at `objects_dir`.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
        }
    }

    /// The objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// The file path for a given object id.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }
}

/// Errors from loose object operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("corrupt loose object {oid}: {reason}")]
    Corrupt { oid: String, reason: String },

    #[error("digest mismatch at {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_uses_two_char_fanout() {
        let store = LooseStore::open("/tmp/objects");
        let hex = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let oid = ObjectId::from_hex(hex).unwrap();
        assert_eq!(
            store.object_path(&oid),
            PathBuf::from(format!("/tmp/objects/e3/{}", &hex[2..]))
        );
    }
}
