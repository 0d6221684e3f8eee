use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use vec_hash::hasher::Hasher;
use vec_hash::ObjectId;
use vec_object::{header, Object};

use crate::{LooseStore, RawObject, StoreError};

/// Zlib stream marker: 0x78 followed by a valid flag byte.
fn looks_compressed(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x78 && matches!(data[1], 0x01 | 0x5e | 0x9c | 0xda)
}

impl LooseStore {
    /// Check whether an object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read an object's kind and payload by id.
    pub fn read(&self, oid: &ObjectId) -> Result<RawObject, StoreError> {
        let framed = self.read_framed(oid)?;

        let (kind, payload_len, header_len) =
            header::parse_header(&framed).map_err(|e| StoreError::Corrupt {
                oid: oid.to_hex(),
                reason: e.to_string(),
            })?;

        // The declared length must account for every byte after the header.
        if payload_len != framed.len() - header_len {
            return Err(StoreError::Corrupt {
                oid: oid.to_hex(),
                reason: format!(
                    "declared length {} but {} payload bytes on disk",
                    payload_len,
                    framed.len() - header_len
                ),
            });
        }

        Ok(RawObject {
            kind,
            payload: framed[header_len..].to_vec(),
        })
    }

    /// Read and parse an object.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Object, StoreError> {
        let raw = self.read(oid)?;
        Ok(Object::parse_payload(raw.kind, &raw.payload)?)
    }

    /// Read an object, verifying that its recomputed digest matches `oid`.
    pub fn read_verified(&self, oid: &ObjectId) -> Result<RawObject, StoreError> {
        let framed = self.read_framed(oid)?;
        let actual = Hasher::digest(&framed);
        if actual != *oid {
            return Err(StoreError::DigestMismatch {
                path: self.object_path(oid),
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }
        self.read(oid)
    }

    /// Read the framed bytes of an object, decompressing legacy zlib files.
    fn read_framed(&self, oid: &ObjectId) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(oid);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*oid));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        if looks_compressed(&data) {
            let mut decoder = ZlibDecoder::new(data.as_slice());
            let mut framed = Vec::new();
            decoder
                .read_to_end(&mut framed)
                .map_err(|e| StoreError::Corrupt {
                    oid: oid.to_hex(),
                    reason: format!("zlib decode failed: {e}"),
                })?;
            Ok(framed)
        } else {
            Ok(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use vec_object::ObjectKind;

    fn store_in(dir: &std::path::Path) -> LooseStore {
        LooseStore::open(dir.join("objects"))
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let oid = store.write_raw(ObjectKind::Blob, b"hello\n").unwrap();
        let raw = store.read(&oid).unwrap();
        assert_eq!(raw.kind, ObjectKind::Blob);
        assert_eq!(raw.payload, b"hello\n");
    }

    #[test]
    fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let oid = ObjectId::from_bytes(&[9u8; 32]).unwrap();
        assert!(!store.contains(&oid));
        assert!(matches!(
            store.read(&oid).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let oid = store.write_raw(ObjectKind::Blob, b"hello\n").unwrap();
        let path = store.object_path(&oid);
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(b"extra");
        fs::write(&path, &data).unwrap();

        assert!(matches!(
            store.read(&oid).unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn missing_separator_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let oid = store.write_raw(ObjectKind::Blob, b"x").unwrap();
        fs::write(store.object_path(&oid), b"blob 1x").unwrap();

        assert!(matches!(
            store.read(&oid).unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn reads_legacy_compressed_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        // A legacy writer stored zlib-compressed framed bytes.
        let framed = b"blob 6\0hello\n";
        let oid = Hasher::digest(framed);
        let path = store.object_path(&oid);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(framed).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let raw = store.read(&oid).unwrap();
        assert_eq!(raw.payload, b"hello\n");
    }

    #[test]
    fn read_verified_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let oid = store.write_raw(ObjectKind::Blob, b"hello\n").unwrap();
        fs::write(store.object_path(&oid), b"blob 6\0HELLO\n").unwrap();

        assert!(store.read(&oid).is_ok());
        assert!(matches!(
            store.read_verified(&oid).unwrap_err(),
            StoreError::DigestMismatch { .. }
        ));
    }

    #[test]
    fn read_object_parses_commit() {
        use bstr::BString;
        use vec_object::Commit;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let commit = Commit {
            tree: ObjectId::from_bytes(&[0xaa; 32]).unwrap(),
            parents: vec![],
            author: "A <a@x>".into(),
            committer: "A <a@x>".into(),
            timestamp: 1_700_000_000,
            message: BString::from("init"),
        };
        let oid = store.write(&Object::Commit(commit.clone())).unwrap();

        match store.read_object(&oid).unwrap() {
            Object::Commit(parsed) => assert_eq!(parsed, commit),
            other => panic!("expected commit, got {other:?}"),
        }
    }
}
