use std::fs;
use std::io::Write;

use vec_hash::hasher::Hasher;
use vec_hash::ObjectId;
use vec_object::{header, Object, ObjectKind};
use vec_utils::tempfile::TempFile;

use crate::{LooseStore, StoreError};

impl LooseStore {
    /// Write an object to the store. Returns its id.
    ///
    /// No-op if the object already exists (content-addressed idempotency).
    /// The file is written atomically: temp file in the fan-out directory,
    /// fsync, then rename.
    pub fn write(&self, obj: &Object) -> Result<ObjectId, StoreError> {
        self.write_raw(obj.kind(), &obj.serialize_payload())
    }

    /// Write raw payload bytes with a known kind. Returns the id.
    pub fn write_raw(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, StoreError> {
        let hdr = header::write_header(kind, payload.len());

        let oid = {
            let mut hasher = Hasher::new();
            hasher.update(&hdr);
            hasher.update(payload);
            hasher.finalize()
        };

        // Dedup: an existing file is never rewritten.
        if self.contains(&oid) {
            return Ok(oid);
        }

        let final_path = self.object_path(&oid);
        let parent = final_path
            .parent()
            .expect("loose path always has a fan-out parent");
        fs::create_dir_all(parent)?;

        // TempFile removes itself on any failure before persist.
        let mut tmp = TempFile::new_in(parent).map_err(io_from_util)?;
        tmp.write_all(&hdr)?;
        tmp.write_all(payload)?;

        match tmp.persist(&final_path) {
            Ok(()) => Ok(oid),
            // Another writer finished first; identical content, so done.
            Err(_) if final_path.exists() => Ok(oid),
            Err(e) => Err(io_from_util(e)),
        }
    }
}

fn io_from_util(e: vec_utils::UtilError) -> StoreError {
    match e {
        vec_utils::UtilError::Io(io) => StoreError::Io(io),
        other => StoreError::Io(std::io::Error::other(other.to_string())),
    }
}
