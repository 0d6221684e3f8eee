use std::fs;
use std::path::PathBuf;

use vec_hash::ObjectId;

use crate::{LooseStore, StoreError};

/// Iterator over every object id in the loose store.
///
/// Walks the two-hex fan-out directories in sorted order and yields each
/// valid id found. Files whose names do not form a valid digest are skipped.
pub struct LooseIter {
    dirs: Vec<PathBuf>,
    pending: Vec<ObjectId>,
}

impl LooseStore {
    /// Iterate over all objects in the store.
    pub fn iter(&self) -> Result<LooseIter, StoreError> {
        let mut dirs = Vec::new();
        if self.objects_dir().is_dir() {
            for entry in fs::read_dir(self.objects_dir())? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.len() == 2
                    && name.chars().all(|c| c.is_ascii_hexdigit())
                    && entry.file_type()?.is_dir()
                {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.sort();
        dirs.reverse(); // popped from the back

        Ok(LooseIter {
            dirs,
            pending: Vec::new(),
        })
    }
}

impl LooseIter {
    fn fill_from_next_dir(&mut self) {
        while self.pending.is_empty() {
            let Some(dir) = self.dirs.pop() else { return };

            let prefix = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let Ok(entries) = fs::read_dir(&dir) else { continue };
            let mut oids: Vec<ObjectId> = entries
                .flatten()
                .filter_map(|e| {
                    let rest = e.file_name().to_string_lossy().to_lowercase();
                    ObjectId::from_hex(&format!("{prefix}{rest}")).ok()
                })
                .collect();
            oids.sort();
            oids.reverse();
            self.pending = oids;
        }
    }
}

impl Iterator for LooseIter {
    type Item = ObjectId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() {
            self.fill_from_next_dir();
        }
        self.pending.pop()
    }
}
