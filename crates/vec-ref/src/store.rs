use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use vec_hash::ObjectId;
use vec_utils::lockfile::LockFile;
use vec_utils::{LockError, UtilError};

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

/// Maximum symbolic ref chain length before declaring a loop.
const MAX_SYMREF_DEPTH: usize = 10;

/// File-backed ref storage under a repository's `.vec/` directory.
pub struct RefStore {
    vec_dir: PathBuf,
}

impl RefStore {
    /// Open the ref store rooted at the given `.vec/` directory.
    pub fn open(vec_dir: impl AsRef<Path>) -> Self {
        Self {
            vec_dir: vec_dir.as_ref().to_path_buf(),
        }
    }

    fn ref_path(&self, name: &RefName) -> PathBuf {
        self.vec_dir.join(name.as_str())
    }

    /// Read a single ref. Returns `None` if the file does not exist.
    pub fn read(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        let path = self.ref_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RefError::IoPath { path, source: e }),
        };

        let trimmed = contents.trim();
        if let Some(target) = trimmed.strip_prefix("ref: ") {
            Ok(Some(Reference::Symbolic {
                name: name.clone(),
                target: RefName::new(target.trim())?,
            }))
        } else {
            let oid = ObjectId::from_hex(trimmed)
                .map_err(|e| RefError::Parse(format!("ref '{name}': {e}")))?;
            Ok(Some(Reference::Direct {
                name: name.clone(),
                target: oid,
            }))
        }
    }

    /// Resolve a ref to a digest, following symbolic chains.
    ///
    /// Returns `None` if the ref (or the end of its chain) does not exist.
    pub fn resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let mut current = name.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                None => return Ok(None),
                Some(Reference::Direct { target, .. }) => return Ok(Some(target)),
                Some(Reference::Symbolic { target, .. }) => current = target,
            }
        }
        Err(RefError::SymrefLoop(name.to_string()))
    }

    /// Read HEAD.
    pub fn head(&self) -> Result<Option<Reference>, RefError> {
        self.read(&RefName::new("HEAD")?)
    }

    /// The branch HEAD points at, if HEAD is symbolic to `refs/heads/`.
    pub fn current_branch(&self) -> Result<Option<String>, RefError> {
        match self.head()? {
            Some(Reference::Symbolic { target, .. }) if target.is_branch() => {
                Ok(Some(target.short_name().to_string()))
            }
            _ => Ok(None),
        }
    }

    /// Atomically set a ref to a digest.
    pub fn write(&self, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
        self.write_contents(name, format!("{}\n", oid.to_hex()).as_bytes())
    }

    /// Atomically set a symbolic ref.
    pub fn write_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        self.write_contents(name, format!("ref: {target}\n").as_bytes())
    }

    fn write_contents(&self, name: &RefName, contents: &[u8]) -> Result<(), RefError> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut lock = LockFile::acquire(&path).map_err(|e| lock_err(name, e))?;
        lock.write_all(contents).map_err(|e| RefError::IoPath {
            path: path.clone(),
            source: e,
        })?;
        lock.commit().map_err(|e| lock_err(name, e))?;
        Ok(())
    }

    /// Delete a ref and prune any empty parent directories under `refs/`.
    pub fn delete(&self, name: &RefName) -> Result<(), RefError> {
        let path = self.ref_path(name);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;

            let refs_dir = self.vec_dir.join("refs");
            let mut dir = path.parent().map(|p| p.to_path_buf());
            while let Some(d) = dir {
                if d == refs_dir || d == self.vec_dir {
                    break;
                }
                if d.read_dir().map(|mut e| e.next().is_none()).unwrap_or(false) {
                    let _ = fs::remove_dir(&d);
                    dir = d.parent().map(|p| p.to_path_buf());
                } else {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Enumerate branches: `(short name, digest)` pairs, sorted by name.
    ///
    /// Names are slash-joined paths relative to `refs/heads/`.
    pub fn list_branches(&self) -> Result<Vec<(String, ObjectId)>, RefError> {
        self.list_under("refs/heads")
    }

    /// Enumerate remote-tracking refs for one remote, sorted by name.
    ///
    /// Names are relative to `refs/remotes/<remote>/`.
    pub fn list_remote_tracking(&self, remote: &str) -> Result<Vec<(String, ObjectId)>, RefError> {
        self.list_under(&format!("refs/remotes/{remote}"))
    }

    fn list_under(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>, RefError> {
        let root = self.vec_dir.join(prefix);
        let mut out = Vec::new();
        if root.is_dir() {
            collect_refs(&root, String::new(), &mut out)?;
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

fn collect_refs(
    dir: &Path,
    rel: String,
    out: &mut Vec<(String, ObjectId)>,
) -> Result<(), RefError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.ends_with(".lock") {
            continue;
        }
        let child_rel = if rel.is_empty() {
            file_name.to_string()
        } else {
            format!("{rel}/{file_name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_refs(&entry.path(), child_rel, out)?;
        } else {
            let contents = fs::read_to_string(entry.path())?;
            let trimmed = contents.trim();
            // Symbolic refs under refs/ are not expected; skip anything that
            // does not parse as a digest rather than failing enumeration.
            if let Ok(oid) = ObjectId::from_hex(trimmed) {
                out.push((child_rel, oid));
            }
        }
    }
    Ok(())
}

fn lock_err(name: &RefName, e: UtilError) -> RefError {
    match e {
        UtilError::Lock(LockError::AlreadyLocked { .. }) => RefError::Conflict(name.to_string()),
        UtilError::Io(io) => RefError::Io(io),
        other => RefError::Io(std::io::Error::other(other.to_string())),
    }
}
