//! Repository discovery, initialization, and layout.
//!
//! A repository is a directory containing `.vec/` with this structure:
//!
//! ```text
//! .vec/
//!   HEAD                       symbolic ref to the current branch
//!   config                     sectioned text configuration
//!   objects/<xx>/<rest>        loose objects
//!   refs/heads/<branch>
//!   refs/tags/<tag>
//!   refs/remotes/<r>/<branch>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use vec_config::Config;
use vec_ref::RefStore;
use vec_store::LooseStore;

/// The branch a fresh repository's HEAD points at.
pub const DEFAULT_BRANCH: &str = "main";

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a vec repository (no .vec directory found from {0})")]
    NotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] vec_config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to an on-disk repository.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    vec_dir: PathBuf,
}

impl Repository {
    /// Initialize a repository at `root`, creating the `.vec/` layout.
    ///
    /// Re-running init on an existing repository is a safe no-op: existing
    /// data is never overwritten.
    pub fn init(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = absolute(root.as_ref())?;
        let vec_dir = root.join(".vec");

        if vec_dir.join("HEAD").is_file() {
            return Ok(Self { root, vec_dir });
        }

        fs::create_dir_all(vec_dir.join("objects"))?;
        fs::create_dir_all(vec_dir.join("refs").join("heads"))?;
        fs::create_dir_all(vec_dir.join("refs").join("tags"))?;
        fs::create_dir_all(vec_dir.join("refs").join("remotes"))?;

        fs::write(
            vec_dir.join("HEAD"),
            format!("ref: refs/heads/{DEFAULT_BRANCH}\n"),
        )?;
        fs::write(vec_dir.join("config"), "")?;

        Ok(Self { root, vec_dir })
    }

    /// Open the repository at `root`, which must contain `.vec/`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = absolute(root.as_ref())?;
        let vec_dir = root.join(".vec");
        if !vec_dir.is_dir() {
            return Err(RepoError::NotFound(root));
        }
        Ok(Self { root, vec_dir })
    }

    /// Discover a repository by walking up from `start`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        let start = absolute(start.as_ref())?;
        let mut current = start.clone();
        loop {
            if current.join(".vec").is_dir() {
                return Self::open(&current);
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(RepoError::NotFound(start)),
            }
        }
    }

    /// The working directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.vec/` directory.
    pub fn vec_dir(&self) -> &Path {
        &self.vec_dir
    }

    /// The loose object store.
    pub fn store(&self) -> LooseStore {
        LooseStore::open(self.vec_dir.join("objects"))
    }

    /// The ref store.
    pub fn refs(&self) -> RefStore {
        RefStore::open(&self.vec_dir)
    }

    /// Load the repository configuration.
    pub fn config(&self) -> Result<Config, RepoError> {
        Ok(Config::load(self.vec_dir.join("config"))?)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, std::io::Error> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
