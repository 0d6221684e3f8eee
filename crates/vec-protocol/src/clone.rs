//! Clone: bootstrap a repository and run an initial fetch.

use std::path::Path;

use vec_config::{CredentialProvider, Remote};
use vec_ref::RefName;
use vec_repository::Repository;
use vec_utils::progress::Progress;

use crate::client::HttpClient;
use crate::fetch::{fetch, FetchOptions};
use crate::{CancelToken, ProtocolError};

/// Options controlling a clone.
pub struct CloneOptions {
    /// Branch to check out; default selection applies when unset.
    pub branch: Option<String>,
    /// Name for the new remote.
    pub remote_name: String,
    /// Credential lookup for the new remote.
    pub creds: CredentialProvider,
}

impl CloneOptions {
    pub fn new(creds: CredentialProvider) -> Self {
        Self {
            branch: None,
            remote_name: "origin".to_string(),
            creds,
        }
    }
}

/// What a clone produced.
pub struct CloneOutcome {
    pub repo: Repository,
    /// The branch HEAD points at, when the remote had any branches.
    pub default_branch: Option<String>,
    /// All branches created locally.
    pub branches: Vec<String>,
    /// Objects unpacked into the fresh store.
    pub objects: usize,
}

/// Clone a remote repository into `dest`.
///
/// Bootstraps the `.vec/` layout, records the remote in the config, fetches
/// every branch, then creates both `refs/heads/<branch>` and
/// `refs/remotes/<remote>/<branch>` for each. The default branch is the
/// requested one, else `main`, else `master`, else the first enumerated
/// head.
pub fn clone(
    url: &str,
    dest: &Path,
    options: CloneOptions,
    progress: &mut Progress,
    cancel: &CancelToken,
) -> Result<CloneOutcome, ProtocolError> {
    cancel.check()?;

    let repo = Repository::init(dest)?;

    let remote = Remote {
        name: options.remote_name.clone(),
        url: url.to_string(),
        token: None,
        headers: Vec::new(),
    };
    let mut config = repo.config()?;
    config.set_remote(&remote);
    config.save()?;

    let client = HttpClient::for_remote(&remote, options.creds)?;
    progress.status(&format!("Cloning into '{}'...", dest.display()));

    let fetch_outcome = fetch(&repo, &client, &FetchOptions::default(), progress, cancel)?;

    // Mirror every tracking ref as a local branch.
    let refs = repo.refs();
    let mut branches = Vec::new();
    for (branch, oid) in refs.list_remote_tracking(&options.remote_name)? {
        refs.write(&RefName::branch(&branch)?, &oid)?;
        branches.push(branch);
    }

    let default_branch = select_default_branch(options.branch.as_deref(), &branches);
    if let Some(ref branch) = default_branch {
        refs.write_symbolic(&RefName::new("HEAD")?, &RefName::branch(branch)?)?;
        progress.status(&format!("Checked out '{branch}'"));
    }

    Ok(CloneOutcome {
        repo,
        default_branch,
        branches,
        objects: fetch_outcome.objects,
    })
}

fn select_default_branch(requested: Option<&str>, branches: &[String]) -> Option<String> {
    if let Some(requested) = requested {
        return Some(requested.to_string());
    }
    for candidate in ["main", "master"] {
        if branches.iter().any(|b| b == candidate) {
            return Some(candidate.to_string());
        }
    }
    branches.first().cloned()
}
