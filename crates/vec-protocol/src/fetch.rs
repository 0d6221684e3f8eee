//! Fetch: negotiate missing objects, transfer a pack, update tracking refs.

use std::collections::BTreeMap;
use std::io::Write;

use vec_hash::ObjectId;
use vec_pack::unpack::unpack_into;
use vec_ref::RefName;
use vec_repository::Repository;
use vec_revwalk::is_fast_forward;
use vec_utils::progress::Progress;
use vec_utils::tempfile::TempFile;

use crate::client::HttpClient;
use crate::{util_io, CancelToken, ProtocolError};

/// Options controlling a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Fetch only this branch; all branches when unset.
    pub branch: Option<String>,
    /// Move tracking refs even when the update is not a fast-forward.
    pub force: bool,
    /// Delete tracking refs whose branch vanished from the remote.
    pub prune: bool,
}

/// What a fetch changed.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Tracking refs written, as `(branch, new digest)`.
    pub updated: Vec<(String, ObjectId)>,
    /// Branches skipped because the update was not a fast-forward.
    pub skipped: Vec<String>,
    /// Tracking refs deleted by prune.
    pub pruned: Vec<String>,
    /// Objects unpacked into the store.
    pub objects: usize,
}

/// Fetch from a remote into the repository's tracking refs.
pub fn fetch(
    repo: &Repository,
    client: &HttpClient,
    options: &FetchOptions,
    progress: &mut Progress,
    cancel: &CancelToken,
) -> Result<FetchOutcome, ProtocolError> {
    cancel.check()?;
    let remote_name = client.remote_name().to_string();

    let remote_refs = client.refs()?;
    let wanted_refs: BTreeMap<String, String> = remote_refs
        .iter()
        .filter(|(name, _)| match &options.branch {
            Some(branch) => name.as_str() == branch.as_str(),
            None => true,
        })
        .map(|(name, digest)| (name.clone(), digest.clone()))
        .collect();

    cancel.check()?;

    let refs = repo.refs();
    let store = repo.store();

    let mut have: Vec<String> = Vec::new();
    for (_, oid) in refs.list_branches()? {
        have.push(oid.to_hex());
    }
    for (_, oid) in refs.list_remote_tracking(&remote_name)? {
        have.push(oid.to_hex());
    }
    have.sort();
    have.dedup();

    let want: Vec<String> = wanted_refs.values().cloned().collect();

    let mut outcome = FetchOutcome::default();

    if !want.is_empty() {
        let missing = client.negotiate(&want, &have)?;
        cancel.check()?;

        if missing.is_empty() {
            // Nothing to transfer; ref reconciliation below still runs.
            progress.status("Already up to date.");
        } else {
            progress.status(&format!(
                "Fetching {} objects from {remote_name}",
                missing.len()
            ));
            let pack_bytes = client.fetch_pack(&missing)?;
            cancel.check()?;

            // The pack is staged in a temp file for the duration of the
            // unpack; it dissolves into loose objects and the temp is
            // removed on drop, including on cancellation or error.
            let mut pack_temp = TempFile::new_in(repo.vec_dir()).map_err(util_io)?;
            pack_temp.write_all(&pack_bytes)?;

            let summary = unpack_into(&store, &pack_bytes)?;
            outcome.objects = summary.objects_written;
            progress.status(&format!("Unpacked {} objects", summary.objects_written));
        }
    }

    cancel.check()?;

    // Tracking ref updates, each independent and atomic.
    for (branch, digest_hex) in &wanted_refs {
        let new = ObjectId::from_hex(digest_hex)?;
        let tracking = RefName::remote_tracking(&remote_name, branch)?;

        let old = refs.resolve(&tracking)?;
        let fast_forward = match old {
            None => true,
            Some(old) => old == new || is_fast_forward(&store, old, new)?,
        };

        if fast_forward || options.force {
            if old != Some(new) {
                refs.write(&tracking, &new)?;
                outcome.updated.push((branch.clone(), new));
            }
        } else {
            outcome.skipped.push(branch.clone());
            progress.status(&format!(
                "! {branch} -> {remote_name}/{branch} (non-fast-forward, skipped)"
            ));
        }
    }

    if options.prune {
        for (name, _) in refs.list_remote_tracking(&remote_name)? {
            if !remote_refs.contains_key(&name) {
                refs.delete(&RefName::remote_tracking(&remote_name, &name)?)?;
                outcome.pruned.push(name.clone());
                progress.status(&format!("- [pruned] {remote_name}/{name}"));
            }
        }
    }

    Ok(outcome)
}
