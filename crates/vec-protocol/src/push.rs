//! Push: fast-forward safety check, pack construction, upload, ref update.

use std::io::Write;

use vec_hash::ObjectId;
use vec_object::ObjectKind;
use vec_pack::write::build_pack;
use vec_ref::RefName;
use vec_repository::Repository;
use vec_revwalk::{is_fast_forward, objects_to_send};
use vec_utils::progress::Progress;
use vec_utils::tempfile::TempFile;

use crate::client::HttpClient;
use crate::types::PushMeta;
use crate::{util_io, CancelToken, ProtocolError};

/// Options controlling a push.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Allow non-fast-forward updates.
    pub force: bool,
    /// Skip delta compression when building the pack.
    pub no_deltas: bool,
}

/// What a push did.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Local and remote tips already matched.
    UpToDate,
    /// The pack was accepted and the tracking ref updated.
    Pushed {
        objects: usize,
        new_tip: ObjectId,
    },
}

/// Push a branch to the remote.
///
/// The fast-forward check runs before any request reaches the push
/// endpoint: a rejected push costs one refs round-trip, nothing more.
pub fn push(
    repo: &Repository,
    client: &HttpClient,
    branch: &str,
    options: &PushOptions,
    progress: &mut Progress,
    cancel: &CancelToken,
) -> Result<PushOutcome, ProtocolError> {
    cancel.check()?;
    let remote_name = client.remote_name().to_string();

    let refs = repo.refs();
    let store = repo.store();

    let branch_ref = RefName::branch(branch)?;
    let local_tip = refs
        .resolve(&branch_ref)?
        .ok_or_else(|| ProtocolError::NotFound(format!("branch '{branch}'")))?;

    // A missing refs endpoint or unborn remote means the branch is new.
    let remote_refs = match client.refs() {
        Ok(map) => map,
        Err(ProtocolError::NotFound(_)) => Default::default(),
        Err(e) => return Err(e),
    };
    let remote_tip = match remote_refs.get(branch) {
        Some(hex) => Some(ObjectId::from_hex(hex)?),
        None => None,
    };

    if remote_tip == Some(local_tip) {
        progress.status("Everything up to date.");
        return Ok(PushOutcome::UpToDate);
    }

    if let Some(remote_tip) = remote_tip {
        if !options.force && !is_fast_forward(&store, remote_tip, local_tip)? {
            return Err(ProtocolError::NonFastForward);
        }
    }

    cancel.check()?;

    let to_send = objects_to_send(&store, local_tip, remote_tip)?;
    progress.status(&format!("Counting objects: {}", to_send.len()));

    let mut objects: Vec<(ObjectId, ObjectKind, Vec<u8>)> = Vec::with_capacity(to_send.len());
    for oid in &to_send {
        let raw = store.read(oid)?;
        objects.push((*oid, raw.kind, raw.payload));
    }

    let pack = build_pack(&objects, !options.no_deltas)?;
    progress.status(&format!(
        "Writing pack: {} objects, {} bytes",
        objects.len(),
        pack.bytes.len()
    ));

    // Stage the pack on disk for the duration of the upload; the temp file
    // is removed on drop, including on cancellation or transport failure.
    let mut pack_temp = TempFile::new_in(repo.vec_dir()).map_err(util_io)?;
    pack_temp.write_all(&pack.bytes)?;

    cancel.check()?;

    let meta = PushMeta {
        branch: branch.to_string(),
        old_commit: remote_tip.map(|oid| oid.to_hex()).unwrap_or_default(),
        new_commit: local_tip.to_hex(),
        force: options.force,
    };

    let result = client.push(&meta, &pack.bytes)?;
    if !result.success {
        let message = result
            .message
            .or_else(|| result.errors.and_then(|e| e.into_iter().next()))
            .unwrap_or_else(|| "server gave no reason".to_string());
        return Err(ProtocolError::Rejected(message));
    }

    // The remote accepted the new tip; mirror it in the tracking ref.
    let tracking = RefName::remote_tracking(&remote_name, branch)?;
    refs.write(&tracking, &local_tip)?;
    progress.status(&format!("To {remote_name}: {branch} -> {}", &local_tip.to_hex()[..8]));

    Ok(PushOutcome::Pushed {
        objects: objects.len(),
        new_tip: local_tip,
    })
}
