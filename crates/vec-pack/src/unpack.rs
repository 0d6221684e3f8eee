//! The unpack pipeline: dissolve a pack into loose objects.
//!
//! Pass one parses and decompresses every entry, persisting full objects
//! through a bounded worker pool. Pass two resolves deltas iteratively:
//! a delta applies once its base is resident (pre-existing in the store or
//! produced by an earlier entry); anything still unresolved when no more
//! progress is possible fails the unpack.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::channel;
use vec_hash::hasher::Hasher;
use vec_hash::ObjectId;
use vec_object::ObjectKind;
use vec_store::{LooseStore, StoreError};

use crate::delta::apply_delta;
use crate::parse::parse_pack;
use crate::{PackEntryKind, PackError};

/// Workers persisting objects during pass one. Store writes are idempotent
/// and content-addressed, so concurrent writers need no coordination.
pub const UNPACK_WORKERS: usize = 10;

/// Outcome of an unpack.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Objects written to the store (full and delta-resolved).
    pub objects_written: usize,
    /// How many of those were reconstructed from deltas.
    pub deltas_resolved: usize,
}

/// Unpack container bytes into the store.
pub fn unpack_into(store: &LooseStore, data: &[u8]) -> Result<UnpackSummary, PackError> {
    let entries = parse_pack(data)?;

    let mut full: Vec<(ObjectId, ObjectKind, Arc<Vec<u8>>)> = Vec::new();
    let mut deltas: Vec<(ObjectId, Vec<u8>)> = Vec::new();

    for entry in entries {
        match entry.kind {
            PackEntryKind::Delta { base } => deltas.push((base, entry.data)),
            _ => {
                let kind = entry.kind.to_object_kind().expect("non-delta entry");
                let expected = entry.expected;
                let payload = Arc::new(entry.data);
                let oid = Hasher::hash_object(kind.as_str(), &payload);
                verify_expected(expected, oid)?;
                full.push((oid, kind, payload));
            }
        }
    }

    write_pool(store, &full)?;

    // Objects from this pack, by identity, for delta base lookup.
    let mut resident: HashMap<ObjectId, (ObjectKind, Arc<Vec<u8>>)> = full
        .iter()
        .map(|(oid, kind, payload)| (*oid, (*kind, Arc::clone(payload))))
        .collect();

    let mut summary = UnpackSummary {
        objects_written: full.len(),
        deltas_resolved: 0,
    };

    // Iterate until a full sweep resolves nothing; deltas whose bases are
    // later deltas in the same pack settle in a subsequent sweep.
    while !deltas.is_empty() {
        let mut unresolved: Vec<(ObjectId, Vec<u8>)> = Vec::new();
        let mut progressed = false;

        for (base_oid, delta_data) in deltas {
            let base = match resident.get(&base_oid) {
                Some((kind, payload)) => Some((*kind, Arc::clone(payload))),
                None => match store.read(&base_oid) {
                    Ok(raw) => Some((raw.kind, Arc::new(raw.payload))),
                    Err(StoreError::NotFound(_)) => None,
                    Err(e) => return Err(e.into()),
                },
            };

            match base {
                Some((kind, base_payload)) => {
                    let target = apply_delta(&base_payload, &delta_data)?;
                    let oid = store.write_raw(kind, &target)?;
                    resident.insert(oid, (kind, Arc::new(target)));
                    summary.objects_written += 1;
                    summary.deltas_resolved += 1;
                    progressed = true;
                }
                None => unresolved.push((base_oid, delta_data)),
            }
        }

        if !progressed {
            return Err(PackError::UnresolvedDelta {
                count: unresolved.len(),
            });
        }
        deltas = unresolved;
    }

    Ok(summary)
}

/// Persist full objects through a bounded pool of writer threads.
fn write_pool(
    store: &LooseStore,
    objects: &[(ObjectId, ObjectKind, Arc<Vec<u8>>)],
) -> Result<(), PackError> {
    if objects.is_empty() {
        return Ok(());
    }

    let (tx, rx) = channel::bounded::<(ObjectKind, Arc<Vec<u8>>)>(UNPACK_WORKERS * 2);
    let workers = UNPACK_WORKERS.min(objects.len());

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            handles.push(scope.spawn(move || -> Result<(), StoreError> {
                for (kind, payload) in rx.iter() {
                    store.write_raw(kind, &payload)?;
                }
                Ok(())
            }));
        }
        drop(rx);

        for (_, kind, payload) in objects {
            if tx.send((*kind, Arc::clone(payload))).is_err() {
                break; // a worker died; its error surfaces below
            }
        }
        drop(tx);

        for handle in handles {
            handle.join().expect("unpack writer panicked")?;
        }
        Ok(())
    })
}

fn verify_expected(expected: Option<ObjectId>, actual: ObjectId) -> Result<(), PackError> {
    if let Some(expected) = expected {
        if expected != actual {
            return Err(PackError::DigestMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }
    Ok(())
}
