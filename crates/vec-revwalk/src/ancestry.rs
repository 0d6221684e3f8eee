use std::collections::{HashSet, VecDeque};

use vec_hash::ObjectId;
use vec_object::Object;
use vec_store::{LooseStore, StoreError};

use crate::WalkError;

/// Check whether `new` is a fast-forward of `old`.
///
/// True iff a breadth-first walk over parent digests starting at `new`
/// reaches `old`. Commits absent from the store terminate their branch of
/// the walk. The visited set guards against adversarial parent cycles.
pub fn is_fast_forward(
    store: &LooseStore,
    old: ObjectId,
    new: ObjectId,
) -> Result<bool, WalkError> {
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();

    seen.insert(new);
    queue.push_back(new);

    while let Some(oid) = queue.pop_front() {
        if oid == old {
            return Ok(true);
        }
        let commit = match store.read_object(&oid) {
            Ok(Object::Commit(c)) => c,
            // A non-commit in the parent chain cannot lead to `old`.
            Ok(_) => continue,
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        for parent in commit.parents {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }

    Ok(false)
}
