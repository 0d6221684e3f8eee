use std::collections::{HashSet, VecDeque};

use vec_hash::ObjectId;
use vec_object::{EntryKind, Object};
use vec_store::{LooseStore, ObjectCache, StoreError};

use crate::WalkError;

/// Cache size for tree/commit reads during a walk. Trees repeat heavily
/// across neighboring commits.
const WALK_CACHE_CAPACITY: usize = 4096;

/// Compute the set of all digests reachable from `tip`.
///
/// The closure follows commits → parents and commits → trees → subtrees →
/// blobs. A referenced object that is absent from the store is included in
/// the result but not expanded; mid-transfer stores are allowed to have
/// such holes.
pub fn reachable(store: &LooseStore, tip: ObjectId) -> Result<HashSet<ObjectId>, WalkError> {
    let mut cache = ObjectCache::new(WALK_CACHE_CAPACITY);
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();

    seen.insert(tip);
    queue.push_back(tip);

    while let Some(oid) = queue.pop_front() {
        let obj = match read_cached(store, &mut cache, &oid) {
            Ok(obj) => obj,
            Err(WalkError::Store(StoreError::NotFound(_))) => continue,
            Err(e) => return Err(e),
        };

        match obj {
            Object::Commit(commit) => {
                if seen.insert(commit.tree) {
                    queue.push_back(commit.tree);
                }
                for parent in &commit.parents {
                    if seen.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
            Object::Tree(tree) => {
                for entry in tree.entries() {
                    if seen.insert(entry.oid) && entry.kind == EntryKind::Tree {
                        queue.push_back(entry.oid);
                    }
                }
            }
            Object::Blob(_) => {}
        }
    }

    Ok(seen)
}

/// The objects to transmit for a push: `reach(local) \ reach(remote)`.
///
/// With no remote tip (new branch or empty remote), everything reachable
/// from the local tip is sent.
pub fn objects_to_send(
    store: &LooseStore,
    local_tip: ObjectId,
    remote_tip: Option<ObjectId>,
) -> Result<Vec<ObjectId>, WalkError> {
    let local = reachable(store, local_tip)?;
    let remote = match remote_tip {
        Some(tip) => reachable(store, tip)?,
        None => HashSet::new(),
    };

    let mut missing: Vec<ObjectId> = local.difference(&remote).copied().collect();
    missing.sort();
    Ok(missing)
}

fn read_cached(
    store: &LooseStore,
    cache: &mut ObjectCache,
    oid: &ObjectId,
) -> Result<Object, WalkError> {
    if let Some(obj) = cache.get(oid) {
        return Ok(obj.clone());
    }
    let obj = store.read_object(oid)?;
    // Blobs are leaves; caching them buys nothing.
    if !matches!(obj, Object::Blob(_)) {
        cache.insert(*oid, obj.clone());
    }
    Ok(obj)
}
