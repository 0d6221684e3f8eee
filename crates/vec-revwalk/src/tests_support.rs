//! Shared fixtures for traversal tests: build tiny object graphs on disk.

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::{Commit, EntryKind, Object, Tree, TreeEntry};
use vec_store::LooseStore;

pub fn temp_store() -> (tempfile::TempDir, LooseStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LooseStore::open(dir.path().join("objects"));
    (dir, store)
}

pub fn write_blob(store: &LooseStore, data: &[u8]) -> ObjectId {
    store
        .write(&Object::Blob(vec_object::Blob::new(data.to_vec())))
        .unwrap()
}

pub fn write_tree(store: &LooseStore, entries: &[(&str, ObjectId, EntryKind)]) -> ObjectId {
    let entries = entries
        .iter()
        .map(|(name, oid, kind)| TreeEntry {
            mode: if *kind == EntryKind::Tree { 0o040000 } else { 0o100644 },
            name: BString::from(*name),
            oid: *oid,
            kind: *kind,
        })
        .collect();
    store
        .write(&Object::Tree(Tree::from_entries(entries).unwrap()))
        .unwrap()
}

pub fn write_commit(
    store: &LooseStore,
    tree: ObjectId,
    parents: &[ObjectId],
    timestamp: i64,
) -> ObjectId {
    let commit = Commit {
        tree,
        parents: parents.to_vec(),
        author: "T <t@example>".into(),
        committer: "T <t@example>".into(),
        timestamp,
        message: BString::from(format!("commit at {timestamp}")),
    };
    store.write(&Object::Commit(commit)).unwrap()
}
