use bstr::{BString, ByteSlice};
use vec_hash::ObjectId;

use crate::codec::{write_lp_bytes, write_u32_le, PayloadReader};
use crate::ObjectError;

/// The kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Blob,
    Tree,
}

impl EntryKind {
    /// Wire tag used in the tree payload.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Blob => 0,
            Self::Tree => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, ObjectError> {
        match tag {
            0 => Ok(Self::Blob),
            1 => Ok(Self::Tree),
            other => Err(ObjectError::InvalidPayload(format!(
                "unknown tree entry kind tag {other}"
            ))),
        }
    }
}

/// A single entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: BString,
    pub oid: ObjectId,
    pub kind: EntryKind,
}

/// A tree object: an ordered directory listing.
///
/// Entries are sorted by name bytes; duplicate names are forbidden. The
/// payload layout is little-endian: `u32 entry_count`, then per entry
/// `u32 mode | lp name | lp digest-hex | u8 kind`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from entries, sorting by name and rejecting duplicates.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Result<Self, ObjectError> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(ObjectError::InvalidTreeEntry {
                    name: pair[0].name.to_str_lossy().into_owned(),
                    reason: "duplicate name".into(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by name.
    pub fn entry(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_slice().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Parse a tree payload.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut r = PayloadReader::new(payload);
        let count = r.read_u32_le()? as usize;

        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let mode = r.read_u32_le()?;
            let name = BString::from(r.read_lp_bytes()?);
            let hex = r.read_lp_bytes()?;
            let hex = std::str::from_utf8(hex).map_err(|_| ObjectError::InvalidTreeEntry {
                name: name.to_str_lossy().into_owned(),
                reason: "non-UTF8 digest".into(),
            })?;
            let oid = ObjectId::from_hex(hex)?;
            let kind = EntryKind::from_tag(r.read_u8()?)?;
            entries.push(TreeEntry {
                mode,
                name,
                oid,
                kind,
            });
        }
        r.expect_end()?;

        // Reject unsorted or duplicate input rather than silently reordering.
        for pair in entries.windows(2) {
            match pair[0].name.cmp(&pair[1].name) {
                std::cmp::Ordering::Less => {}
                std::cmp::Ordering::Equal => {
                    return Err(ObjectError::InvalidTreeEntry {
                        name: pair[0].name.to_str_lossy().into_owned(),
                        reason: "duplicate name".into(),
                    });
                }
                std::cmp::Ordering::Greater => {
                    return Err(ObjectError::InvalidTreeEntry {
                        name: pair[1].name.to_str_lossy().into_owned(),
                        reason: "entries out of order".into(),
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    /// Serialize the tree payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32_le(&mut out, self.entries.len() as u32);
        for entry in &self.entries {
            write_u32_le(&mut out, entry.mode);
            write_lp_bytes(&mut out, &entry.name);
            write_lp_bytes(&mut out, entry.oid.to_hex().as_bytes());
            out.push(entry.kind.tag());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn entry(name: &str, kind: EntryKind, n: u8) -> TreeEntry {
        TreeEntry {
            mode: if kind == EntryKind::Tree { 0o040000 } else { 0o100644 },
            name: BString::from(name),
            oid: oid(n),
            kind,
        }
    }

    #[test]
    fn roundtrip() {
        let tree = Tree::from_entries(vec![
            entry("src", EntryKind::Tree, 2),
            entry("README", EntryKind::Blob, 1),
        ])
        .unwrap();

        let payload = tree.serialize();
        let parsed = Tree::parse(&payload).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn entries_sorted_by_name() {
        let tree = Tree::from_entries(vec![
            entry("zeta", EntryKind::Blob, 1),
            entry("alpha", EntryKind::Blob, 2),
            entry("mid", EntryKind::Tree, 3),
        ])
        .unwrap();

        let names: Vec<_> = tree.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Tree::from_entries(vec![
            entry("same", EntryKind::Blob, 1),
            entry("same", EntryKind::Blob, 2),
        ])
        .unwrap_err();
        assert!(matches!(err, ObjectError::InvalidTreeEntry { .. }));
    }

    #[test]
    fn parse_rejects_out_of_order() {
        // Bypass from_entries to serialize an unsorted listing.
        let reversed = Tree {
            entries: vec![
                entry("b", EntryKind::Blob, 2),
                entry("a", EntryKind::Blob, 1),
            ],
        };
        assert!(Tree::parse(&reversed.serialize()).is_err());
    }

    #[test]
    fn parse_rejects_bad_kind_tag() {
        let tree = Tree::from_entries(vec![entry("f", EntryKind::Blob, 1)]).unwrap();
        let mut payload = tree.serialize();
        *payload.last_mut().unwrap() = 9;
        assert!(Tree::parse(&payload).is_err());
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        let tree = Tree::from_entries(vec![entry("f", EntryKind::Blob, 1)]).unwrap();
        let mut payload = tree.serialize();
        payload.push(0);
        assert!(Tree::parse(&payload).is_err());
    }

    #[test]
    fn lookup_by_name() {
        let tree = Tree::from_entries(vec![
            entry("a", EntryKind::Blob, 1),
            entry("b", EntryKind::Tree, 2),
        ])
        .unwrap();
        assert_eq!(tree.entry(b"b").unwrap().kind, EntryKind::Tree);
        assert!(tree.entry(b"missing").is_none());
    }

    #[test]
    fn empty_tree_roundtrip() {
        let tree = Tree::new();
        let parsed = Tree::parse(&tree.serialize()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn non_utf8_name_roundtrip() {
        let tree = Tree::from_entries(vec![TreeEntry {
            mode: 0o100644,
            name: BString::from(&b"\xff\xfe"[..]),
            oid: oid(1),
            kind: EntryKind::Blob,
        }])
        .unwrap();
        let parsed = Tree::parse(&tree.serialize()).unwrap();
        assert_eq!(parsed, tree);
    }
}
