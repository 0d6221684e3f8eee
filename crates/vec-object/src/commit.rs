use bstr::BString;
use vec_hash::{ObjectId, DIGEST_HEX_LEN};

use crate::codec::{write_i64_le, write_lp_bytes, write_u32_le, PayloadReader};
use crate::ObjectError;

/// A commit object.
///
/// The payload layout is little-endian:
///
/// ```text
/// u32 tree_len | tree_hex_bytes
/// u32 parent_count | { u32 len | hex_bytes } × parent_count
/// u32 author_len | author_bytes
/// u32 committer_len | committer_bytes
/// i64 timestamp_unix
/// u32 message_len | message_bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Digest of the root tree.
    pub tree: ObjectId,
    /// Parent commit digests. Order is significant; the first parent is the
    /// mainline.
    pub parents: Vec<ObjectId>,
    /// Author identity string, e.g. `"A <a@x>"`.
    pub author: String,
    /// Committer identity string.
    pub committer: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Commit message.
    pub message: BString,
}

impl Commit {
    /// Parse a commit payload.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut r = PayloadReader::new(payload);

        let tree = read_hex_oid(&mut r, "tree")?;

        let parent_count = r.read_u32_le()? as usize;
        let mut parents = Vec::with_capacity(parent_count.min(64));
        for _ in 0..parent_count {
            parents.push(read_hex_oid(&mut r, "parent")?);
        }

        let author = read_utf8(&mut r, "author")?;
        let committer = read_utf8(&mut r, "committer")?;
        let timestamp = r.read_i64_le()?;
        let message = BString::from(r.read_lp_bytes()?);
        r.expect_end()?;

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            timestamp,
            message,
        })
    }

    /// Serialize the commit payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_lp_bytes(&mut out, self.tree.to_hex().as_bytes());
        write_u32_le(&mut out, self.parents.len() as u32);
        for parent in &self.parents {
            write_lp_bytes(&mut out, parent.to_hex().as_bytes());
        }
        write_lp_bytes(&mut out, self.author.as_bytes());
        write_lp_bytes(&mut out, self.committer.as_bytes());
        write_i64_le(&mut out, self.timestamp);
        write_lp_bytes(&mut out, &self.message);
        out
    }

    /// The digest of the framed form `commit <len>\0<payload>`.
    pub fn id(&self) -> ObjectId {
        vec_hash::hasher::Hasher::hash_object("commit", &self.serialize())
    }
}

fn read_hex_oid(r: &mut PayloadReader<'_>, field: &str) -> Result<ObjectId, ObjectError> {
    let hex = r.read_lp_bytes()?;
    if hex.len() != DIGEST_HEX_LEN {
        return Err(ObjectError::InvalidPayload(format!(
            "{field} digest has length {}, expected {DIGEST_HEX_LEN}",
            hex.len()
        )));
    }
    let hex = std::str::from_utf8(hex)
        .map_err(|_| ObjectError::InvalidPayload(format!("non-UTF8 {field} digest")))?;
    Ok(ObjectId::from_hex(hex)?)
}

fn read_utf8(r: &mut PayloadReader<'_>, field: &str) -> Result<String, ObjectError> {
    let bytes = r.read_lp_bytes()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ObjectError::InvalidPayload(format!("non-UTF8 {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_oid(fill: u8) -> ObjectId {
        ObjectId::from_bytes(&[fill; 32]).unwrap()
    }

    fn sample_commit() -> Commit {
        Commit {
            tree: sample_oid(0xaa),
            parents: vec![],
            author: "A <a@x>".into(),
            committer: "A <a@x>".into(),
            timestamp: 1_700_000_000,
            message: BString::from("init"),
        }
    }

    #[test]
    fn roundtrip() {
        let commit = sample_commit();
        let parsed = Commit::parse(&commit.serialize()).unwrap();
        assert_eq!(parsed, commit);
    }

    #[test]
    fn roundtrip_with_parents() {
        let mut commit = sample_commit();
        commit.parents = vec![sample_oid(0x01), sample_oid(0x02)];
        let parsed = Commit::parse(&commit.serialize()).unwrap();
        assert_eq!(parsed.parents, commit.parents);
    }

    #[test]
    fn serialization_is_deterministic() {
        // Two independently constructed but equal commits must serialize to
        // byte-identical payloads and hash to the same digest.
        let a = sample_commit();
        let b = sample_commit();
        assert_eq!(a.serialize(), b.serialize());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn payload_layout_is_little_endian() {
        let commit = sample_commit();
        let payload = commit.serialize();

        // First field: u32 length (64) of the tree hex, little-endian.
        assert_eq!(&payload[..4], &64u32.to_le_bytes());
        assert_eq!(&payload[4..68], commit.tree.to_hex().as_bytes());
        // Then a zero parent count.
        assert_eq!(&payload[68..72], &0u32.to_le_bytes());
    }

    #[test]
    fn timestamp_sits_between_committer_and_message() {
        let commit = sample_commit();
        let payload = commit.serialize();

        // 4+64 tree, 4 parent count, 4+7 author, 4+7 committer.
        let ts_offset = 4 + 64 + 4 + 4 + 7 + 4 + 7;
        assert_eq!(
            &payload[ts_offset..ts_offset + 8],
            &1_700_000_000i64.to_le_bytes()
        );
    }

    #[test]
    fn parent_order_is_preserved() {
        let mut commit = sample_commit();
        commit.parents = vec![sample_oid(0x02), sample_oid(0x01)];
        let parsed = Commit::parse(&commit.serialize()).unwrap();
        assert_eq!(parsed.parents[0], sample_oid(0x02));
        assert_eq!(parsed.parents[1], sample_oid(0x01));
    }

    #[test]
    fn truncated_payload_rejected() {
        let commit = sample_commit();
        let payload = commit.serialize();
        assert!(Commit::parse(&payload[..payload.len() - 1]).is_err());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let commit = sample_commit();
        let mut payload = commit.serialize();
        payload.push(0);
        assert!(Commit::parse(&payload).is_err());
    }

    #[test]
    fn wrong_digest_width_rejected() {
        let mut payload = Vec::new();
        crate::codec::write_lp_bytes(&mut payload, b"abcd"); // too short for a digest
        assert!(Commit::parse(&payload).is_err());
    }

    #[test]
    fn non_utf8_message_preserved() {
        let mut commit = sample_commit();
        commit.message = BString::from(&b"\xf0\x28\x8c\x28"[..]);
        let parsed = Commit::parse(&commit.serialize()).unwrap();
        assert_eq!(parsed.message, commit.message);
    }
}
