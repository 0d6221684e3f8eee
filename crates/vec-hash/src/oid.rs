use std::fmt;
use std::str::FromStr;

use crate::hex::{hex_decode, hex_to_string};
use crate::{HashError, DIGEST_HEX_LEN, DIGEST_LEN};

/// An object identifier: the SHA-256 digest of an object's framed bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_LEN]);

impl ObjectId {
    /// Create an ObjectId from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != DIGEST_LEN {
            return Err(HashError::InvalidDigestLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Create an ObjectId from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != DIGEST_HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: DIGEST_HEX_LEN,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex_decode(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// The lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex_to_string(&self.0)
    }

    /// The first byte of the digest (for fan-out table indexing).
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// The loose-object path component: `"xx/xxxx…"`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_HEX: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn from_hex_and_back() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        assert_eq!(oid.to_hex(), SAMPLE_HEX);
        assert_eq!(oid.as_bytes().len(), 32);
    }

    #[test]
    fn display_roundtrip() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        let displayed = oid.to_string();
        assert_eq!(displayed, SAMPLE_HEX);
        let parsed: ObjectId = displayed.parse().unwrap();
        assert_eq!(parsed, oid);
    }

    #[test]
    fn debug_shows_short_digest() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        assert_eq!(format!("{:?}", oid), "ObjectId(e3b0c442)");
    }

    #[test]
    fn ordering() {
        let a = ObjectId::from_hex(&format!("{:0>64}", "1")).unwrap();
        let b = ObjectId::from_hex(&format!("{:0>64}", "2")).unwrap();
        assert!(a < b);
    }

    #[test]
    fn hashmap_key() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        let mut map = HashMap::new();
        map.insert(oid, "value");
        assert_eq!(map.get(&oid), Some(&"value"));
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = ObjectId::from_bytes(&[0; 20]).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidDigestLength {
                expected: 32,
                actual: 20
            }
        ));
    }

    #[test]
    fn rejects_short_hex() {
        let err = ObjectId::from_hex("abcd").unwrap_err();
        assert!(matches!(err, HashError::InvalidHexLength { .. }));
    }

    #[test]
    fn rejects_forty_hex() {
        // A SHA-1-width digest must never be accepted.
        let err = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidHexLength {
                expected: 64,
                actual: 40
            }
        ));
    }

    #[test]
    fn loose_path_splits_after_two() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        assert_eq!(oid.loose_path(), format!("e3/{}", &SAMPLE_HEX[2..]));
    }

    #[test]
    fn first_byte() {
        let oid = ObjectId::from_hex(SAMPLE_HEX).unwrap();
        assert_eq!(oid.first_byte(), 0xe3);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bytes_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
                let oid = ObjectId::from_bytes(&bytes).unwrap();
                let reparsed = ObjectId::from_hex(&oid.to_hex()).unwrap();
                prop_assert_eq!(oid, reparsed);
                prop_assert_eq!(reparsed.as_bytes(), &bytes);
            }

            #[test]
            fn ordering_matches_byte_ordering(
                a in prop::array::uniform32(any::<u8>()),
                b in prop::array::uniform32(any::<u8>()),
            ) {
                let oa = ObjectId::from_bytes(&a).unwrap();
                let ob = ObjectId::from_bytes(&b).unwrap();
                prop_assert_eq!(oa.cmp(&ob), a.cmp(&b));
            }
        }
    }
}
