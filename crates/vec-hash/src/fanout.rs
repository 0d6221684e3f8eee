use crate::{HashError, ObjectId};

/// Fan-out table mapping first digest byte to cumulative count.
///
/// Each of the 256 entries holds the number of digests whose first byte is
/// ≤ the entry index; entry 255 is the total. Used in pack index files to
/// narrow binary search to a single first-byte bucket.
#[derive(Debug)]
pub struct FanoutTable {
    table: [u32; 256],
}

impl FanoutTable {
    /// Build a fan-out table from a sorted slice of object ids.
    ///
    /// The ids **must** be sorted; this function does not verify order.
    pub fn build(oids: &[ObjectId]) -> Self {
        let mut table = [0u32; 256];
        for oid in oids {
            table[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            table[i] += table[i - 1];
        }
        Self { table }
    }

    /// The index range of digests whose first byte equals `first_byte`.
    pub fn range(&self, first_byte: u8) -> std::ops::Range<usize> {
        let end = self.table[first_byte as usize] as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.table[(first_byte - 1) as usize] as usize
        };
        start..end
    }

    /// Total number of digests tracked.
    pub fn total(&self) -> u32 {
        self.table[255]
    }

    /// Read from binary form: 256 big-endian u32 values.
    pub fn from_bytes(data: &[u8]) -> Result<Self, HashError> {
        if data.len() < 1024 {
            return Err(HashError::InvalidDigestLength {
                expected: 1024,
                actual: data.len(),
            });
        }
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let offset = i * 4;
            *entry = u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]);
        }
        Ok(Self { table })
    }

    /// Serialize to binary form: 256 big-endian u32 values.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1024);
        for count in self.table {
            out.extend_from_slice(&count.to_be_bytes());
        }
        out
    }
}
