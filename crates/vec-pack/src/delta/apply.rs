//! Apply a delta instruction stream to reconstruct a target object.

use super::{read_varint, COPY_DEFAULT_SIZE};
use crate::PackError;

/// Apply `delta` to `base`, producing the target bytes.
///
/// The stream starts with varint source and target sizes. The declared
/// source size must match the base length; the produced output must match
/// the declared target size exactly. Every copy is bounds-checked against
/// the base, and opcode zero is rejected as corrupt.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut pos = 0;

    let (source_size, consumed) =
        read_varint(&delta[pos..]).ok_or_else(|| PackError::InvalidDelta {
            offset: 0,
            reason: "truncated source size".into(),
        })?;
    pos += consumed;

    let (target_size, consumed) =
        read_varint(&delta[pos..]).ok_or_else(|| PackError::InvalidDelta {
            offset: pos as u64,
            reason: "truncated target size".into(),
        })?;
    pos += consumed;

    if source_size != base.len() {
        return Err(PackError::InvalidDelta {
            offset: 0,
            reason: format!(
                "source size mismatch: delta says {source_size}, base is {}",
                base.len()
            ),
        });
    }

    let mut output = Vec::with_capacity(target_size);

    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;

        if cmd & 0x80 != 0 {
            // Copy from base. Bits 0–3 select offset bytes, 4–6 size bytes.
            let mut offset: usize = 0;
            let mut size: usize = 0;

            for i in 0..4 {
                if cmd & (1 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| PackError::InvalidDelta {
                        offset: pos as u64,
                        reason: "truncated copy offset".into(),
                    })?;
                    offset |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if cmd & (0x10 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| PackError::InvalidDelta {
                        offset: pos as u64,
                        reason: "truncated copy size".into(),
                    })?;
                    size |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }

            if size == 0 {
                size = COPY_DEFAULT_SIZE;
            }

            if offset + size > base.len() {
                return Err(PackError::InvalidDelta {
                    offset: pos as u64,
                    reason: format!(
                        "copy out of bounds: offset={offset}, size={size}, base_len={}",
                        base.len()
                    ),
                });
            }

            output.extend_from_slice(&base[offset..offset + size]);
        } else if cmd != 0 {
            // Insert literal bytes; the low seven bits give the length.
            let n = cmd as usize;
            if pos + n > delta.len() {
                return Err(PackError::InvalidDelta {
                    offset: pos as u64,
                    reason: "truncated insert data".into(),
                });
            }
            output.extend_from_slice(&delta[pos..pos + n]);
            pos += n;
        } else {
            return Err(PackError::InvalidDelta {
                offset: (pos - 1) as u64,
                reason: "reserved delta opcode 0".into(),
            });
        }
    }

    if output.len() != target_size {
        return Err(PackError::InvalidDelta {
            offset: 0,
            reason: format!(
                "target size mismatch: delta says {target_size}, got {}",
                output.len()
            ),
        });
    }

    Ok(output)
}
