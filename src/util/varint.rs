//! Variable-length integer encoding utilities.
//!
//! 7 bits per byte, least significant group first, high bit set on every
//! byte except the last. Used for row framing in table files and for the
//! offset deltas of posting lists.

use crate::error::{ColstoreError, Result};

/// Longest possible encoding of a u64.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the variable-length encoding of `value` to `out`.
pub fn encode_u64_into(value: u64, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }

    out.len() - start
}

/// Decode a u64 from the front of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 || (shift == 63 && byte > 1) {
            return Err(ColstoreError::codec("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(ColstoreError::codec("Incomplete VarInt"))
}
