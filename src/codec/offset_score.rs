//! OFFSET_SCORE_LIST payloads.
//!
//! Layout: varint posting count, then for each posting the varint delta from
//! the previous offset (the first delta is from zero) followed by the score
//! as a little-endian f32. Deltas are unsigned, so decoded lists are always
//! sorted ascending by offset.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{ColstoreError, Result};
use crate::query::posting::{OffsetScore, PostingList};
use crate::util::varint::{decode_u64, encode_u64_into};

/// Smallest encoded size of one posting: 1-byte delta + 4-byte score.
const MIN_POSTING_LEN: usize = 5;

/// Encode postings sorted ascending by offset.
pub fn encode_offset_scores(postings: &[OffsetScore]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(postings.len() * 6 + 2);
    encode_u64_into(postings.len() as u64, &mut out);

    let mut previous = 0u64;
    for posting in postings {
        let delta = posting.offset.checked_sub(previous).ok_or_else(|| {
            ColstoreError::codec(format!(
                "Posting offsets must be ascending ({} after {previous})",
                posting.offset
            ))
        })?;

        encode_u64_into(delta, &mut out);
        out.write_f32::<LittleEndian>(posting.score)?;
        previous = posting.offset;
    }

    Ok(out)
}

/// Decode a payload into a posting list.
pub fn decode_offset_scores(payload: &[u8]) -> Result<PostingList> {
    let (count, mut pos) = decode_u64(payload)?;

    let remaining = payload.len() - pos;
    if count > (remaining / MIN_POSTING_LEN) as u64 {
        return Err(ColstoreError::codec(format!(
            "Posting count {count} does not fit in {remaining} bytes"
        )));
    }

    let mut postings = Vec::with_capacity(count as usize);
    let mut offset = 0u64;

    for _ in 0..count {
        let (delta, used) = decode_u64(&payload[pos..])?;
        pos += used;

        offset = offset
            .checked_add(delta)
            .ok_or_else(|| ColstoreError::codec("Posting offset overflow"))?;

        let score_bytes = payload
            .get(pos..pos + 4)
            .ok_or_else(|| ColstoreError::codec("Truncated posting score"))?;
        pos += 4;

        postings.push(OffsetScore::new(offset, LittleEndian::read_f32(score_bytes)));
    }

    if pos != payload.len() {
        return Err(ColstoreError::codec(format!(
            "{} trailing bytes after posting list",
            payload.len() - pos
        )));
    }

    Ok(PostingList::from_sorted(postings))
}
