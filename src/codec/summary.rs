//! Summary table row values.
//!
//! A summary value is the row timestamp as a little-endian i64 count of
//! microseconds since the Unix epoch, followed by the NUL-terminated UTF-8
//! summary text.

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};

use crate::error::{ColstoreError, Result};

const TIMESTAMP_LEN: usize = 8;

/// A decoded summary row value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// When the summarized document was recorded.
    pub timestamp: DateTime<Utc>,
    /// The displayable summary text.
    pub text: String,
}

/// Encode a summary value.
pub fn encode_summary(timestamp: &DateTime<Utc>, text: &str) -> Result<Vec<u8>> {
    if text.contains('\0') {
        return Err(ColstoreError::codec("Summary text must not contain NUL"));
    }

    let mut out = vec![0u8; TIMESTAMP_LEN];
    LittleEndian::write_i64(&mut out, timestamp.timestamp_micros());
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    Ok(out)
}

/// Decode a summary value.
pub fn decode_summary(value: &[u8]) -> Result<SummaryRow> {
    if value.len() < TIMESTAMP_LEN + 1 {
        return Err(ColstoreError::codec(format!(
            "Summary value too short ({} bytes)",
            value.len()
        )));
    }

    let micros = LittleEndian::read_i64(&value[..TIMESTAMP_LEN]);
    let timestamp = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| ColstoreError::codec(format!("Timestamp {micros} out of range")))?;

    let body = &value[TIMESTAMP_LEN..];
    let end = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ColstoreError::codec("Summary text is not NUL-terminated"))?;
    let text = std::str::from_utf8(&body[..end])
        .map_err(|e| ColstoreError::codec(format!("Summary text is not UTF-8: {e}")))?
        .to_string();

    Ok(SummaryRow { timestamp, text })
}
