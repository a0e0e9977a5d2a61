//! Binary encodings of column payloads.
//!
//! - [`offset_score`]: OFFSET_SCORE_LIST payloads stored in index tables
//! - [`summary`]: TIMESTAMP WITH TIME ZONE + TEXT values stored in summary
//!   tables

pub mod offset_score;
pub mod summary;

pub use offset_score::{decode_offset_scores, encode_offset_scores};
pub use summary::{SummaryRow, decode_summary, encode_summary};
