//! Ranked retrieval over an inverted index.
//!
//! A query string is tokenized ([`parser`]), each term's posting list is
//! read from the index table and folded with the posting algebra
//! ([`posting`]), and the ranked offsets are resolved against the summary
//! table ([`processor`]).

pub mod parser;
pub mod posting;
pub mod processor;

pub use parser::{QueryToken, ScoreFilter, parse_query};
pub use posting::{OffsetScore, PostingList, ScoreOperator};
pub use processor::{execute_query, rank_offsets};
