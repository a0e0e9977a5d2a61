//! Query string tokenizer.
//!
//! A query is a list of tokens separated by runs of spaces or tabs. Each
//! token has the form `[-][~]term[<op>number]`:
//!
//! - `-` excludes the term's documents from the result
//! - `~` inverts the term's ranking by negating its scores
//! - `<` or `>` followed by a number keeps only postings whose score is below
//!   or above it; the term ends at the operator
//!
//! ```
//! use colstore::query::parser::parse_query;
//! use colstore::query::posting::ScoreOperator;
//!
//! let tokens = parse_query("cat -~dog>0.5");
//! assert_eq!(tokens[0].term, "cat");
//! assert!(tokens[1].exclude && tokens[1].invert);
//! assert_eq!(tokens[1].term, "dog");
//! assert_eq!(tokens[1].filter.unwrap().operator, ScoreOperator::Greater);
//! ```

use crate::query::posting::ScoreOperator;

/// A score comparison attached to a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFilter {
    pub operator: ScoreOperator,
    pub threshold: f32,
}

/// One parsed query token.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryToken {
    /// Exact index key to look up.
    pub term: String,
    /// Subtract this term's postings instead of intersecting them.
    pub exclude: bool,
    /// Negate this term's scores.
    pub invert: bool,
    /// Optional score filter applied before folding.
    pub filter: Option<ScoreFilter>,
}

/// Split a query string into tokens.
pub fn parse_query(query: &str) -> Vec<QueryToken> {
    query
        .split([' ', '\t'])
        .filter(|token| !token.is_empty())
        .map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> QueryToken {
    let (exclude, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (invert, token) = match token.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (term, filter) = match token.find(['<', '>']) {
        Some(pos) => {
            let operator = if token.as_bytes()[pos] == b'<' {
                ScoreOperator::Less
            } else {
                ScoreOperator::Greater
            };
            let filter = ScoreFilter {
                operator,
                threshold: leading_float(&token[pos + 1..]),
            };
            (&token[..pos], Some(filter))
        }
        None => (token, None),
    };

    QueryToken {
        term: term.to_string(),
        exclude,
        invert,
        filter,
    }
}

/// Parse the longest prefix of `s` that is a float, or 0 if none is.
fn leading_float(s: &str) -> f32 {
    s.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find_map(|end| s[..end].parse::<f32>().ok())
        .unwrap_or(0.0)
}
