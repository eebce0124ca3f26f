pub mod error;
pub mod raw;

pub use raw::{HplParser, Rule};

/// Deepest bracket nesting accepted in source text
pub const MAX_NESTING: usize = 256;

/// Deepest expression tree the parser builds, whatever the validator allows
pub const MAX_TREE_DEPTH: usize = 512;

/// Reserved words, never valid as identifiers or channel names
pub const KEYWORDS: &[&str] = &[
    "globally", "after", "until", "some", "not", "no", "causes", "forbids", "requires", "within",
    "as", "and", "or", "implies", "iff", "forall", "exists", "in", "to", "True", "False", "PI",
    "INF", "NAN",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
