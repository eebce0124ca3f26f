use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::types::{DataType, TypeClass};

/// Every problem the front end can report about an HPL property
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, PartialEq, Diagnostic, Error)]
pub enum HplError {
    // Syntax errors from pest
    #[error("Syntax error at line {line}, column {col}")]
    #[diagnostic(code(hpl::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{expected_msg}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        expected_msg: String,
        line: usize,
        col: usize,
    },

    #[error("Invalid escape sequence '{sequence}'")]
    #[diagnostic(
        code(hpl::invalid_escape),
        help("Valid escape sequences: \\n, \\t, \\\\, \\\"")
    )]
    InvalidEscape {
        sequence: String,
        #[label("invalid escape")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Metadata key '{key}' is given more than once")]
    #[diagnostic(code(hpl::duplicate_metadata))]
    DuplicateMetadata {
        key: String,
        #[label("repeated here")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    // Type errors
    #[error("Expected {expected}, found {found}: {expr}")]
    #[diagnostic(code(hpl::type_mismatch))]
    TypeMismatch {
        expected: String,
        found: DataType,
        expr: String,
    },

    #[error("Unknown function: '{name}'")]
    #[diagnostic(code(hpl::unknown_function))]
    UnknownFunction {
        name: String,
        #[help]
        suggestions: Option<String>,
    },

    #[error("Function '{function}' expects a {expected} argument, found {found}: {expr}")]
    #[diagnostic(code(hpl::function_signature))]
    ArityOrTypeMismatch {
        function: String,
        expected: TypeClass,
        found: DataType,
        expr: String,
    },

    #[error("Invalid range bounds in {expr}: {reason}")]
    #[diagnostic(code(hpl::range_bounds))]
    InvalidRangeBounds { expr: String, reason: String },

    #[error("Variable '{name}' is already bound by an enclosing quantifier: {expr}")]
    #[diagnostic(
        code(hpl::duplicate_bound_variable),
        help("Rename the inner variable")
    )]
    DuplicateBoundVariable { name: String, expr: String },

    #[error("Quantified variable '{name}' is never used in its body: {expr}")]
    #[diagnostic(
        code(hpl::unused_bound_variable),
        help("Refer to the variable as @{name} inside the quantifier body")
    )]
    UnusedBoundVariable { name: String, expr: String },

    #[error("Expression nesting depth {depth} exceeds the limit of {limit}")]
    #[diagnostic(code(hpl::too_deep))]
    ExpressionTooDeep { depth: usize, limit: usize },

    // Reference errors
    #[error("Unknown reference: '@{name}'")]
    #[diagnostic(code(hpl::unknown_reference))]
    UnknownReference {
        name: String,
        #[help]
        help: Option<String>,
    },

    #[error("Event on '{channel}' refers to its own alias '@{alias}'")]
    #[diagnostic(
        code(hpl::circular_reference),
        help("Use the bare field name to refer to the event's own message")
    )]
    CircularReference { alias: String, channel: String },

    #[error("Message type '{message_type}' has no field '{field}': {expr}")]
    #[diagnostic(code(hpl::unknown_field))]
    UnknownField {
        message_type: String,
        field: String,
        expr: String,
        #[help]
        suggestions: Option<String>,
    },

    #[error("Index {index} is out of range for an array of length {length}: {expr}")]
    #[diagnostic(code(hpl::index_out_of_range))]
    IndexOutOfRange {
        index: usize,
        length: usize,
        expr: String,
    },

    #[error("Index {index} is not a whole, non-negative number: {expr}")]
    #[diagnostic(code(hpl::invalid_index))]
    InvalidIndex { index: String, expr: String },

    #[error("No message type is declared for channel '{channel}'")]
    #[diagnostic(code(hpl::unknown_channel_type))]
    UnknownChannelType { channel: String },

    // Structural errors
    #[error("Channel '{channel}' appears more than once in a disjunction")]
    #[diagnostic(code(hpl::duplicate_channel))]
    DuplicateChannelName { channel: String },

    #[error("A disjunction needs at least two events, found {members}")]
    #[diagnostic(code(hpl::degenerate_disjunction))]
    DegenerateDisjunction { members: usize },

    #[error("Alias '{alias}' is introduced by more than one event")]
    #[diagnostic(code(hpl::duplicate_alias))]
    DuplicateAlias { alias: String },

    #[error("Time bound must be a positive amount, found {amount}")]
    #[diagnostic(code(hpl::time_bound), help("Use e.g. 'within 5 s' or 'within 200 ms'"))]
    InvalidTimeBound { amount: String },

    #[error("Scope terminator '{channel}' is the same event as the activator")]
    #[diagnostic(code(hpl::scope_terminator))]
    InvalidScopeTerminator { channel: String },

    #[error("Invalid channel name: '{name}'")]
    #[diagnostic(
        code(hpl::channel_name),
        help("Channel names look like /ns/topic, ~private or topic")
    )]
    InvalidChannelName { name: String },

    #[error("Invalid identifier: '{name}'")]
    #[diagnostic(code(hpl::identifier))]
    InvalidIdentifier { name: String },

    #[error("Predicate on '{channel}' does not mention any field of its own message: {predicate}")]
    #[diagnostic(code(hpl::missing_self_reference))]
    MissingSelfReference { channel: String, predicate: String },

    // Internal errors
    #[error("Internal parser error: {message}")]
    #[diagnostic(code(hpl::internal))]
    Internal { message: String },
}

/// Broad family of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// malformed text, reported by the parser
    Syntax,
    Type,
    Reference,
    Structural,
}

/// Fieldless mirror of [`HplError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    InvalidEscape,
    DuplicateMetadata,
    TypeMismatch,
    UnknownFunction,
    ArityOrTypeMismatch,
    InvalidRangeBounds,
    DuplicateBoundVariable,
    UnusedBoundVariable,
    ExpressionTooDeep,
    UnknownReference,
    CircularReference,
    UnknownField,
    IndexOutOfRange,
    InvalidIndex,
    UnknownChannelType,
    DuplicateChannelName,
    DegenerateDisjunction,
    DuplicateAlias,
    InvalidTimeBound,
    InvalidScopeTerminator,
    InvalidChannelName,
    InvalidIdentifier,
    MissingSelfReference,
    Internal,
}

impl HplError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HplError::Syntax { .. } => ErrorKind::Syntax,
            HplError::InvalidEscape { .. } => ErrorKind::InvalidEscape,
            HplError::DuplicateMetadata { .. } => ErrorKind::DuplicateMetadata,
            HplError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            HplError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            HplError::ArityOrTypeMismatch { .. } => ErrorKind::ArityOrTypeMismatch,
            HplError::InvalidRangeBounds { .. } => ErrorKind::InvalidRangeBounds,
            HplError::DuplicateBoundVariable { .. } => ErrorKind::DuplicateBoundVariable,
            HplError::UnusedBoundVariable { .. } => ErrorKind::UnusedBoundVariable,
            HplError::ExpressionTooDeep { .. } => ErrorKind::ExpressionTooDeep,
            HplError::UnknownReference { .. } => ErrorKind::UnknownReference,
            HplError::CircularReference { .. } => ErrorKind::CircularReference,
            HplError::UnknownField { .. } => ErrorKind::UnknownField,
            HplError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            HplError::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            HplError::UnknownChannelType { .. } => ErrorKind::UnknownChannelType,
            HplError::DuplicateChannelName { .. } => ErrorKind::DuplicateChannelName,
            HplError::DegenerateDisjunction { .. } => ErrorKind::DegenerateDisjunction,
            HplError::DuplicateAlias { .. } => ErrorKind::DuplicateAlias,
            HplError::InvalidTimeBound { .. } => ErrorKind::InvalidTimeBound,
            HplError::InvalidScopeTerminator { .. } => ErrorKind::InvalidScopeTerminator,
            HplError::InvalidChannelName { .. } => ErrorKind::InvalidChannelName,
            HplError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            HplError::MissingSelfReference { .. } => ErrorKind::MissingSelfReference,
            HplError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        use ErrorKind::*;
        match self.kind() {
            Syntax | InvalidEscape | DuplicateMetadata | Internal => ErrorCategory::Syntax,
            TypeMismatch | UnknownFunction | ArityOrTypeMismatch | InvalidRangeBounds
            | DuplicateBoundVariable | UnusedBoundVariable | ExpressionTooDeep | InvalidIndex => {
                ErrorCategory::Type
            }
            UnknownReference | CircularReference | UnknownField | IndexOutOfRange
            | UnknownChannelType => ErrorCategory::Reference,
            DuplicateChannelName | DegenerateDisjunction | DuplicateAlias | InvalidTimeBound
            | InvalidScopeTerminator | InvalidChannelName | InvalidIdentifier
            | MissingSelfReference => ErrorCategory::Structural,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        HplError::Internal {
            message: msg.into(),
        }
    }
}

/// Ordered, non-empty list of problems found while validating
#[derive(Debug, Clone, PartialEq, Diagnostic, Error)]
#[error("{} problem(s) found", .errors.len())]
#[diagnostic(code(hpl::invalid))]
pub struct Diagnostics {
    #[related]
    errors: Vec<HplError>,
}

impl Diagnostics {
    /// `None` when there is nothing to report
    pub fn from_vec(errors: Vec<HplError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HplError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.count(kind) > 0
    }

    pub fn into_vec(self) -> Vec<HplError> {
        self.errors
    }
}

impl From<HplError> for Diagnostics {
    fn from(error: HplError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = HplError;
    type IntoIter = std::vec::IntoIter<HplError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a HplError;
    type IntoIter = std::slice::Iter<'a, HplError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Collects `Ok` values, or every error when at least one fails
pub(crate) fn collect_all<T>(
    results: impl IntoIterator<Item = Result<T, Vec<HplError>>>,
) -> Result<Vec<T>, Vec<HplError>> {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(mut e) => errors.append(&mut e),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Levenshtein distance used for "did you mean" suggestions
pub(crate) fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (curr_row[j] + 1) // insertion
                .min(prev_row[j + 1] + 1) // deletion
                .min(prev_row[j] + cost); // substitution
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// "Did you mean" help text for `word` among `candidates`
pub(crate) fn suggest<'a>(
    word: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let close: Vec<&str> = candidates
        .into_iter()
        .filter(|c| levenshtein_distance(word, c) <= 2)
        .collect();
    match close.as_slice() {
        [] => None,
        [one] => Some(format!("Did you mean '{}'?", one)),
        many => Some(format!("Did you mean one of: {}?", many.join(", "))),
    }
}
