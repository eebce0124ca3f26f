use miette::SourceSpan;

use super::raw::Rule;
use crate::error::HplError;

// Extension trait for turning pest spans into miette spans
pub trait SpanExt {
    fn to_source_span(&self) -> SourceSpan;
}

impl SpanExt for pest::Span<'_> {
    #[inline]
    fn to_source_span(&self) -> SourceSpan {
        (self.start(), self.end() - self.start()).into()
    }
}

/// Convert pest Rule enum to user-friendly names
fn rule_to_friendly_name(rule: &Rule) -> &'static str {
    match rule {
        Rule::property_file | Rule::property => "property",
        Rule::specification_file => "specification",
        Rule::predicate_file => "predicate",
        Rule::keyword => "keyword",
        Rule::identifier => "identifier",
        Rule::channel => "channel name",
        Rule::kw_globally => "'globally'",
        Rule::kw_after => "'after'",
        Rule::kw_until => "'until'",
        Rule::kw_some => "'some'",
        Rule::kw_no => "'no'",
        Rule::kw_within => "'within'",
        Rule::kw_as => "'as'",
        Rule::kw_or => "'or'",
        Rule::kw_in => "'in'",
        Rule::kw_to => "'to'",
        Rule::metadata => "metadata",
        Rule::metadata_id => "'id'",
        Rule::metadata_title => "'title'",
        Rule::metadata_description => "'description'",
        Rule::global_scope | Rule::after_until | Rule::until_scope => "scope",
        Rule::existence | Rule::absence | Rule::binary => "pattern",
        Rule::causes => "'causes'",
        Rule::forbids => "'forbids'",
        Rule::requires => "'requires'",
        Rule::time_bound => "time bound",
        Rule::time_unit => "time unit (s or ms)",
        Rule::disjunction => "event disjunction",
        Rule::simple_event => "event",
        Rule::predicate => "predicate",
        Rule::condition | Rule::atomic_condition => "condition",
        Rule::not_op => "'not'",
        Rule::implies_op => "'implies'",
        Rule::iff_op => "'iff'",
        Rule::or_op => "'or'",
        Rule::and_op => "'and'",
        Rule::quantifier_head | Rule::quantifier_kind => "quantifier",
        Rule::relational_op => "comparison operator",
        Rule::expr => "expression",
        Rule::neg => "'-'",
        Rule::add => "'+'",
        Rule::sub => "'-'",
        Rule::pow => "'**'",
        Rule::mul => "'*'",
        Rule::div => "'/'",
        Rule::boolean => "boolean",
        Rule::constant => "constant",
        Rule::number => "number",
        Rule::string | Rule::string_inner => "string",
        Rule::function_call => "function call",
        Rule::enum_literal => "set",
        Rule::range_literal | Rule::range_open | Rule::range_close => "range",
        Rule::reference | Rule::variable | Rule::own_field => "reference",
        Rule::field_accessor => "field access",
        Rule::index_accessor => "index",
        Rule::EOI => "end of input",
        #[allow(unreachable_patterns)]
        _ => "input",
    }
}

/// Generate contextual help text based on error patterns
fn generate_help_text(positives: &[Rule], found_eoi: bool) -> Option<String> {
    if positives.is_empty() {
        return None;
    }

    if positives.contains(&Rule::time_unit) {
        return Some("Time bounds need a unit, like: within 100 ms".to_string());
    }

    if positives.contains(&Rule::relational_op) && positives.len() == 1 {
        return Some("Comparisons do not chain; combine them with 'and'".to_string());
    }

    if (positives.contains(&Rule::simple_event) || positives.contains(&Rule::disjunction))
        && found_eoi
    {
        return Some("Property is incomplete. Add an event, like: globally: some /topic".to_string());
    }

    if positives.contains(&Rule::global_scope) || positives.contains(&Rule::after_until) {
        return Some("A property starts with a scope: globally, after E, after E until E or until E".to_string());
    }

    if positives.contains(&Rule::EOI) {
        return Some("Unexpected input. Check for unbalanced braces or parentheses.".to_string());
    }

    None
}

impl HplError {
    /// Create a syntax error from pest error with diagnostic information
    pub(crate) fn from_pest(pest_err: Box<pest::error::Error<Rule>>, src: String) -> Self {
        use pest::error::{ErrorVariant, InputLocation};

        // Non-zero width so miette draws an arrow
        let span: SourceSpan = match pest_err.location {
            InputLocation::Pos(pos) => {
                if pos >= src.len() && pos > 0 {
                    (pos - 1, 1).into()
                } else if pos < src.len() {
                    (pos, 1).into()
                } else {
                    (0, 0).into()
                }
            }
            InputLocation::Span((start, end)) => (start, end.saturating_sub(start).max(1)).into(),
        };

        let (line, col) = match pest_err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };

        let (expected_msg, help) = match &pest_err.variant {
            ErrorVariant::ParsingError {
                positives,
                negatives: _,
            } => {
                let found_eoi = match pest_err.location {
                    InputLocation::Pos(p) => p >= src.len(),
                    InputLocation::Span((_, end)) => end >= src.len(),
                };

                let mut names: Vec<&str> = positives.iter().map(rule_to_friendly_name).collect();
                names.dedup();
                let expected_msg = match names.as_slice() {
                    [] => "Unexpected input".to_string(),
                    [one] => format!("Expected {}", one),
                    few if few.len() <= 3 => format!("Expected one of: {}", few.join(", ")),
                    many => format!("Expected one of: {}, ...", many[..3].join(", ")),
                };

                (expected_msg, generate_help_text(positives, found_eoi))
            }
            ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        HplError::Syntax {
            src,
            span,
            help,
            expected_msg,
            line,
            col,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HplParser;

    fn syntax_error(input: &str) -> HplError {
        let err = HplParser::parse_property(input).unwrap_err();
        err.into_vec().remove(0)
    }

    #[test]
    fn test_error_position() {
        let HplError::Syntax { line, col, .. } = syntax_error("globally:\n  some") else {
            panic!("expected syntax error");
        };
        assert_eq!(line, 2);
        assert!(col >= 3);
    }

    #[test]
    fn test_missing_unit_help() {
        let HplError::Syntax { help, .. } = syntax_error("globally: some /a within 5") else {
            panic!("expected syntax error");
        };
        assert!(help.unwrap().contains("unit"));
    }

    #[test]
    fn test_missing_scope_message() {
        let HplError::Syntax { expected_msg, .. } = syntax_error("/a causes /b") else {
            panic!("expected syntax error");
        };
        assert!(expected_msg.starts_with("Expected"));
    }

    #[test]
    fn test_span_conversion() {
        use pest::Parser;

        let input = "globally: some /a";
        let pair = HplParser::parse(Rule::property_file, input)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(pair.as_span().to_source_span(), (0, input.len()).into());
    }
}
