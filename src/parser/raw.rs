use std::cell::RefCell;

use pest::{
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc::*, Op, PrattParser},
    Parser,
};
use pest_derive::Parser;

use super::error::SpanExt;
use super::{MAX_NESTING, MAX_TREE_DEPTH};
use crate::error::{Diagnostics, HplError};
use crate::event::{Event, SimpleEvent};
use crate::expr::{ArithmeticOp, Expression, LogicalOp, NumberConstant, QuantifierKind, RelationalOp};
use crate::property::{Metadata, Pattern, PropertyDraft, Scope, TimeBound, TimeUnit};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct HplParser;

type Built<T> = Result<T, Diagnostics>;

/// A value built in spite of problems that did not stop the parser, such as
/// a zero time bound or a repeated channel in a disjunction
#[derive(Debug)]
pub(crate) struct Recovered<T> {
    pub value: T,
    pub problems: Vec<HplError>,
}

impl<T> Recovered<T> {
    fn into_built(self) -> Built<T> {
        match Diagnostics::from_vec(self.problems) {
            Some(diagnostics) => Err(diagnostics),
            None => Ok(self.value),
        }
    }
}

impl HplParser {
    /// Parse one property into an unvalidated draft
    pub fn parse_property(input: &str) -> Built<PropertyDraft> {
        Self::recover_property(input)?.into_built()
    }

    /// Parse one or more properties
    pub fn parse_specification(input: &str) -> Built<Vec<PropertyDraft>> {
        Self::recover_specification(input)?.into_built()
    }

    /// Parse a bare condition, with or without surrounding braces
    pub fn parse_predicate(input: &str) -> Built<Expression> {
        Self::recover_predicate(input)?.into_built()
    }

    pub(crate) fn recover_property(input: &str) -> Built<Recovered<PropertyDraft>> {
        let file = Self::entry(Rule::property_file, input)?;
        let builder = Builder::new(input);
        let property = significant(file.into_inner())
            .next()
            .ok_or_else(|| HplError::internal("Grammar guarantees property_file has a property"))?;
        let draft = builder.property(property)?;
        Ok(builder.finish(draft))
    }

    pub(crate) fn recover_specification(input: &str) -> Built<Recovered<Vec<PropertyDraft>>> {
        let file = Self::entry(Rule::specification_file, input)?;
        let builder = Builder::new(input);
        let drafts = significant(file.into_inner())
            .map(|pair| builder.property(pair))
            .collect::<Built<Vec<_>>>()?;
        Ok(builder.finish(drafts))
    }

    pub(crate) fn recover_predicate(input: &str) -> Built<Recovered<Expression>> {
        let file = Self::entry(Rule::predicate_file, input)?;
        let builder = Builder::new(input);
        let pair = significant(file.into_inner())
            .next()
            .ok_or_else(|| HplError::internal("Grammar guarantees predicate_file has a condition"))?;
        let predicate = match pair.as_rule() {
            Rule::predicate => builder.predicate(pair)?,
            _ => builder.condition(pair)?,
        };
        Ok(builder.finish(predicate))
    }

    /// Both pest and the builder recurse once per nesting level, so deep
    /// input is turned away before either of them sees it
    fn entry(rule: Rule, input: &str) -> Result<Pair<'_, Rule>, HplError> {
        let nesting = bracket_nesting(input);
        if nesting > MAX_NESTING {
            return Err(HplError::ExpressionTooDeep {
                depth: nesting,
                limit: MAX_NESTING,
            });
        }
        let mut pairs = Self::parse(rule, input)
            .map_err(|e| HplError::from_pest(Box::new(e), input.to_string()))?;
        let pair = pairs
            .next()
            .ok_or_else(|| HplError::internal("Grammar guarantees an entry rule match"))?;
        let depth = lowered_depth(pair.clone());
        if depth > MAX_TREE_DEPTH {
            return Err(HplError::ExpressionTooDeep {
                depth,
                limit: MAX_TREE_DEPTH,
            });
        }
        Ok(pair)
    }
}

/// Deepest nesting of `(`, `[` and `{` outside string literals
fn bracket_nesting(input: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

/// Upper bound on the depth of the expression tree the builder makes from
/// `pair`, measured with an explicit stack
fn lowered_depth(pair: Pair<'_, Rule>) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(pair, 1usize)];
    while let Some((pair, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        let rule = pair.as_rule();
        let children: Vec<Pair<'_, Rule>> = pair.into_inner().collect();
        let below = depth + nodes_added(rule, &children);
        pending.extend(children.into_iter().map(|child| (child, below)));
    }
    deepest
}

/// Tree nodes a rule adds above its children
fn nodes_added(rule: Rule, children: &[Pair<'_, Rule>]) -> usize {
    match rule {
        Rule::condition | Rule::expr => children
            .iter()
            .filter(|child| {
                matches!(
                    child.as_rule(),
                    Rule::not_op
                        | Rule::quantifier_head
                        | Rule::implies_op
                        | Rule::iff_op
                        | Rule::or_op
                        | Rule::and_op
                        | Rule::neg
                        | Rule::add
                        | Rule::sub
                        | Rule::mul
                        | Rule::div
                        | Rule::pow
                )
            })
            .count(),
        Rule::atomic_condition => usize::from(children.len() > 1),
        Rule::function_call | Rule::enum_literal | Rule::range_literal => 1,
        Rule::reference => children.len().saturating_sub(1),
        _ => 0,
    }
}

/// Pairs that carry meaning, skipping keyword tokens and end of input
fn significant<'i>(pairs: Pairs<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pairs.filter(|p| {
        !matches!(
            p.as_rule(),
            Rule::EOI
                | Rule::kw_globally
                | Rule::kw_after
                | Rule::kw_until
                | Rule::kw_some
                | Rule::kw_no
                | Rule::kw_within
                | Rule::kw_as
                | Rule::kw_or
                | Rule::kw_in
                | Rule::kw_to
        )
    })
}

fn next<'i>(
    pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
    what: &str,
) -> Result<Pair<'i, Rule>, HplError> {
    pairs
        .next()
        .ok_or_else(|| HplError::internal(format!("Grammar guarantees {}", what)))
}

fn unexpected(rule: Rule, place: &str) -> Diagnostics {
    HplError::internal(format!("Unexpected {} rule: {:?}", place, rule)).into()
}

struct Builder<'i> {
    src: &'i str,
    // problems that still leave a usable draft
    recovered: RefCell<Vec<HplError>>,
}

impl<'i> Builder<'i> {
    fn new(src: &'i str) -> Self {
        Self {
            src,
            recovered: RefCell::new(Vec::new()),
        }
    }

    fn recover(&self, problem: HplError) {
        self.recovered.borrow_mut().push(problem);
    }

    fn finish<T>(self, value: T) -> Recovered<T> {
        Recovered {
            value,
            problems: self.recovered.into_inner(),
        }
    }
}

impl<'i> Builder<'i> {
    fn property(&self, pair: Pair<'i, Rule>) -> Built<PropertyDraft> {
        let mut inner = significant(pair.into_inner()).peekable();
        let metadata = match inner.peek().map(|p| p.as_rule()) {
            Some(Rule::metadata) => Some(self.metadata(next(&mut inner, "metadata")?)?),
            _ => None,
        };
        let scope = self.scope(next(&mut inner, "property has a scope")?)?;
        let pattern = self.pattern(next(&mut inner, "property has a pattern")?)?;
        Ok(PropertyDraft {
            metadata,
            scope,
            pattern,
        })
    }

    fn metadata(&self, pair: Pair<'i, Rule>) -> Built<Metadata> {
        let mut metadata = Metadata::default();
        for item in pair.into_inner() {
            let span = item.as_span();
            let rule = item.as_rule();
            let value = next(&mut item.into_inner(), "metadata item has a value")?;
            // the first value given for a key wins
            let (key, taken) = match rule {
                Rule::metadata_id => ("id", metadata.id.is_some()),
                Rule::metadata_title => ("title", metadata.title.is_some()),
                Rule::metadata_description => ("description", metadata.description.is_some()),
                rule => return Err(unexpected(rule, "metadata")),
            };
            if taken {
                self.recover(HplError::DuplicateMetadata {
                    key: key.to_string(),
                    span: span.to_source_span(),
                    src: self.src.to_string(),
                });
                continue;
            }
            match rule {
                Rule::metadata_id => metadata.id = Some(value.as_str().into()),
                Rule::metadata_title => metadata.title = Some(self.string(value)?),
                _ => metadata.description = Some(self.string(value)?),
            }
        }
        Ok(metadata)
    }

    fn scope(&self, pair: Pair<'i, Rule>) -> Built<Scope> {
        match pair.as_rule() {
            Rule::global_scope => Ok(Scope::Global),
            Rule::after_until => {
                let mut inner = significant(pair.into_inner());
                let activator = self.event(next(&mut inner, "after has an activator")?)?;
                match inner.next() {
                    Some(terminator) => Ok(Scope::after_until(activator, self.event(terminator)?)),
                    None => Ok(Scope::after(activator)),
                }
            }
            Rule::until_scope => {
                let mut inner = significant(pair.into_inner());
                Ok(Scope::until(self.event(next(&mut inner, "until has a terminator")?)?))
            }
            rule => Err(unexpected(rule, "scope")),
        }
    }

    fn pattern(&self, pair: Pair<'i, Rule>) -> Built<Pattern> {
        let rule = pair.as_rule();
        let mut inner = significant(pair.into_inner());
        match rule {
            Rule::existence | Rule::absence => {
                let event = self.event(next(&mut inner, "pattern has an event")?)?;
                let bound = inner.next().map(|b| self.time_bound(b)).transpose()?.flatten();
                if rule == Rule::existence {
                    Ok(Pattern::existence(event, bound))
                } else {
                    Ok(Pattern::absence(event, bound))
                }
            }
            Rule::binary => {
                let trigger = self.event(next(&mut inner, "pattern has a trigger")?)?;
                let op = next(&mut inner, "pattern has an operator")?;
                let event = self.event(next(&mut inner, "pattern has an event")?)?;
                let bound = inner.next().map(|b| self.time_bound(b)).transpose()?.flatten();
                match op.as_rule() {
                    Rule::causes => Ok(Pattern::response(trigger, event, bound)),
                    Rule::forbids => Ok(Pattern::prevention(trigger, event, bound)),
                    Rule::requires => Ok(Pattern::requirement(trigger, event, bound)),
                    rule => Err(unexpected(rule, "pattern operator")),
                }
            }
            rule => Err(unexpected(rule, "pattern")),
        }
    }

    /// `None` when the bound is not a positive amount
    fn time_bound(&self, pair: Pair<'i, Rule>) -> Built<Option<TimeBound>> {
        let mut inner = significant(pair.into_inner());
        let amount = self.number(next(&mut inner, "time bound has an amount")?)?;
        let unit = match next(&mut inner, "time bound has a unit")?.as_str() {
            "ms" => TimeUnit::Milliseconds,
            _ => TimeUnit::Seconds,
        };
        match TimeBound::new(amount, unit) {
            Ok(bound) => Ok(Some(bound)),
            Err(e) => {
                self.recover(e);
                Ok(None)
            }
        }
    }

    fn event(&self, pair: Pair<'i, Rule>) -> Built<Event> {
        match pair.as_rule() {
            Rule::simple_event => {
                let mut inner = significant(pair.into_inner());
                let mut event = SimpleEvent::new(next(&mut inner, "event has a channel")?.as_str())?;
                for part in inner {
                    event = match part.as_rule() {
                        Rule::identifier => match event.with_alias(part.as_str()) {
                            Ok(aliased) => aliased,
                            Err(e) => {
                                self.recover(e);
                                event
                            }
                        },
                        Rule::predicate => event.with_predicate(self.predicate(part)?),
                        rule => return Err(unexpected(rule, "event")),
                    };
                }
                Ok(Event::Simple(event))
            }
            Rule::disjunction => {
                let members = significant(pair.into_inner())
                    .map(|member| self.event(member))
                    .collect::<Built<Vec<_>>>()?;
                let (event, problems) = Event::disjunction_with_problems(members);
                match event {
                    Some(event) => {
                        self.recovered.borrow_mut().extend(problems);
                        Ok(event)
                    }
                    None => Err(Diagnostics::from_vec(problems)
                        .unwrap_or_else(|| HplError::internal("Empty disjunction").into())),
                }
            }
            rule => Err(unexpected(rule, "event")),
        }
    }

    fn predicate(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        let condition = next(&mut pair.into_inner(), "predicate has a condition")?;
        self.condition(condition)
    }

    fn condition(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::implies_op, Left) | Op::infix(Rule::iff_op, Left))
            .op(Op::infix(Rule::or_op, Left))
            .op(Op::infix(Rule::and_op, Left))
            .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::quantifier_head));

        pratt
            .map_primary(|p| self.atomic_condition(p))
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::implies_op => LogicalOp::Implies,
                    Rule::iff_op => LogicalOp::Iff,
                    Rule::or_op => LogicalOp::Or,
                    Rule::and_op => LogicalOp::And,
                    rule => return Err(unexpected(rule, "logic infix")),
                };
                Ok(Expression::logical(op, lhs?, rhs?))
            })
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::not_op => Ok(Expression::not(rhs?)),
                Rule::quantifier_head => {
                    let mut head = significant(op.into_inner());
                    let kind = match next(&mut head, "quantifier has a kind")?.as_str() {
                        "forall" => QuantifierKind::Forall,
                        _ => QuantifierKind::Exists,
                    };
                    let var = next(&mut head, "quantifier has a variable")?.as_str();
                    let domain = self.value(next(&mut head, "quantifier has a domain")?)?;
                    Ok(Expression::quantifier(kind, var, domain, rhs?))
                }
                rule => Err(unexpected(rule, "logic prefix")),
            })
            .parse(pair.into_inner())
    }

    fn atomic_condition(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        let mut inner = pair.into_inner();
        let left = self.expr(next(&mut inner, "condition has an expression")?)?;
        let Some(op) = inner.next() else {
            return Ok(left);
        };
        let op = match op.as_str() {
            "=" => RelationalOp::Eq,
            "!=" => RelationalOp::Neq,
            "<" => RelationalOp::Lt,
            "<=" => RelationalOp::Lte,
            ">" => RelationalOp::Gt,
            ">=" => RelationalOp::Gte,
            "in" => RelationalOp::In,
            other => {
                return Err(HplError::internal(format!("Unexpected relational operator: {}", other)).into())
            }
        };
        let right = self.expr(next(&mut inner, "comparison has a right operand")?)?;
        Ok(Expression::relational(op, left, right))
    }

    fn expr(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::add, Left) | Op::infix(Rule::sub, Left))
            .op(Op::infix(Rule::mul, Left) | Op::infix(Rule::div, Left))
            .op(Op::infix(Rule::pow, Left))
            .op(Op::prefix(Rule::neg));

        pratt
            .map_primary(|p| match p.as_rule() {
                Rule::condition => self.condition(p),
                _ => self.value(p),
            })
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::add => ArithmeticOp::Add,
                    Rule::sub => ArithmeticOp::Sub,
                    Rule::mul => ArithmeticOp::Mul,
                    Rule::div => ArithmeticOp::Div,
                    Rule::pow => ArithmeticOp::Pow,
                    rule => return Err(unexpected(rule, "arithmetic infix")),
                };
                Ok(Expression::arithmetic(op, lhs?, rhs?))
            })
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::neg => Ok(Expression::negative(rhs?)),
                rule => Err(unexpected(rule, "arithmetic prefix")),
            })
            .parse(pair.into_inner())
    }

    fn value(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        match pair.as_rule() {
            Rule::boolean => Ok(Expression::bool(pair.as_str() == "True")),
            Rule::string => Ok(Expression::string(self.string(pair)?)),
            Rule::constant => NumberConstant::from_name(pair.as_str())
                .map(Expression::constant)
                .ok_or_else(|| HplError::internal(format!("Unknown constant: {}", pair.as_str())).into()),
            Rule::number => Ok(Expression::number(self.number(pair)?)),
            Rule::function_call => {
                let mut inner = pair.into_inner();
                let name = next(&mut inner, "call has a name")?.as_str();
                let arg = self.expr(next(&mut inner, "call has an argument")?)?;
                Ok(Expression::call(name, arg))
            }
            Rule::enum_literal => {
                let members = pair
                    .into_inner()
                    .map(|member| self.expr(member))
                    .collect::<Built<Vec<_>>>()?;
                Ok(Expression::enumeration(members))
            }
            Rule::range_literal => {
                let mut inner = significant(pair.into_inner());
                let open = next(&mut inner, "range has an opening bracket")?;
                let lower = self.expr(next(&mut inner, "range has a lower bound")?)?;
                let upper = self.expr(next(&mut inner, "range has an upper bound")?)?;
                let close = next(&mut inner, "range has a closing bracket")?;
                Ok(Expression::range(
                    lower,
                    open.as_str() == "[",
                    upper,
                    close.as_str() == "]",
                ))
            }
            Rule::reference => self.reference(pair),
            rule => Err(unexpected(rule, "value")),
        }
    }

    fn reference(&self, pair: Pair<'i, Rule>) -> Built<Expression> {
        let mut inner = pair.into_inner();
        let root = next(&mut inner, "reference has a root")?;
        let mut reference = match root.as_rule() {
            Rule::variable => {
                let name = next(&mut root.into_inner(), "variable has a name")?;
                Expression::var(name.as_str())
            }
            Rule::own_field => Expression::field(root.as_str()),
            rule => return Err(unexpected(rule, "reference root")),
        };
        for accessor in inner {
            reference = match accessor.as_rule() {
                Rule::field_accessor => {
                    let field = next(&mut accessor.into_inner(), "field accessor has a name")?;
                    Expression::field_access(reference, field.as_str())
                }
                Rule::index_accessor => {
                    let index = next(&mut accessor.into_inner(), "index accessor has an index")?;
                    Expression::index(reference, self.expr(index)?)
                }
                rule => return Err(unexpected(rule, "accessor")),
            };
        }
        Ok(reference)
    }

    fn number(&self, pair: Pair<'i, Rule>) -> Result<f64, HplError> {
        pair.as_str()
            .parse::<f64>()
            .map_err(|e| HplError::internal(format!("Invalid number '{}': {}", pair.as_str(), e)))
    }

    /// Contents of a string literal with escapes replaced
    fn string(&self, pair: Pair<'i, Rule>) -> Result<String, HplError> {
        let inner = next(&mut pair.into_inner(), "string has contents")?;
        let start = inner.as_span().start();
        let mut out = String::with_capacity(inner.as_str().len());
        let mut chars = inner.as_str().char_indices();
        while let Some((_, c)) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                // kept verbatim
                Some((offset, other)) => {
                    self.recover(HplError::InvalidEscape {
                        sequence: format!("\\{}", other),
                        span: (start + offset - 1, 1 + other.len_utf8()).into(),
                        src: self.src.to_string(),
                    });
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(HplError::internal("Grammar guarantees escapes are complete")),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn predicate(input: &str) -> Expression {
        HplParser::parse_predicate(input).unwrap()
    }

    #[test]
    fn test_logic_precedence() {
        assert_eq!(predicate("a or b and c").to_string(), "(a or (b and c))");
        assert_eq!(predicate("a implies b or c").to_string(), "(a implies (b or c))");
        assert_eq!(predicate("not a and b").to_string(), "((not a) and b)");
        assert_eq!(
            predicate("a iff b implies c").to_string(),
            "((a iff b) implies c)"
        );
    }

    #[test]
    fn test_quantifier_binds_next_operand() {
        assert_eq!(
            predicate("forall i in [0 to 3]: a[i] > 0 and b").to_string(),
            "((forall i in [0 to 3]: (a[i] > 0)) and b)"
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(predicate("a + b * c ** 2 > 0").to_string(), "((a + (b * (c ** 2))) > 0)");
        assert_eq!(predicate("a - b - c = 0").to_string(), "(((a - b) - c) = 0)");
        assert_eq!(predicate("-a ** 2 < 1").to_string(), "(((-a) ** 2) < 1)");
    }

    #[test]
    fn test_values() {
        assert_eq!(predicate("x in {1, 2, 3}").to_string(), "(x in {1, 2, 3})");
        assert_eq!(predicate("x in ![0 to 1]!").to_string(), "(x in ![0 to 1]!)");
        assert_eq!(predicate("@m.data[0].x = PI").to_string(), "(@m.data[0].x = PI)");
        assert_eq!(predicate("abs(x) < 1e3").to_string(), "(abs(x) < 1000)");
        assert_eq!(predicate("True").to_string(), "True");
    }

    #[test]
    fn test_braces_are_optional() {
        assert_eq!(predicate("{x > 0}"), predicate("x > 0"));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            predicate(r#"s = "a\"b\n""#),
            Expression::relational(RelationalOp::Eq, Expression::field("s"), Expression::string("a\"b\n"))
        );
        let err = HplParser::parse_predicate(r#"s = "a\qb""#).unwrap_err();
        assert!(err.contains(ErrorKind::InvalidEscape));
    }

    #[test]
    fn test_relational_operators_do_not_chain() {
        let err = HplParser::parse_predicate("a < b < c").unwrap_err();
        assert!(err.contains(ErrorKind::Syntax));
    }

    #[test]
    fn test_keywords_are_not_fields() {
        assert!(HplParser::parse_predicate("and > 1").is_err());
        assert!(HplParser::parse_predicate("android > 1").is_ok());
    }

    #[test]
    fn test_property_parts() {
        let draft = HplParser::parse_property(
            "after /start as S until /stop: /cmd as C causes /fb {x = @C.x} within 200 ms",
        )
        .unwrap();
        assert_eq!(draft.scope.activator().map(|e| e.to_string()), Some("/start as S".into()));
        assert_eq!(draft.scope.terminator().map(|e| e.to_string()), Some("/stop".into()));
        assert!(draft.pattern.is_response());
        assert_eq!(draft.pattern.bound(), TimeBound::milliseconds(200.0).ok().as_ref());
    }

    #[test]
    fn test_disjunction_events() {
        let draft = HplParser::parse_property("globally: no (/a or /b {x > 1})").unwrap();
        assert_eq!(draft.pattern.event().members().len(), 2);

        let err = HplParser::parse_property("globally: no (/a or /a)").unwrap_err();
        assert!(err.contains(ErrorKind::DuplicateChannelName));
    }

    #[test]
    fn test_metadata() {
        let draft = HplParser::parse_property(
            "# id: p1\n# title: \"Stop\"\n# description: \"Always \\\"stops\\\"\"\nglobally: some /stop",
        )
        .unwrap();
        let metadata = draft.metadata.unwrap();
        assert_eq!(metadata.id.as_deref(), Some("p1"));
        assert_eq!(metadata.description.as_deref(), Some("Always \"stops\""));

        let err = HplParser::parse_property("# id: a # id: b\nglobally: some /a").unwrap_err();
        assert!(err.contains(ErrorKind::DuplicateMetadata));
    }

    #[test]
    fn test_zero_time_bound() {
        let err = HplParser::parse_property("globally: some /a within 0 s").unwrap_err();
        assert!(err.contains(ErrorKind::InvalidTimeBound));
    }

    #[test]
    fn test_negative_literals() {
        assert_eq!(
            predicate("x = -1"),
            Expression::relational(RelationalOp::Eq, Expression::field("x"), Expression::number(-1.0))
        );
        assert_eq!(predicate("x = - 1").to_string(), "(x = (- 1))");
        assert_eq!(predicate("a-1 > 0").to_string(), "((a - 1) > 0)");
        assert_eq!(predicate("a - -1e2 > 0").to_string(), "((a - -100) > 0)");
        for text in ["(x = -1)", "(x = (- 1))", "(x = (- -1))", "(x = (-INF))", "(x != NAN)"] {
            assert_eq!(predicate(text).to_string(), text);
        }
    }

    #[test]
    fn test_problems_do_not_stop_the_draft() {
        let recovered = HplParser::recover_property(
            "# id: a # id: b\nglobally: (/a or /a) causes /b {s = \"\\q\"} within 0 s",
        )
        .unwrap();
        let kinds: Vec<ErrorKind> = recovered.problems.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::DuplicateMetadata,
                ErrorKind::DuplicateChannelName,
                ErrorKind::InvalidEscape,
                ErrorKind::InvalidTimeBound,
            ]
        );
        let draft = recovered.value;
        assert_eq!(draft.id().map(|i| &**i), Some("a"));
        assert_eq!(draft.pattern.trigger().map(|t| t.members().len()), Some(2));
        assert_eq!(draft.pattern.bound(), None);
        assert_eq!(draft.pattern.event().to_string(), "/b {(s = \"\\\\q\")}");
    }

    #[test]
    fn test_bracket_nesting_skips_strings() {
        assert_eq!(bracket_nesting("f(a[(b)]) = {1}"), 3);
        assert_eq!(bracket_nesting("s = \"((((\\\"((\""), 0);
        assert_eq!(bracket_nesting(""), 0);
    }

    #[test]
    fn test_lowered_depth_bounds_the_tree() {
        for text in [
            "a",
            "not a and b",
            "a + b * c > 0",
            "forall x in xs: @x",
            "@m.data[0].x = PI",
            "abs(-x) in {1, 2 + y}",
            "x in ![0 to len(a)]!",
        ] {
            let file = HplParser::parse(Rule::predicate_file, text).unwrap().next().unwrap();
            assert!(lowered_depth(file) >= predicate(text).depth(), "{}", text);
        }
        let file = HplParser::parse(Rule::predicate_file, "not a and b").unwrap().next().unwrap();
        assert_eq!(lowered_depth(file), 3);
    }

    #[test]
    fn test_deep_input_is_turned_away() {
        let nots = format!("{}a", "not ".repeat(3000));
        let err = HplParser::parse_predicate(&nots).unwrap_err();
        assert!(err.contains(ErrorKind::ExpressionTooDeep));

        let parens = format!("{}a{} > 0", "(".repeat(1000), ")".repeat(1000));
        let err = HplParser::parse_predicate(&parens).unwrap_err();
        assert!(err.contains(ErrorKind::ExpressionTooDeep));

        let chain = format!("{} > 0", vec!["a"; 3000].join(" + "));
        let err = HplParser::parse_predicate(&chain).unwrap_err();
        assert!(err.contains(ErrorKind::ExpressionTooDeep));

        let quoted = format!("s = \"{}\"", "(".repeat(1000));
        assert!(HplParser::parse_predicate(&quoted).is_ok());
    }

    #[test]
    fn test_specification() {
        let drafts = HplParser::parse_specification(
            "globally: some /a\n# id: second\nafter /a: /b forbids /c within 1 s\n",
        )
        .unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].id().map(|i| &**i), Some("second"));
    }
}
