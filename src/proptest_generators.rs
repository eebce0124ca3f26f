#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::event::{Event, SimpleEvent};
    use crate::expr::{ArithmeticOp, Expression, LogicalOp, NumberConstant, QuantifierKind, RelationalOp};
    use crate::parser::{is_keyword, HplParser};
    use crate::property::{Pattern, PropertyDraft, PropertyPatch, Scope, TimeBound, TimeUnit};
    use crate::typechecker::TypeChecker;
    use crate::types::DataType;
    use crate::validate::Validator;
    use proptest::prelude::*;

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,5}".prop_filter("keywords are reserved", |s| !is_keyword(s))
    }

    fn arb_number() -> impl Strategy<Value = f64> {
        prop_oneof![
            4 => (-1000i32..1000).prop_map(f64::from),
            4 => -1e6f64..1e6,
            1 => Just(-0.0),
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ]
    }

    fn arb_arithmetic_op() -> impl Strategy<Value = ArithmeticOp> {
        prop_oneof![
            Just(ArithmeticOp::Add),
            Just(ArithmeticOp::Sub),
            Just(ArithmeticOp::Mul),
            Just(ArithmeticOp::Div),
            Just(ArithmeticOp::Pow),
        ]
    }

    fn arb_ordering_op() -> impl Strategy<Value = RelationalOp> {
        prop_oneof![
            Just(RelationalOp::Lt),
            Just(RelationalOp::Lte),
            Just(RelationalOp::Gt),
            Just(RelationalOp::Gte),
        ]
    }

    fn arb_comparison_op() -> impl Strategy<Value = RelationalOp> {
        prop_oneof![arb_ordering_op(), Just(RelationalOp::Eq), Just(RelationalOp::Neq)]
    }

    fn arb_relational_op() -> impl Strategy<Value = RelationalOp> {
        prop_oneof![arb_comparison_op(), Just(RelationalOp::In)]
    }

    fn arb_logical_op() -> impl Strategy<Value = LogicalOp> {
        prop_oneof![
            Just(LogicalOp::And),
            Just(LogicalOp::Or),
            Just(LogicalOp::Implies),
            Just(LogicalOp::Iff),
        ]
    }

    // Roots are `@var` or a bare field, optionally followed by `.f` and `[i]`
    fn arb_reference() -> impl Strategy<Value = Expression> {
        (
            any::<bool>(),
            arb_name(),
            prop::option::of(arb_name()),
            prop::option::of(0u32..4),
        )
            .prop_map(|(variable, root, field, index)| {
                let mut r = if variable {
                    Expression::var(root)
                } else {
                    Expression::field(root)
                };
                if let Some(field) = field {
                    r = Expression::field_access(r, field);
                }
                if let Some(i) = index {
                    r = Expression::index(r, Expression::number(f64::from(i)));
                }
                r
            })
    }

    fn arb_leaf() -> impl Strategy<Value = Expression> {
        prop_oneof![
            any::<bool>().prop_map(Expression::bool),
            arb_number().prop_map(Expression::number),
            "[a-zA-Z0-9 \"\\\\]{0,8}".prop_map(Expression::string),
            prop_oneof![
                Just(NumberConstant::Pi),
                Just(NumberConstant::Inf),
                Just(NumberConstant::Nan)
            ]
            .prop_map(Expression::constant),
            arb_reference(),
        ]
    }

    // Quantifier domains must be atomic values
    fn arb_domain() -> impl Strategy<Value = Expression> {
        prop_oneof![
            (arb_number(), any::<bool>(), arb_number(), any::<bool>()).prop_map(|(l, li, u, ui)| {
                Expression::range(Expression::number(l), li, Expression::number(u), ui)
            }),
            prop::collection::vec(arb_leaf(), 1..4).prop_map(Expression::enumeration),
            arb_reference(),
        ]
    }

    // Syntactically valid, not necessarily well typed
    fn arb_expression() -> impl Strategy<Value = Expression> {
        arb_leaf().prop_recursive(4, 32, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(Expression::negative),
                inner.clone().prop_map(Expression::not),
                (arb_arithmetic_op(), inner.clone(), inner.clone())
                    .prop_map(|(op, a, b)| Expression::arithmetic(op, a, b)),
                (arb_relational_op(), inner.clone(), inner.clone())
                    .prop_map(|(op, a, b)| Expression::relational(op, a, b)),
                (arb_logical_op(), inner.clone(), inner.clone())
                    .prop_map(|(op, a, b)| Expression::logical(op, a, b)),
                (arb_name(), inner.clone()).prop_map(|(name, arg)| Expression::call(name, arg)),
                prop::collection::vec(inner.clone(), 1..4).prop_map(Expression::enumeration),
                (inner.clone(), any::<bool>(), inner.clone(), any::<bool>())
                    .prop_map(|(l, li, u, ui)| Expression::range(l, li, u, ui)),
                (any::<bool>(), arb_name(), arb_domain(), inner).prop_map(|(all, var, domain, body)| {
                    let kind = if all {
                        QuantifierKind::Forall
                    } else {
                        QuantifierKind::Exists
                    };
                    Expression::quantifier(kind, var, domain, body)
                }),
            ]
        })
    }

    fn simple(channel: &str, alias: Option<&str>, predicate: Option<&str>) -> Event {
        let mut event = SimpleEvent::new(channel).unwrap();
        if let Some(alias) = alias {
            event = event.with_alias(alias).unwrap();
        }
        if let Some(predicate) = predicate {
            event = event.with_predicate(HplParser::parse_predicate(predicate).unwrap());
        }
        Event::Simple(event)
    }

    // Well-formed properties over every scope and pattern
    fn arb_property() -> impl Strategy<Value = PropertyDraft> {
        (
            0usize..4,
            0usize..5,
            prop::option::of((1u32..1000, any::<bool>())),
            0u32..100,
        )
            .prop_map(|(scope, pattern, bound, n)| {
                let start = || simple("/start", Some("S"), None);
                let stop = || simple("/stop", None, Some("id = @S.id"));
                let scope = match scope {
                    0 => Scope::Global,
                    1 => Scope::after(start()),
                    2 => Scope::after_until(start(), stop()),
                    _ => Scope::until(simple("/stop", None, Some("id > 0"))),
                };
                let bound = bound.map(|(amount, ms)| {
                    let unit = if ms {
                        TimeUnit::Milliseconds
                    } else {
                        TimeUnit::Seconds
                    };
                    TimeBound::new(f64::from(amount), unit).unwrap()
                });
                let guard = format!("x > {}", n);
                let trigger = simple("/cmd", Some("T"), Some(guard.as_str()));
                let event = simple("/fb", None, Some("x = @T.x"));
                let pattern = match pattern {
                    0 => Pattern::existence(simple("/fb", None, Some(guard.as_str())), bound),
                    1 => Pattern::absence(simple("/fb", None, Some(guard.as_str())), bound),
                    2 => Pattern::response(trigger, event, bound),
                    3 => Pattern::prevention(trigger, event, bound),
                    _ => Pattern::requirement(trigger, event, bound),
                };
                PropertyDraft::new(scope, pattern)
            })
    }

    proptest! {
        #[test]
        fn test_expression_display_parse(expr in arb_expression()) {
            // braces keep a top-level set from reading as a predicate
            let text = format!("{{{}}}", expr);
            match HplParser::parse_predicate(&text) {
                Ok(parsed) => prop_assert_eq!(parsed, expr),
                Err(e) => prop_assert!(false, "Failed to parse {expr:?} -> `{text}`: {:?}", e),
            }
        }

        #[test]
        fn test_numeric_arithmetic_is_sound(a in arb_number(), b in arb_number(), op in arb_arithmetic_op()) {
            let e = Expression::arithmetic(op, Expression::number(a), Expression::number(b));
            prop_assert_eq!(TypeChecker::default().infer(&e), Ok(DataType::Number));
        }

        #[test]
        fn test_numeric_comparison_is_sound(a in arb_number(), b in arb_number(), op in arb_comparison_op()) {
            let e = Expression::relational(op, Expression::number(a), Expression::number(b));
            prop_assert_eq!(TypeChecker::default().infer(&e), Ok(DataType::Bool));
        }

        #[test]
        fn test_mixed_ordering_reports_one_mismatch(
            flag in any::<bool>(),
            n in arb_number(),
            op in arb_ordering_op(),
            swap in any::<bool>(),
        ) {
            let (a, b) = if swap {
                (Expression::number(n), Expression::bool(flag))
            } else {
                (Expression::bool(flag), Expression::number(n))
            };
            let errors = TypeChecker::default()
                .infer(&Expression::relational(op, a, b))
                .unwrap_err();
            let mismatches = errors.iter().filter(|e| e.kind() == ErrorKind::TypeMismatch).count();
            prop_assert_eq!(mismatches, 1);
        }

        #[test]
        fn test_empty_patch_is_identity(draft in arb_property()) {
            let property = Validator::default().validate(draft).unwrap();
            let copy = property.but(PropertyPatch::default()).unwrap();
            prop_assert_eq!(&copy, &property);
        }

        #[test]
        fn test_validation_is_idempotent(draft in arb_property()) {
            let validator = Validator::default();
            let property = validator.validate(draft).unwrap();
            prop_assert_eq!(validator.revalidate(&property).unwrap(), property);
        }

        #[test]
        fn test_property_display_parse(draft in arb_property()) {
            let validator = Validator::default();
            let property = validator.validate(draft).unwrap();
            let text = property.to_string();
            match validator.parse_property(&text) {
                Ok(parsed) => prop_assert_eq!(parsed, property),
                Err(e) => prop_assert!(false, "Failed to parse `{text}`: {:?}", e),
            }
        }
    }
}
