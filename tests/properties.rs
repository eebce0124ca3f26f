use hpl::expr::Target;
use hpl::{
    Diagnostics, ErrorCategory, ErrorKind, EventRole, Expression, Metadata, MessageType,
    MessageTypes, Property, PropertyPatch, Scope, TimeBound, Validator, ValidatorConfig,
};

/// Helper function to parse and validate a property with the default settings
fn parse_and_validate(text: &str) -> Result<Property, Diagnostics> {
    hpl::parse_property(text)
}

const GOOD_PROPERTIES: &[&str] = &[
    r#"globally: some topic {int < 1 and float < 2 and string = "hello"}"#,
    "globally: no topic within 1s",
    "globally: input causes output",
    "globally: input causes output within 1s",
    "globally: output requires input",
    "globally: output requires input within 100 ms",
    "after ~events/bumper {state = PRESSED}:
        some ~cmd_vel {linear.x < 0.0 and angular.z = 0.0}",
    "after input: no output",
    "globally: some topic {m.int in [0 to 10]!}",
    "globally: some topic {not int in [0 to 10]}",
    "globally: some topic {float_array[0] < float_array[1]}",
    "globally: some topic {forall i in [0 to len(int_array)]!: int_array[@i] > 0}",
    "globally: some topic {exists x in int_array: @x > 0}",
    "globally: some topic {len(twist_array) > 0}",
    "until input: some output",
    "after input as M: some output {x = @M.x}",
    "globally: no /joy_teleop/joy {not buttons[0] in {0, 1}}",
    "globally: no /agrob/agrob_mode {not mode in {0,1,2,3}}",
    "after /start until /stop: (/a or /b {x > 0}) forbids /c within 20 ms",
];

#[test]
fn test_good_properties() {
    for text in GOOD_PROPERTIES {
        if let Err(e) = parse_and_validate(text) {
            panic!("{} should be valid: {:?}", text, e);
        }
    }
}

#[test]
fn test_bad_properties() {
    let cases = [
        ("some topic", ErrorKind::Syntax),
        (
            r#"globally: some topic {int < 1, float < 2, string = "hello"}"#,
            ErrorKind::Syntax,
        ),
        ("globally: some topic {}", ErrorKind::Syntax),
        (r#"globally: some topic {int > "42"}"#, ErrorKind::TypeMismatch),
        ("globally: input as M causes output1 as M", ErrorKind::DuplicateAlias),
        ("globally: some topic within 0 s", ErrorKind::InvalidTimeBound),
        ("after /a until /a: some /b", ErrorKind::InvalidScopeTerminator),
        ("globally: no (/a or /a)", ErrorKind::DuplicateChannelName),
        ("globally: some topic {frobnicate(x) > 0}", ErrorKind::UnknownFunction),
        ("globally: some topic {len(5) > 0}", ErrorKind::ArityOrTypeMismatch),
        ("globally: some topic {x in [10 to 0]}", ErrorKind::InvalidRangeBounds),
        ("globally: some topic as T {x = @T.x}", ErrorKind::CircularReference),
    ];
    for (text, kind) in cases {
        let err = parse_and_validate(text).unwrap_err();
        assert!(err.contains(kind), "{} should fail with {:?}, got {:?}", text, kind, err);
    }
}

#[test]
fn test_alias_scoping() {
    let property = parse_and_validate("globally: /cmd as t causes /fb {x = @t.x} within 5 s").unwrap();
    let predicate = property.pattern().event().members()[0].predicate().unwrap();
    let Expression::Relational(_, _, right) = &**predicate else {
        panic!("expected comparison, got {}", predicate);
    };
    let Expression::FieldAccess(access) = &**right else {
        panic!("expected field access, got {}", right);
    };
    let Expression::Variable(var) = &*access.base else {
        panic!("expected alias reference, got {}", access.base);
    };
    match &var.target {
        Target::Event(target) => {
            assert_eq!(target.role, EventRole::Trigger);
            assert_eq!(&*target.channel, "/cmd");
        }
        other => panic!("unexpected target {:?}", other),
    }

    let err = parse_and_validate("globally: /cmd {x = @f.x} causes /fb as f within 5 s").unwrap_err();
    assert!(err.contains(ErrorKind::UnknownReference));
    assert!(err.iter().all(|e| e.category() == ErrorCategory::Reference));
}

#[test]
fn test_requirement_direction() {
    // the required event may look back at the trigger alias, not the other way round
    assert!(parse_and_validate("globally: /out as O requires /in {id = @O.id}").is_ok());
    let err = parse_and_validate("globally: /out {id = @I.id} requires /in as I").unwrap_err();
    assert!(err.contains(ErrorKind::UnknownReference));
}

#[test]
fn test_scope_aliases_are_visible_to_the_pattern() {
    assert!(parse_and_validate(
        "after /start as S until /stop {id = @S.id}: /a {id = @S.id} causes /b {id = @S.id}"
    )
    .is_ok());
    let err = parse_and_validate("after /start {id = @A.id}: some /a as A").unwrap_err();
    assert!(err.contains(ErrorKind::UnknownReference));
}

#[test]
fn test_every_problem_is_reported() {
    let err = parse_and_validate(
        r#"after /a as X until /a: /b as X {y > "s" and @Q} causes /c {frobnicate(1)}"#,
    )
    .unwrap_err();
    for kind in [
        ErrorKind::InvalidScopeTerminator,
        ErrorKind::DuplicateAlias,
        ErrorKind::TypeMismatch,
        ErrorKind::UnknownReference,
        ErrorKind::UnknownFunction,
    ] {
        assert!(err.contains(kind), "missing {:?} in {:?}", kind, err);
    }
}

#[test]
fn test_parse_problems_do_not_hide_the_rest() {
    let err = parse_and_validate(r#"globally: some topic {int > "42" and @Q} within 0 s"#).unwrap_err();
    for kind in [
        ErrorKind::InvalidTimeBound,
        ErrorKind::TypeMismatch,
        ErrorKind::UnknownReference,
    ] {
        assert!(err.contains(kind), "missing {:?} in {:?}", kind, err);
    }

    let err = parse_and_validate(r#"globally: (/a or /a) causes /b {x > "s"}"#).unwrap_err();
    assert!(err.contains(ErrorKind::DuplicateChannelName));
    assert!(err.contains(ErrorKind::TypeMismatch));

    let err = parse_and_validate(r#"# id: a # id: b
globally: some /a {s = "\q" and x > True}"#)
    .unwrap_err();
    for kind in [
        ErrorKind::DuplicateMetadata,
        ErrorKind::InvalidEscape,
        ErrorKind::TypeMismatch,
    ] {
        assert!(err.contains(kind), "missing {:?} in {:?}", kind, err);
    }

    let err = hpl::parse_specification(
        "globally: some /a within 0 ms\nglobally: some /b {x > True}",
    )
    .unwrap_err();
    assert!(err.contains(ErrorKind::InvalidTimeBound));
    assert!(err.contains(ErrorKind::TypeMismatch));

    let err = hpl::parse_predicate(r#"s = "\q" and 1"#).unwrap_err();
    assert!(err.contains(ErrorKind::InvalidEscape));
    assert!(err.contains(ErrorKind::TypeMismatch));
}

#[test]
fn test_time_bounds_are_distinct() {
    let five = parse_and_validate("globally: some /a within 5 s").unwrap();
    let short = parse_and_validate("globally: some /a within 200 ms").unwrap();
    assert_ne!(five, short);
    assert_eq!(five.pattern().bound(), TimeBound::seconds(5.0).ok().as_ref());
    assert_eq!(short.pattern().bound().map(|b| b.as_seconds()), Some(0.2));
}

#[test]
fn test_classification() {
    let safety = [
        "globally: no /a",
        "globally: /a forbids /b",
        "globally: /a requires /b",
    ];
    for text in safety {
        let property = parse_and_validate(text).unwrap();
        assert!(property.is_safety() && !property.is_liveness(), "{}", text);
    }
    for text in ["globally: some /a", "globally: /a causes /b"] {
        assert!(parse_and_validate(text).unwrap().is_liveness(), "{}", text);
    }
}

#[test]
fn test_events_in_temporal_order() {
    let property =
        parse_and_validate("after /s as S until /e: /t as T causes /b {x = @T.x}").unwrap();
    let roles: Vec<EventRole> = property.events().into_iter().map(|(role, _)| role).collect();
    assert_eq!(
        roles,
        vec![
            EventRole::Activator,
            EventRole::Trigger,
            EventRole::Behaviour,
            EventRole::Terminator
        ]
    );
    let aliases: Vec<&str> = property.aliases().into_iter().map(|a| &**a).collect();
    assert_eq!(aliases, vec!["S", "T"]);
}

#[test]
fn test_patch() {
    let property = parse_and_validate("after /s as S: /t as T causes /b {x = @T.x}").unwrap();

    let same = property.but(PropertyPatch::default()).unwrap();
    assert_eq!(same, property);

    let global = property
        .but(PropertyPatch {
            scope: Some(Scope::Global),
            ..Default::default()
        })
        .unwrap();
    assert!(global.scope().is_global());
    assert_eq!(global.pattern(), property.pattern());

    let pattern = property.pattern().with_bound(TimeBound::milliseconds(10.0).ok());
    let bounded = property
        .but(PropertyPatch {
            pattern: Some(pattern),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(bounded.pattern().bound().map(|b| b.amount()), Some(10.0));

    let titled = property
        .but(PropertyPatch {
            metadata: Some(Some(Metadata {
                title: Some("stop".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(titled.metadata().and_then(|m| m.title.as_deref()), Some("stop"));
    assert_eq!(titled.scope(), property.scope());
}

#[test]
fn test_metadata_round_trip() {
    let text = "# id: p1\n# title: \"No crash\"\n# description: \"The \\\"robot\\\" never\\ncrashes\"\nglobally: no /crash";
    let property = parse_and_validate(text).unwrap();
    assert_eq!(property.id().map(|i| &**i), Some("p1"));
    assert_eq!(
        property.metadata().and_then(|m| m.description.as_deref()),
        Some("The \"robot\" never\ncrashes")
    );
    assert_eq!(parse_and_validate(&property.to_string()).unwrap(), property);
}

#[test]
fn test_specification() {
    let spec = hpl::parse_specification(
        "# id: first\nglobally: some /a\n\n# id: second\nafter /a: /b causes /c within 1 s\n",
    )
    .unwrap();
    assert_eq!(spec.len(), 2);
    assert!(spec.get("second").unwrap().is_liveness());
    assert!(spec.get("third").is_none());
    assert_eq!(hpl::parse_specification(&spec.to_string()).unwrap(), spec);

    let err = hpl::parse_specification(
        "globally: some /a {x > True}\nglobally: /b as B causes /c as B",
    )
    .unwrap_err();
    assert!(err.contains(ErrorKind::TypeMismatch));
    assert!(err.contains(ErrorKind::DuplicateAlias));
}

#[test]
fn test_message_types() {
    let types = MessageTypes::new()
        .with_channel(
            "/cmd",
            MessageType::new("Cmd")
                .with_field("speed", hpl::FieldType::Number)
                .with_field("mode", hpl::FieldType::String),
        )
        .with_channel(
            "/fb",
            MessageType::new("Feedback").with_field("speed", hpl::FieldType::Number),
        );
    let validator = Validator::with_config(ValidatorConfig::default().with_message_types(types));

    assert!(validator
        .parse_property("globally: /cmd as C causes /fb {speed = @C.speed}")
        .is_ok());

    let err = validator
        .parse_property("globally: /cmd as C causes /fb {speed = @C.sped}")
        .unwrap_err();
    assert!(err.contains(ErrorKind::UnknownField));

    let err = validator
        .parse_property("globally: /cmd {mode > 1} causes /fb")
        .unwrap_err();
    assert!(err.contains(ErrorKind::TypeMismatch));

    let err = validator.parse_property("globally: some /other").unwrap_err();
    assert!(err.contains(ErrorKind::UnknownChannelType));
}

#[test]
fn test_logging_validator() {
    let validator = Validator::new(ValidatorConfig::default(), hpl::logging::stderr_logger());
    assert!(validator.parse_property("# id: logged\nglobally: some /a {x > 0}").is_ok());
}

#[test]
fn test_canonical_form() {
    let unsplit = [
        "globally: no /a",
        "globally: some (/a or /b)",
        "globally: /a causes (/b or /c)",
    ];
    for text in unsplit {
        let property = parse_and_validate(text).unwrap();
        assert_eq!(property.canonical_form().unwrap(), vec![property], "{}", text);
    }

    let property = parse_and_validate("globally: no (/a or /b {x > 0})").unwrap();
    let behaviours: Vec<String> = property
        .canonical_form()
        .unwrap()
        .iter()
        .map(|p| p.pattern().event().to_string())
        .collect();
    assert_eq!(behaviours, vec!["/a", "/b {(x > 0)}"]);

    let property = parse_and_validate("after (/a or /b): some (/c or /d)").unwrap();
    let forms = property.canonical_form().unwrap();
    assert_eq!(forms.len(), 2);
    for form in &forms {
        assert_eq!(form.scope().activator().map(|a| a.members().len()), Some(1));
        assert_eq!(form.pattern(), property.pattern());
    }

    let property = parse_and_validate("after (/a or /b): (/c or /d) causes /e").unwrap();
    assert_eq!(property.canonical_form().unwrap().len(), 4);

    // the second form loses the alias its predicate relies on
    let property = parse_and_validate("after (/a as A or /b): some /c {x = @A.x}").unwrap();
    let err = property.canonical_form().unwrap_err();
    assert!(err.contains(ErrorKind::UnknownReference));
}
