use proptest::prelude::*;
use protoapi_openapi::template::{render_route, tokenize, variables};

fn literal() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_.~-]{0,8}").unwrap()
}

fn field_path() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        proptest::string::string_regex("[a-z][a-z0-9_]{0,6}").unwrap(),
        1..=3,
    )
    .prop_map(|parts| parts.join("."))
}

/// One generated segment: (template text, rendered route text, bound field path).
#[derive(Debug, Clone)]
struct Segment {
    template: String,
    route: String,
    binds: Option<String>,
}

fn segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        literal().prop_map(|l| Segment {
            template: l.clone(),
            route: l,
            binds: None,
        }),
        Just(Segment {
            template: "*".to_string(),
            route: "*".to_string(),
            binds: None,
        }),
        field_path().prop_map(|p| Segment {
            template: format!("{{{p}}}"),
            route: format!("{{{p}}}"),
            binds: Some(p),
        }),
        (field_path(), literal()).prop_map(|(p, l)| Segment {
            template: format!("{{{p}={l}/*}}"),
            route: format!("{{{p}}}"),
            binds: Some(p),
        }),
        (field_path(), literal()).prop_map(|(p, l)| Segment {
            template: format!("{{{p}={l}/**}}"),
            route: format!("{{{p}}}"),
            binds: Some(p),
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn generated_templates_render_without_sub_templates(
        segments in proptest::collection::vec(segment(), 1..6),
        verb in proptest::option::of(literal()),
    ) {
        let mut template: String = segments.iter().map(|s| format!("/{}", s.template)).collect();
        let mut route: String = segments.iter().map(|s| format!("/{}", s.route)).collect();
        if let Some(verb) = &verb {
            template.push(':');
            template.push_str(verb);
            route.push(':');
            route.push_str(verb);
        }

        let tokens = tokenize(&template).expect("tokenize");
        prop_assert_eq!(render_route(&tokens), route);

        let bound: Vec<&str> = segments.iter().filter_map(|s| s.binds.as_deref()).collect();
        prop_assert_eq!(variables(&tokens), bound);
    }

    #[test]
    fn arbitrary_input_never_panics(input in "\\PC{0,40}") {
        let _ = tokenize(&input);
        let _ = tokenize(&format!("/{input}"));
    }
}
