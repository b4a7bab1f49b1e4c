// tests/errors.rs

use dagcoord::errors::DagError;

/// Every variant, so adding one without deciding its category fails here.
fn category(err: &DagError) -> &'static str {
    match err {
        DagError::MalformedPlan(_)
        | DagError::DagCycle(_)
        | DagError::UnknownVertex { .. }
        | DagError::DuplicateVertex(_) => "plan",
        DagError::ConfigError(_) | DagError::IoError(_) | DagError::TomlError(_) => "config",
        DagError::DispatcherStopped | DagError::NoRuntime => "dispatcher",
    }
}

#[test]
fn only_plan_errors_are_malformed_plans() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let toml_err = toml::from_str::<toml::Table>("= broken").unwrap_err();

    let errors = vec![
        DagError::MalformedPlan("empty".into()),
        DagError::DagCycle("a -> a".into()),
        DagError::UnknownVertex {
            edge: "e1".into(),
            vertex: "ghost".into(),
        },
        DagError::DuplicateVertex("a".into()),
        DagError::ConfigError("bad".into()),
        DagError::from(io),
        DagError::from(toml_err),
        DagError::DispatcherStopped,
        DagError::NoRuntime,
    ];

    for err in &errors {
        assert_eq!(err.is_malformed_plan(), category(err) == "plan", "{err:?}");
    }
}

#[test]
fn messages_name_the_offending_parts() {
    let err = DagError::UnknownVertex {
        edge: "e7".into(),
        vertex: "ghost".into(),
    };
    assert_eq!(err.to_string(), "Edge 'e7' references unknown vertex 'ghost'");
    assert_eq!(
        DagError::DispatcherStopped.to_string(),
        "Dispatcher has been stopped"
    );
}
