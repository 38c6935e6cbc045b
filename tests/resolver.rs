use rhocon::ast::IncludePath;
use rhocon::{parse, resolve, Config, ConfigError, IncludeMap, Origin, Value};
use std::time::Duration;

fn resolve_str(input: &str) -> Result<Config, ConfigError> {
    resolve(parse(input).unwrap(), Origin::default(), Config::default(), &IncludeMap::new())
}

fn config(input: &str) -> Config {
    resolve_str(input).expect("document must resolve")
}

#[test]
fn duplicate_object_definitions_merge_their_fields() {
    let config = config("a = { c = 5 }\na = { d = 7 }");
    assert_eq!(config.get::<i64>("a.c").unwrap(), 5);
    assert_eq!(config.get::<i64>("a.d").unwrap(), 7);
}

#[test]
fn later_definitions_win_on_sub_key_collision() {
    let config = config("a = { x = 1, y = 1 }\na = { x = 2 }");
    assert_eq!(config.get::<i64>("a.x").unwrap(), 2);
    assert_eq!(config.get::<i64>("a.y").unwrap(), 1);
}

#[test]
fn intervening_scalar_discards_earlier_object_fields() {
    let config = config("a = { c = 5 }\na = 7\na = { d = 7 }");
    assert!(config.get_opt::<i64>("a.c").unwrap().is_none());
    assert_eq!(config.get::<i64>("a.d").unwrap(), 7);
}

#[test]
fn substitution_order_is_irrelevant() {
    let backward = config("a = 5\nb = ${a}");
    let forward = config("a = ${b}\nb = 5");
    assert_eq!(backward.get::<i64>("b").unwrap(), 5);
    assert_eq!(forward.get::<i64>("a").unwrap(), 5);
}

#[test]
fn substitution_through_a_substituted_object() {
    let config = config("a = { x = 1 }\nb = ${a}\nb = { y = 2 }");
    assert_eq!(config.get::<i64>("b.x").unwrap(), 1);
    assert_eq!(config.get::<i64>("b.y").unwrap(), 2);
}

#[test]
fn missing_required_reference_is_an_error() {
    let err = resolve_str("b = ${x}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "One or more errors resolving configuration: 'b': Missing required reference: 'x'"
    );
}

#[test]
fn optional_reference_to_missing_path_removes_the_field() {
    let config = config("a = ${?missing}\nb = 1");
    assert!(config.get_opt::<i64>("a").unwrap().is_none());
    assert_eq!(config.get::<i64>("b").unwrap(), 1);
}

#[test]
fn optional_reference_vanishes_from_a_concatenation() {
    let config = config("greeting = \"Hello\" ${?name}");
    assert_eq!(config.get::<String>("greeting").unwrap(), "Hello");
}

#[test]
fn indirect_cycle_reports_a_circular_reference() {
    let err = resolve_str("a = ${c}\nb = ${a}\nc = ${b}").unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("One or more errors resolving configuration: "), "{message}");
    assert!(message.contains("Circular Reference involving path "), "{message}");
}

#[test]
fn independent_errors_are_collected_in_order() {
    let err = resolve_str("a = ${x}\nb = ${y}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "One or more errors resolving configuration: \
         'a': Missing required reference: 'x', \
         'b': Missing required reference: 'y'"
    );
}

#[test]
fn adjacent_arrays_concatenate_in_order() {
    let config = config("a = [1, 2] [3, 4]");
    assert_eq!(config.get::<Vec<i64>>("a").unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn append_operator_extends_an_array() {
    let config = config("a = [1, 2]\na += 3");
    assert_eq!(config.get::<Vec<i64>>("a").unwrap(), vec![1, 2, 3]);
}

#[test]
fn append_to_an_undefined_field_starts_a_new_array() {
    let config = config("a += 1\na += 2");
    assert_eq!(config.get::<Vec<i64>>("a").unwrap(), vec![1, 2]);
}

#[test]
fn adjacent_objects_merge_left_to_right() {
    let config = config("a = { x = 1, z = 1 } { y = 2, z = 2 }");
    assert_eq!(config.get::<i64>("a.x").unwrap(), 1);
    assert_eq!(config.get::<i64>("a.y").unwrap(), 2);
    assert_eq!(config.get::<i64>("a.z").unwrap(), 2);
}

#[test]
fn string_concatenation_preserves_whitespace() {
    let config = config("a = foo   bar\nb = ${a} baz");
    assert_eq!(config.get::<String>("a").unwrap(), "foo   bar");
    assert_eq!(config.get::<String>("b").unwrap(), "foo   bar baz");
}

#[test]
fn scalars_join_through_their_literal_text() {
    let config = config("port = 8080\nbind = localhost ${port}");
    assert_eq!(config.get::<String>("bind").unwrap(), "localhost 8080");
}

#[test]
fn mixed_category_concatenation_is_an_error() {
    let err = resolve_str("a = { x = 1 }\nb = [1, 2] ${a} [3, 4]").unwrap_err();
    assert_eq!(
        err.to_string(),
        "One or more errors resolving configuration: 'b': Invalid concatenation of values. \
         It must contain either only objects, only arrays or only simple values"
    );
}

#[test]
fn resolving_a_resolved_document_is_idempotent() {
    let input = "a = 1\nb = \"two\"\nc = [true, false]\nd = { e = null }";
    let once = config(input);
    let twice = config(input);
    assert_eq!(once.root(), twice.root());
}

#[test]
fn optional_missing_include_leaves_the_object_unchanged() {
    let config = config("include file(\"absent.conf\")\na = 1");
    assert_eq!(config.get::<i64>("a").unwrap(), 1);
    assert_eq!(config.root().len(), 1);
}

#[test]
fn required_missing_include_is_an_error() {
    let err = resolve_str("include required(file(\"absent.conf\"))").unwrap_err();
    assert_eq!(
        err.to_string(),
        "One or more errors resolving configuration: '<RootKey>': Missing required include 'absent.conf'"
    );
}

#[test]
fn include_loader_errors_surface_verbatim() {
    let mut includes = IncludeMap::new();
    includes.insert(IncludePath::Url("http://example.org/app.conf".to_owned()), Err("connection refused".to_owned()));

    let tree = parse("include url(\"http://example.org/app.conf\")").unwrap();
    let err = resolve(tree, Origin::default(), Config::default(), &includes).unwrap_err();
    assert_eq!(
        err.to_string(),
        "One or more errors resolving configuration: \
         '<RootKey>': Error including 'http://example.org/app.conf': connection refused"
    );
}

#[test]
fn included_fields_merge_with_the_surrounding_document() {
    let mut includes = IncludeMap::new();
    includes.insert(IncludePath::File("defaults.conf".to_owned()), Ok(parse("port = 80\nhost = localhost").unwrap()));

    let tree = parse("include file(\"defaults.conf\")\nport = 8080").unwrap();
    let config = resolve(tree, Origin::default(), Config::default(), &includes).unwrap();
    assert_eq!(config.get::<i64>("port").unwrap(), 8080);
    assert_eq!(config.get::<String>("host").unwrap(), "localhost");
}

#[test]
fn includes_splice_inside_nested_objects() {
    let mut includes = IncludeMap::new();
    includes.insert(IncludePath::Classpath("inner.conf".to_owned()), Ok(parse("x = 1").unwrap()));

    let tree = parse("outer { include classpath(\"inner.conf\")\n y = 2 }").unwrap();
    let config = resolve(tree, Origin::default(), Config::default(), &includes).unwrap();
    assert_eq!(config.get::<i64>("outer.x").unwrap(), 1);
    assert_eq!(config.get::<i64>("outer.y").unwrap(), 2);
}

#[test]
fn fallback_supplies_substitution_targets() {
    let defaults = config("defaults { retries = 4 }");
    let tree = parse("client { retries = ${defaults.retries} }").unwrap();
    let resolved = resolve(tree, Origin::default(), defaults, &IncludeMap::new()).unwrap();
    assert_eq!(resolved.get::<i64>("client.retries").unwrap(), 4);
}

#[test]
fn sample_document_resolves_end_to_end() {
    let config = config(include_str!("resources/app.conf"));

    assert_eq!(config.get::<String>("app.description").unwrap(), "demo service");
    assert_eq!(config.get::<String>("app.version").unwrap(), "1.4.2");
    assert_eq!(config.get::<i64>("server.admin-port").unwrap(), 8080);
    assert_eq!(config.get::<i64>("server.backlog").unwrap(), 128);
    assert_eq!(config.get::<Duration>("server.timeout").unwrap(), Duration::from_secs(30));
    assert_eq!(
        config.get::<Vec<String>>("features").unwrap(),
        vec!["metrics".to_owned(), "tracing".to_owned(), "logging".to_owned()]
    );
    assert_eq!(config.get::<i64>("limits.connections").unwrap(), 512);
    assert_eq!(config.get::<i64>("limits.requests").unwrap(), 64);
}

#[test]
fn null_value_round_trips() {
    let config = config("a = null");
    assert_eq!(config.get::<Value>("a").unwrap(), Value::Null);
}
