//! The evaluation core: turns an unresolved builder tree into resolved
//! values.
//!
//! Resolution is demand-driven: each field path is evaluated at most once,
//! memoized in a cell map whose "in progress" state doubles as the cycle
//! detector. Duplicate definitions of one path merge sequentially (objects
//! merge recursively, a later non-object discards everything before it),
//! concatenations evaluate per category, and substitutions resolve
//! identically whether they point forward or backward in the document.
//!
//! Includes are spliced from a caller-supplied [`IncludeMap`] before
//! evaluation starts; the resolver itself performs no I/O. Errors for
//! distinct fields are collected and reported together.

use crate::ast::{self, Entry, Field, Key};
use crate::config::{Config, Origin};
use crate::error::{ConfigError, ResolverError, ResolverErrorKind, ResolverErrors};
use crate::expand::expand_paths;
use crate::value;
use std::collections::HashMap;
use std::rc::Rc;

/// Pre-loaded include sources, keyed by the include descriptor. Loading
/// (filesystem, classpath, HTTP) happens outside the engine; a loader
/// failure is recorded here as the error message to surface.
#[derive(Debug, Default)]
pub struct IncludeMap {
    entries: HashMap<ast::IncludePath, Result<ast::Object, String>>,
}

impl IncludeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: ast::IncludePath, loaded: Result<ast::Object, String>) {
        self.entries.insert(path, loaded);
    }

    fn get(&self, path: &ast::IncludePath) -> Option<&Result<ast::Object, String>> {
        self.entries.get(path)
    }
}

/// Resolves a builder tree into a [`Config`].
///
/// `fallback` is consulted for substitution targets absent from the tree
/// and becomes the fallback of the returned config. The call is a pure
/// function of its inputs; resolving the same tree twice yields the same
/// result.
pub fn resolve(
    root: ast::Object,
    origin: Origin,
    fallback: Config,
    includes: &IncludeMap,
) -> Result<Config, ConfigError> {
    tracing::debug!(origin = %origin, "resolving configuration");

    let mut errors = Vec::new();
    let mut active = Vec::new();
    let spliced = splice_object(root, includes, &Key::default(), &mut active, &mut errors);
    let expanded = expand_paths(spliced);

    let mut resolver = Resolver {
        root: Rc::new(expanded),
        fallback: &fallback,
        cells: HashMap::new(),
        errors,
    };
    let object = resolver.resolve_root();
    let errors = resolver.errors;

    if errors.is_empty() {
        Ok(Config::resolved(object, origin, Some(fallback)))
    } else {
        Err(ResolverErrors(errors).into())
    }
}

/// Replaces every include directive with the fields of its loaded source,
/// at the position of the directive. Included objects may contain further
/// includes; `active` is the stack of include descriptors currently being
/// spliced, used to reject circular inclusion.
fn splice_object(
    object: ast::Object,
    includes: &IncludeMap,
    at: &Key,
    active: &mut Vec<ast::IncludePath>,
    errors: &mut Vec<ResolverError>,
) -> ast::Object {
    let mut entries = Vec::with_capacity(object.entries.len());
    for entry in object.entries {
        match entry {
            Entry::Field(field) => {
                let mut path = at.clone();
                for segment in field.key.segments() {
                    path = path.child(segment);
                }
                let value = splice_value(field.value, includes, &path, active, errors);
                entries.push(Entry::Field(Field { key: field.key, value, span: field.span }));
            }
            Entry::Include(include) => {
                let resource = include.path.source().to_owned();
                match includes.get(&include.path) {
                    None if include.required => {
                        errors.push(ResolverError::new(at.clone(), ResolverErrorKind::MissingInclude(resource)));
                    }
                    None => {}
                    Some(Err(message)) => {
                        errors.push(ResolverError::new(
                            at.clone(),
                            ResolverErrorKind::IncludeLoad { resource, message: message.clone() },
                        ));
                    }
                    Some(Ok(included)) => {
                        if active.contains(&include.path) {
                            errors.push(ResolverError::new(
                                at.clone(),
                                ResolverErrorKind::IncludeLoad { resource, message: "circular include".to_owned() },
                            ));
                        } else {
                            tracing::trace!(source = %resource, "splicing include");
                            active.push(include.path.clone());
                            let spliced = splice_object(included.clone(), includes, at, active, errors);
                            entries.extend(spliced.entries);
                            active.pop();
                        }
                    }
                }
            }
        }
    }
    ast::Object::new(entries)
}

fn splice_value(
    value: ast::Value,
    includes: &IncludeMap,
    at: &Key,
    active: &mut Vec<ast::IncludePath>,
    errors: &mut Vec<ResolverError>,
) -> ast::Value {
    match value {
        ast::Value::Object(object) => ast::Value::Object(splice_object(object, includes, at, active, errors)),
        ast::Value::Array(elements) => ast::Value::Array(
            elements.into_iter().map(|e| splice_value(e, includes, at, active, errors)).collect(),
        ),
        ast::Value::Concat { first, rest } => ast::Value::Concat {
            first: Box::new(splice_value(*first, includes, at, active, errors)),
            rest: rest
                .into_iter()
                .map(|p| ast::ConcatPart {
                    whitespace: p.whitespace,
                    value: splice_value(p.value, includes, at, active, errors),
                })
                .collect(),
        },
        other => other,
    }
}

/// Outcome of evaluating one path or builder value.
#[derive(Debug, Clone)]
enum Lookup {
    Value(value::Value),
    /// Not present: undefined path, or an optional substitution whose
    /// target is missing. An absent field is omitted from its object.
    Absent,
    /// An error was already recorded for this evaluation; callers must not
    /// report follow-up errors of their own.
    Failed,
}

/// Memoization state of one path.
enum Cell {
    InProgress,
    Done(Lookup),
}

/// One definition of a path, gathered from the builder tree in declaration
/// order.
enum Def {
    /// A literal object body; its fields resolve through path lookup so
    /// that duplicate definitions elsewhere in the tree merge in.
    Object(Vec<Entry>),
    /// Any other builder value at the path.
    Value(ast::Value),
    /// A value reached by navigating through an already-resolved parent,
    /// e.g. a parent defined via substitution.
    Resolved(value::Value),
}

struct Resolver<'a> {
    root: Rc<ast::Object>,
    fallback: &'a Config,
    cells: HashMap<Key, Cell>,
    errors: Vec<ResolverError>,
}

impl Resolver<'_> {
    fn resolve_root(&mut self) -> value::Object {
        let root = self.root.clone();
        self.resolve_object(&root.entries, &Key::default())
    }

    /// Resolves the fields of one object body. Child values go through
    /// `lookup`, which folds every definition of the child path in the
    /// whole tree, so duplicate objects merge no matter where they appear.
    fn resolve_object(&mut self, entries: &[Entry], base: &Key) -> value::Object {
        let mut object = value::Object::default();
        let mut seen: Vec<&str> = Vec::new();
        for entry in entries {
            let Entry::Field(field) = entry else { continue };
            let [name] = field.key.segments() else { continue };
            if seen.contains(&name.as_str()) {
                continue;
            }
            seen.push(name);
            match self.lookup(&base.child(name)) {
                Lookup::Value(v) => object.set(name, v),
                Lookup::Absent | Lookup::Failed => {}
            }
        }
        object
    }

    /// Memoized path evaluation; the in-progress marking detects cycles.
    fn lookup(&mut self, key: &Key) -> Lookup {
        match self.cells.get(key) {
            Some(Cell::Done(lookup)) => return lookup.clone(),
            Some(Cell::InProgress) => {
                self.report(ResolverError::new(
                    key.clone(),
                    ResolverErrorKind::CircularReference(key.clone()),
                ));
                return Lookup::Failed;
            }
            None => {}
        }
        self.cells.insert(key.clone(), Cell::InProgress);
        let result = self.compute(key);
        self.cells.insert(key.clone(), Cell::Done(result.clone()));
        result
    }

    /// Folds every definition of `key` in declaration order: objects merge,
    /// a later non-object replaces the accumulator, an absent definition
    /// leaves it unchanged. The accumulator is also the target of
    /// self-references in later definitions.
    fn compute(&mut self, key: &Key) -> Lookup {
        let defs = self.defs_of(key.segments());
        let mut acc: Option<value::Value> = None;
        let mut failed = false;
        for def in defs {
            match def {
                Def::Object(entries) => {
                    let object = self.resolve_object(&entries, key);
                    acc = combine(acc, value::Value::Object(object));
                }
                Def::Resolved(v) => acc = combine(acc, v),
                Def::Value(v) => match self.eval_value(&v, key, acc.as_ref()) {
                    Lookup::Value(v) => acc = combine(acc, v),
                    Lookup::Absent => {}
                    Lookup::Failed => failed = true,
                },
            }
        }
        if failed {
            return Lookup::Failed;
        }
        match acc {
            Some(v) => Lookup::Value(v),
            None => Lookup::Absent,
        }
    }

    /// Collects the definitions of a path by structural descent from the
    /// root. A literal non-object definition discards everything collected
    /// before it; a parent defined by a substitution or concatenation is
    /// evaluated so navigation can continue through its resolved object.
    fn defs_of(&mut self, segments: &[String]) -> Vec<Def> {
        let Some((last, parent)) = segments.split_last() else {
            return vec![Def::Object(self.root.entries.clone())];
        };
        let parent_key = Key::new(parent.to_vec());

        let mut out = Vec::new();
        for def in self.defs_of(parent) {
            match def {
                Def::Object(entries) => {
                    for entry in entries {
                        let Entry::Field(field) = entry else { continue };
                        let [name] = field.key.segments() else { continue };
                        if name != last {
                            continue;
                        }
                        match field.value {
                            ast::Value::Object(o) => out.push(Def::Object(o.entries)),
                            lit @ (ast::Value::Null
                            | ast::Value::Bool(_)
                            | ast::Value::Long(_)
                            | ast::Value::Double(_)
                            | ast::Value::String(_)
                            | ast::Value::Array(_)) => {
                                out.clear();
                                out.push(Def::Value(lit));
                            }
                            other => out.push(Def::Value(other)),
                        }
                    }
                }
                Def::Value(v) => match self.eval_value(&v, &parent_key, None) {
                    Lookup::Value(value::Value::Object(obj)) => {
                        if let Some(child) = obj.get(last) {
                            out.push(Def::Resolved(child.clone()));
                        }
                    }
                    Lookup::Value(_) => out.clear(),
                    Lookup::Absent | Lookup::Failed => {}
                },
                Def::Resolved(value::Value::Object(obj)) => {
                    if let Some(child) = obj.get(last) {
                        out.push(Def::Resolved(child.clone()));
                    }
                }
                Def::Resolved(_) => out.clear(),
            }
        }
        out
    }

    /// Evaluates one builder value. `at` is the path of the field being
    /// defined, used for error attribution and for recognizing an explicit
    /// self-reference; `current` is the fold accumulator self-references
    /// resolve to.
    fn eval_value(&mut self, value: &ast::Value, at: &Key, current: Option<&value::Value>) -> Lookup {
        match value {
            ast::Value::Null => Lookup::Value(value::Value::Null),
            ast::Value::Bool(b) => Lookup::Value(value::Value::Bool(*b)),
            ast::Value::Long(n) => Lookup::Value(value::Value::Long(*n)),
            ast::Value::Double(n) => Lookup::Value(value::Value::Double(*n)),
            ast::Value::String(s) => Lookup::Value(value::Value::String(s.clone())),
            ast::Value::Array(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    match self.eval_value(element, at, None) {
                        Lookup::Value(v) => out.push(v),
                        Lookup::Absent => {}
                        Lookup::Failed => return Lookup::Failed,
                    }
                }
                Lookup::Value(value::Value::Array(out))
            }
            ast::Value::Object(object) => self.resolve_inline(object, at),
            ast::Value::Concat { first, rest } => self.eval_concat(first, rest, at, current),
            ast::Value::Substitution { path, optional, .. } => {
                if path == at {
                    return match current {
                        Some(v) => Lookup::Value(v.clone()),
                        None => Lookup::Absent,
                    };
                }
                match self.lookup(path) {
                    Lookup::Value(v) => Lookup::Value(v),
                    Lookup::Failed => Lookup::Failed,
                    Lookup::Absent => {
                        let fallback = self.fallback;
                        if let Some(v) = fallback.find(path.segments()) {
                            return Lookup::Value(v.clone());
                        }
                        if *optional {
                            Lookup::Absent
                        } else {
                            self.report(ResolverError::new(
                                at.clone(),
                                ResolverErrorKind::MissingReference(path.clone()),
                            ));
                            Lookup::Failed
                        }
                    }
                }
            }
            ast::Value::SelfReference => match current {
                Some(v) => Lookup::Value(v.clone()),
                None => Lookup::Absent,
            },
        }
    }

    /// Resolves an object that is not addressable by path, e.g. an array
    /// element or a concatenation part. Duplicate fields fold locally with
    /// the same merge-or-replace rule as path definitions.
    fn resolve_inline(&mut self, object: &ast::Object, at: &Key) -> Lookup {
        let mut out = value::Object::default();
        let mut failed = false;
        for entry in &object.entries {
            let Entry::Field(field) = entry else { continue };
            let [name] = field.key.segments() else { continue };
            let current = out.get(name).cloned();
            match self.eval_value(&field.value, &at.child(name), current.as_ref()) {
                Lookup::Value(v) => {
                    let folded = match (current, v) {
                        (Some(value::Value::Object(mut existing)), value::Value::Object(incoming)) => {
                            existing.merge(incoming);
                            value::Value::Object(existing)
                        }
                        (_, v) => v,
                    };
                    out.set(name, folded);
                }
                Lookup::Absent => {}
                Lookup::Failed => failed = true,
            }
        }
        if failed {
            Lookup::Failed
        } else {
            Lookup::Value(value::Value::Object(out))
        }
    }

    /// Evaluates a concatenation: all arrays concatenate, all objects merge
    /// left to right, all scalars join via their literal text with the
    /// original whitespace. An absent part vanishes together with its
    /// adjoining separator; mixing categories is an error.
    fn eval_concat(
        &mut self,
        first: &ast::Value,
        rest: &[ast::ConcatPart],
        at: &Key,
        current: Option<&value::Value>,
    ) -> Lookup {
        let mut parts: Vec<(Option<String>, value::Value)> = Vec::new();
        match self.eval_value(first, at, current) {
            Lookup::Value(v) => parts.push((None, v)),
            Lookup::Absent => {}
            Lookup::Failed => return Lookup::Failed,
        }
        for part in rest {
            match self.eval_value(&part.value, at, current) {
                Lookup::Value(v) => parts.push((Some(part.whitespace.clone()), v)),
                Lookup::Absent => {}
                Lookup::Failed => return Lookup::Failed,
            }
        }

        if parts.is_empty() {
            return Lookup::Absent;
        }
        if parts.len() == 1 {
            let (_, only) = parts.remove(0);
            return Lookup::Value(only);
        }

        if parts.iter().all(|(_, v)| matches!(v, value::Value::Array(_))) {
            let mut out = Vec::new();
            for (_, v) in parts {
                let value::Value::Array(elements) = v else { unreachable!() };
                out.extend(elements);
            }
            return Lookup::Value(value::Value::Array(out));
        }

        if parts.iter().all(|(_, v)| matches!(v, value::Value::Object(_))) {
            let mut out = value::Object::default();
            for (_, v) in parts {
                let value::Value::Object(object) = v else { unreachable!() };
                out.merge(object);
            }
            return Lookup::Value(value::Value::Object(out));
        }

        let mut text = String::new();
        for (i, (whitespace, v)) in parts.iter().enumerate() {
            let Some(literal) = v.literal_text() else {
                self.report(ResolverError::new(at.clone(), ResolverErrorKind::InvalidConcat));
                return Lookup::Failed;
            };
            if i > 0 {
                text.push_str(whitespace.as_deref().unwrap_or(" "));
            }
            text.push_str(&literal);
        }
        Lookup::Value(value::Value::String(text))
    }

    /// The same field error can surface through navigation and through the
    /// final fold; it is recorded once.
    fn report(&mut self, error: ResolverError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }
}

fn combine(acc: Option<value::Value>, incoming: value::Value) -> Option<value::Value> {
    match (acc, incoming) {
        (Some(value::Value::Object(mut existing)), value::Value::Object(incoming)) => {
            existing.merge(incoming);
            Some(value::Value::Object(existing))
        }
        (_, incoming) => Some(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::IncludePath;
    use crate::parser::parse;

    fn resolve_str(input: &str) -> Result<Config, ConfigError> {
        let tree = parse(input).expect("input must parse");
        resolve(tree, Origin::default(), Config::default(), &IncludeMap::new())
    }

    fn root_value(config: &Config, path: &str) -> Option<value::Value> {
        config.root().get_path(Key::parse(path).segments()).cloned()
    }

    #[test]
    fn merges_duplicate_object_definitions() {
        let config = resolve_str("a = { c = 5 }\na = { d = 7 }").unwrap();
        assert_eq!(root_value(&config, "a.c"), Some(value::Value::Long(5)));
        assert_eq!(root_value(&config, "a.d"), Some(value::Value::Long(7)));
    }

    #[test]
    fn later_scalar_discards_earlier_object_fields() {
        let config = resolve_str("a = { c = 5 }\na = 7\na = { d = 7 }").unwrap();
        assert_eq!(root_value(&config, "a.c"), None);
        assert_eq!(root_value(&config, "a.d"), Some(value::Value::Long(7)));
    }

    #[test]
    fn substitutions_resolve_forward_and_backward() {
        let config = resolve_str("a = ${b}\nb = 5").unwrap();
        assert_eq!(root_value(&config, "a"), Some(value::Value::Long(5)));

        let config = resolve_str("x = 5\ny = ${x}").unwrap();
        assert_eq!(root_value(&config, "y"), Some(value::Value::Long(5)));
    }

    #[test]
    fn absent_optional_substitution_removes_the_field() {
        let config = resolve_str("a = ${?missing}\nb = 1").unwrap();
        assert_eq!(root_value(&config, "a"), None);
        assert_eq!(root_value(&config, "b"), Some(value::Value::Long(1)));
    }

    #[test]
    fn append_extends_a_previously_defined_array() {
        let config = resolve_str("a = [1, 2]\na += 3").unwrap();
        assert_eq!(
            root_value(&config, "a"),
            Some(value::Value::Array(vec![value::Value::Long(1), value::Value::Long(2), value::Value::Long(3)]))
        );
    }

    #[test]
    fn missing_reference_names_field_and_target() {
        let err = resolve_str("b = ${x}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "One or more errors resolving configuration: 'b': Missing required reference: 'x'"
        );
    }

    #[test]
    fn indirect_cycle_is_detected_once() {
        let err = resolve_str("a = ${c}\nb = ${a}\nc = ${b}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Circular Reference involving path"), "{message}");
        assert_eq!(message.matches("Circular Reference").count(), 1);
    }

    #[test]
    fn include_splices_fields_at_directive_position() {
        let mut includes = IncludeMap::new();
        includes.insert(IncludePath::File("x.conf".to_owned()), Ok(parse("p = 1").unwrap()));

        let tree = parse("include file(\"x.conf\")\nq = 2").unwrap();
        let config = resolve(tree, Origin::default(), Config::default(), &includes).unwrap();
        assert_eq!(root_value(&config, "p"), Some(value::Value::Long(1)));
        assert_eq!(root_value(&config, "q"), Some(value::Value::Long(2)));
    }

    #[test]
    fn missing_required_include_fails() {
        let err = resolve_str("include required(file(\"x.conf\"))").unwrap_err();
        assert_eq!(
            err.to_string(),
            "One or more errors resolving configuration: '<RootKey>': Missing required include 'x.conf'"
        );
    }

    #[test]
    fn circular_includes_are_rejected() {
        let mut includes = IncludeMap::new();
        includes.insert(IncludePath::File("a.conf".to_owned()), Ok(parse("include file(\"b.conf\")\nx = 1").unwrap()));
        includes.insert(IncludePath::File("b.conf".to_owned()), Ok(parse("include file(\"a.conf\")\ny = 2").unwrap()));

        let tree = parse("include file(\"a.conf\")").unwrap();
        let err = resolve(tree, Origin::default(), Config::default(), &includes).unwrap_err();
        assert!(err.to_string().contains("circular include"), "{err}");
    }

    #[test]
    fn same_source_through_different_include_kinds_is_not_circular() {
        let mut includes = IncludeMap::new();
        includes.insert(
            IncludePath::Classpath("shared.conf".to_owned()),
            Ok(parse("include file(\"shared.conf\")\nx = 1").unwrap()),
        );
        includes.insert(IncludePath::File("shared.conf".to_owned()), Ok(parse("y = 2").unwrap()));

        let tree = parse("include classpath(\"shared.conf\")").unwrap();
        let config = resolve(tree, Origin::default(), Config::default(), &includes).unwrap();
        assert_eq!(root_value(&config, "x"), Some(value::Value::Long(1)));
        assert_eq!(root_value(&config, "y"), Some(value::Value::Long(2)));
    }
}
