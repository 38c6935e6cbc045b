//! Path expansion: rewrites dotted keys (`a.b.c = 1`) into nested
//! single-segment object builders, before resolution.
//!
//! Sibling fields expanding into a shared prefix merge their generated
//! objects structurally (union of fields, recursively), preserving the
//! declaration order of first appearance. Objects written literally by the
//! user are left alone; the resolver merges those later with its own
//! sequential-merge rules.

use crate::ast::{ConcatPart, Entry, Field, Key, Object, Span, Value};

/// Expands every multi-segment key in the tree. Pure and total: the result
/// contains only single-segment keys.
pub fn expand_paths(object: Object) -> Object {
    expand_object(object)
}

fn expand_object(object: Object) -> Object {
    let mut entries: Vec<Entry> = Vec::with_capacity(object.entries.len());
    // marks, per entry index, the objects generated by expansion; only those
    // are eligible for structural merging with later expansions
    let mut generated: Vec<bool> = Vec::with_capacity(object.entries.len());

    for entry in object.entries {
        match entry {
            Entry::Include(include) => {
                entries.push(Entry::Include(include));
                generated.push(false);
            }
            Entry::Field(field) => {
                let value = expand_value(field.value);
                let segments = field.key.segments();
                if segments.len() <= 1 {
                    entries.push(Entry::Field(Field { key: field.key.clone(), value, span: field.span }));
                    generated.push(false);
                    continue;
                }

                let (head, tail) = segments.split_first().expect("keys are non-empty");
                let nested = nest(tail, value, field.span);
                merge_generated_field(&mut entries, &mut generated, head, nested, field.span);
            }
        }
    }

    Object::new(entries)
}

/// Wraps `value` into a chain of single-field objects, innermost first.
fn nest(segments: &[String], value: Value, span: Span) -> Object {
    let (last, outer) = segments.split_last().expect("expansion needs at least one segment");
    let mut current = Object::new(vec![Entry::Field(Field { key: Key::of(last.clone()), value, span })]);
    for segment in outer.iter().rev() {
        current = Object::new(vec![Entry::Field(Field {
            key: Key::of(segment.clone()),
            value: Value::Object(current),
            span,
        })]);
    }
    current
}

fn merge_generated_field(entries: &mut Vec<Entry>, generated: &mut Vec<bool>, name: &str, nested: Object, span: Span) {
    let existing = entries.iter().enumerate().find_map(|(i, entry)| match entry {
        Entry::Field(f) if generated[i] && f.key.segments() == [name.to_owned()] => Some(i),
        _ => None,
    });

    match existing {
        Some(i) => {
            let Entry::Field(field) = &mut entries[i] else { unreachable!() };
            let Value::Object(target) = &mut field.value else {
                unreachable!("generated expansion values are always objects")
            };
            merge_objects(target, nested);
        }
        None => {
            entries.push(Entry::Field(Field { key: Key::of(name), value: Value::Object(nested), span }));
            generated.push(true);
        }
    }
}

/// Structural union of two generated objects: fields of `incoming` merge
/// into `target` recursively when both sides hold objects at the same key,
/// and are appended otherwise.
fn merge_objects(target: &mut Object, incoming: Object) {
    for entry in incoming.entries {
        match entry {
            Entry::Field(field) => {
                let slot = target.entries.iter_mut().find_map(|e| match e {
                    Entry::Field(existing) if existing.key == field.key => Some(existing),
                    _ => None,
                });
                match slot {
                    Some(existing) if matches!(existing.value, Value::Object(_)) && matches!(field.value, Value::Object(_)) => {
                        let Value::Object(a) = &mut existing.value else { unreachable!() };
                        let Value::Object(b) = field.value else { unreachable!() };
                        merge_objects(a, b);
                    }
                    // same leaf path defined twice; keep both definitions in
                    // order and let the resolver apply its merge rules
                    _ => target.entries.push(Entry::Field(field)),
                }
            }
            other => target.entries.push(other),
        }
    }
}

fn expand_value(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(expand_object(object)),
        Value::Array(elements) => Value::Array(elements.into_iter().map(expand_value).collect()),
        Value::Concat { first, rest } => Value::Concat {
            first: Box::new(expand_value(*first)),
            rest: rest
                .into_iter()
                .map(|part| ConcatPart { whitespace: part.whitespace, value: expand_value(part.value) })
                .collect(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn expand(input: &str) -> Object {
        expand_paths(parse(input).expect("input must parse"))
    }

    fn field<'a>(object: &'a Object, name: &str) -> &'a Field {
        object
            .entries
            .iter()
            .find_map(|e| match e {
                Entry::Field(f) if f.key.segments() == [name.to_owned()] => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no field {name}"))
    }

    #[test]
    fn expands_dotted_keys_into_nested_objects() {
        let object = expand("a.b.c = 1");
        assert_eq!(object.entries.len(), 1);

        let a = field(&object, "a");
        let Value::Object(inner) = &a.value else { panic!() };
        let b = field(inner, "b");
        let Value::Object(innermost) = &b.value else { panic!() };
        assert_eq!(field(innermost, "c").value, Value::Long(1));
    }

    #[test]
    fn sibling_expansions_merge_into_one_object() {
        let object = expand("a.b = 1\na.c = 2\nd = 3");
        assert_eq!(object.entries.len(), 2);

        let a = field(&object, "a");
        let Value::Object(inner) = &a.value else { panic!() };
        assert_eq!(inner.entries.len(), 2);
        assert_eq!(field(inner, "b").value, Value::Long(1));
        assert_eq!(field(inner, "c").value, Value::Long(2));
    }

    #[test]
    fn merge_preserves_first_appearance_order() {
        let object = expand("a.x = 1\nb = 2\na.y = 3");
        let names: Vec<&str> = object
            .entries
            .iter()
            .map(|e| match e {
                Entry::Field(f) => f.key.segments()[0].as_str(),
                _ => panic!(),
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn literal_objects_are_not_merged_with_expansions() {
        // the resolver merges these two definitions later; expansion must
        // keep them as separate entries in declaration order
        let object = expand("a = { b = 1 }\na.c = 2");
        let definitions = object
            .entries
            .iter()
            .filter(|e| matches!(e, Entry::Field(f) if f.key.segments() == ["a".to_owned()]))
            .count();
        assert_eq!(definitions, 2);
    }

    #[test]
    fn duplicate_leaf_paths_keep_both_definitions() {
        let object = expand("a.b = 1\na.b = 2");
        let a = field(&object, "a");
        let Value::Object(inner) = &a.value else { panic!() };
        assert_eq!(inner.entries.len(), 2);
    }

    #[test]
    fn expands_inside_nested_objects_and_arrays() {
        let object = expand("outer { x.y = 1 }\narr = [{ p.q = 2 }]");
        let outer = field(&object, "outer");
        let Value::Object(inner) = &outer.value else { panic!() };
        let x = field(inner, "x");
        assert!(matches!(&x.value, Value::Object(_)));

        let arr = field(&object, "arr");
        let Value::Array(elements) = &arr.value else { panic!() };
        let Value::Object(element) = &elements[0] else { panic!() };
        assert_eq!(element.entries.len(), 1);
        let p = field(element, "p");
        assert!(matches!(&p.value, Value::Object(_)));
    }
}
