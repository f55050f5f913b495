use serde_json::{Map, Value};

use crate::entities::{Relation, RelationTarget, DEFAULT_NAMESPACE};

/// Shorthand spec key, relation type it produces and the kind assumed when a reference omits it.
/// Keys are resolved in this order.
const SHORTHANDS: [(&str, &str, &str); 6] = [
    ("dependsOn", "dependsOn", "Component"),
    ("dependencyOf", "dependencyOf", "Component"),
    ("providesApis", "providesApi", "API"),
    ("consumesApis", "consumesApi", "API"),
    ("partOf", "partOf", "System"),
    ("hasPart", "hasPart", "Component"),
];

/// Parse an entity reference of the form `[<kind>:][<namespace>/]<name>`.
///
/// The kind is everything before the first `:` and the namespace everything before the first
/// `/` that follows. Missing parts fall back to `default_kind` and the default namespace.
pub fn parse_entity_ref(reference: &str, default_kind: &str) -> RelationTarget {
    let (kind, rest) = match reference.split_once(':') {
        Some((kind, rest)) if !kind.is_empty() => (kind, rest),
        Some((_, rest)) => (default_kind, rest),
        None => (default_kind, reference),
    };

    let (namespace, name) = match rest.split_once('/') {
        Some((namespace, name)) => (namespace, name),
        None => (DEFAULT_NAMESPACE, rest),
    };

    RelationTarget {
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

/// Build relations from the shorthand keys of a raw component spec.
///
/// Only lists are considered and non-string items within them are ignored.
pub fn resolve_shorthand_relations(spec: &Map<String, Value>) -> Vec<Relation> {
    let mut relations = Vec::new();
    for (key, relation_type, default_kind) in SHORTHANDS {
        let Some(Value::Array(references)) = spec.get(key) else {
            continue;
        };

        relations.extend(
            references
                .iter()
                .filter_map(Value::as_str)
                .map(|reference| Relation {
                    relation_type: relation_type.to_string(),
                    target: parse_entity_ref(reference, default_kind),
                }),
        );
    }

    relations
}
