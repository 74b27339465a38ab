/// Compatibility Engine (C2): decides whether a candidate schema may
/// follow the existing version(s) of a subject under a named policy.
use crate::canonical::{CanonicalSchema, SchemaNode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompatibilityPolicy {
    None,
    Backward,
    Forward,
    Full,
}

impl fmt::Display for CompatibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompatibilityPolicy::None => "NONE",
            CompatibilityPolicy::Backward => "BACKWARD",
            CompatibilityPolicy::Forward => "FORWARD",
            CompatibilityPolicy::Full => "FULL",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CompatibilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(CompatibilityPolicy::None),
            "BACKWARD" => Ok(CompatibilityPolicy::Backward),
            "FORWARD" => Ok(CompatibilityPolicy::Forward),
            "FULL" => Ok(CompatibilityPolicy::Full),
            other => Err(format!("unknown compatibility policy: {}", other)),
        }
    }
}

/// Outcome of a compatibility check, with a human-readable reason on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub reason: Option<String>,
}

impl CompatibilityResult {
    fn ok() -> Self {
        Self {
            compatible: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            compatible: false,
            reason: Some(reason.into()),
        }
    }

    fn merge(self, other: Self) -> Self {
        if !self.compatible {
            self
        } else {
            other
        }
    }
}

/// Check `candidate` against the latest existing schema under `policy`.
/// `existing_versions` only ever needs the latest prior schema: the
/// ordered-list framing in the spec's surface reduces, for the structural
/// pairwise check this engine implements, to "the latest existing".
pub fn check(
    candidate: &CanonicalSchema,
    latest_existing: &CanonicalSchema,
    policy: CompatibilityPolicy,
) -> CompatibilityResult {
    match policy {
        CompatibilityPolicy::None => CompatibilityResult::ok(),
        CompatibilityPolicy::Backward => {
            check_reader_writer(&candidate.tree, &latest_existing.tree, "backward")
        }
        CompatibilityPolicy::Forward => {
            check_reader_writer(&latest_existing.tree, &candidate.tree, "forward")
        }
        CompatibilityPolicy::Full => {
            let backward = check_reader_writer(&candidate.tree, &latest_existing.tree, "backward");
            let forward = check_reader_writer(&latest_existing.tree, &candidate.tree, "forward");
            backward.merge(forward)
        }
    }
}

/// `reader` must be able to read data written with `writer`'s schema.
fn check_reader_writer(reader: &SchemaNode, writer: &SchemaNode, direction: &str) -> CompatibilityResult {
    match (reader, writer) {
        (SchemaNode::Record { fields: reader_fields, name: reader_name, .. },
         SchemaNode::Record { fields: writer_fields, .. }) => {
            for reader_field in reader_fields {
                match writer_fields.iter().find(|f| f.name == reader_field.name) {
                    Some(writer_field) => {
                        let field_check = check_reader_writer(&reader_field.ty, &writer_field.ty, direction);
                        if !field_check.compatible {
                            return CompatibilityResult::fail(format!(
                                "{} incompatibility in record '{}', field '{}': {}",
                                direction,
                                reader_name,
                                reader_field.name,
                                field_check.reason.unwrap_or_default()
                            ));
                        }
                    }
                    None => {
                        if reader_field.default.is_none() {
                            return CompatibilityResult::fail(format!(
                                "{} incompatibility in record '{}': field '{}' has no writer value and no default",
                                direction, reader_name, reader_field.name
                            ));
                        }
                    }
                }
            }
            CompatibilityResult::ok()
        }
        (SchemaNode::Enum { symbols: reader_symbols, name, .. }, SchemaNode::Enum { symbols: writer_symbols, .. }) => {
            for sym in writer_symbols {
                if !reader_symbols.contains(sym) {
                    return CompatibilityResult::fail(format!(
                        "{} incompatibility in enum '{}': writer symbol '{}' missing from reader",
                        direction, name, sym
                    ));
                }
            }
            CompatibilityResult::ok()
        }
        (SchemaNode::Array { items: reader_items }, SchemaNode::Array { items: writer_items }) => {
            check_reader_writer(reader_items, writer_items, direction)
        }
        (SchemaNode::Map { values: reader_values }, SchemaNode::Map { values: writer_values }) => {
            check_reader_writer(reader_values, writer_values, direction)
        }
        (SchemaNode::Fixed { size: reader_size, name, .. }, SchemaNode::Fixed { size: writer_size, .. }) => {
            if reader_size == writer_size {
                CompatibilityResult::ok()
            } else {
                CompatibilityResult::fail(format!(
                    "{} incompatibility in fixed '{}': size {} != {}",
                    direction, name, reader_size, writer_size
                ))
            }
        }
        (reader_prim, writer_prim) if is_primitive(reader_prim) && is_primitive(writer_prim) => {
            if promotable(writer_prim, reader_prim) {
                CompatibilityResult::ok()
            } else {
                CompatibilityResult::fail(format!(
                    "{} incompatibility: writer type {:?} not promotable to reader type {:?}",
                    direction, writer_prim, reader_prim
                ))
            }
        }
        (reader_node, writer_node) => CompatibilityResult::fail(format!(
            "{} incompatibility: reader shape {:?} does not match writer shape {:?}",
            direction, reader_node, writer_node
        )),
    }
}

fn is_primitive(node: &SchemaNode) -> bool {
    matches!(
        node,
        SchemaNode::Null
            | SchemaNode::Boolean
            | SchemaNode::Int
            | SchemaNode::Long
            | SchemaNode::Float
            | SchemaNode::Double
            | SchemaNode::String
            | SchemaNode::Bytes
    )
}

/// Fixed promotion table: numeric widening and string<->bytes.
fn promotable(writer: &SchemaNode, reader: &SchemaNode) -> bool {
    use SchemaNode::*;
    if writer == reader {
        return true;
    }
    matches!(
        (writer, reader),
        (Int, Long)
            | (Int, Float)
            | (Int, Double)
            | (Long, Float)
            | (Long, Double)
            | (Float, Double)
            | (String, Bytes)
            | (Bytes, String)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::parse;

    fn schema(text: &str) -> CanonicalSchema {
        parse(text).unwrap()
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("backward".parse::<CompatibilityPolicy>().unwrap(), CompatibilityPolicy::Backward);
        assert_eq!("FULL".parse::<CompatibilityPolicy>().unwrap(), CompatibilityPolicy::Full);
        assert!("bogus".parse::<CompatibilityPolicy>().is_err());
    }

    #[test]
    fn none_policy_is_always_compatible() {
        let a = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#);
        let b = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"int"}]}"#);
        assert!(check(&b, &a, CompatibilityPolicy::None).compatible);
    }

    #[test]
    fn full_rejects_incompatible_type_change() {
        let existing = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#);
        let candidate = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"int"}]}"#);
        let result = check(&candidate, &existing, CompatibilityPolicy::Full);
        assert!(!result.compatible);
    }

    #[test]
    fn backward_allows_removing_a_field() {
        let existing = schema(
            r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"},{"name":"b","type":"string"}]}"#,
        );
        let candidate = schema(r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"}]}"#);
        assert!(check(&candidate, &existing, CompatibilityPolicy::Backward).compatible);
    }

    #[test]
    fn backward_rejects_new_field_without_default() {
        let existing = schema(r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"}]}"#);
        let candidate = schema(
            r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"},{"name":"b","type":"string"}]}"#,
        );
        assert!(!check(&candidate, &existing, CompatibilityPolicy::Backward).compatible);
    }

    #[test]
    fn backward_allows_new_field_with_default() {
        let existing = schema(r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"}]}"#);
        let candidate = schema(
            r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"},{"name":"b","type":"string","default":"x"}]}"#,
        );
        assert!(check(&candidate, &existing, CompatibilityPolicy::Backward).compatible);
    }

    #[test]
    fn numeric_widening_is_promotable() {
        let existing = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"int"}]}"#);
        let candidate = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"long"}]}"#);
        assert!(check(&candidate, &existing, CompatibilityPolicy::Forward).compatible);
    }

    #[test]
    fn string_bytes_are_mutually_promotable() {
        let existing = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#);
        let candidate = schema(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"bytes"}]}"#);
        assert!(check(&candidate, &existing, CompatibilityPolicy::Full).compatible);
    }
}
