/// Canonicalizer (C1): parses the supported schema dialect into a
/// structural tree and re-emits a deterministic canonical textual form.
///
/// The dialect is the record-oriented structural schema family from
/// spec.md §6: primitives, named records, enums, arrays, maps, unions,
/// and fixed-size byte arrays. Canonicalization elides documentation,
/// orders attributes `{type, name, namespace, fields, symbols, items,
/// values, size}`, and resolves named types to their fully qualified
/// name (`namespace.name`, or just `name` when no namespace is given).
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// A parsed and normalized schema node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SchemaNode {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "record")]
    Record {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        fields: Vec<Field>,
    },
    #[serde(rename = "enum")]
    Enum {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        symbols: Vec<String>,
    },
    #[serde(rename = "array")]
    Array { items: Box<SchemaNode> },
    #[serde(rename = "map")]
    Map { values: Box<SchemaNode> },
    #[serde(rename = "fixed")]
    Fixed {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        size: u32,
    },
    /// Unions have no `type` tag of their own in the dialect; represented
    /// here as a synthetic node but serialized as a bare JSON array.
    #[serde(skip)]
    Union(Vec<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SchemaNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
}

impl SchemaNode {
    fn fully_qualified(name: &str, namespace: &Option<String>) -> String {
        if name.contains('.') {
            return name.to_string();
        }
        match namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
            _ => name.to_string(),
        }
    }
}

/// A canonicalized schema: its normalized text and structural fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub canonical_text: String,
    pub structural_fingerprint: String,
    #[serde(skip)]
    pub tree: SchemaNode,
}

impl PartialEq for CanonicalSchema {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_text == other.canonical_text
    }
}

/// Parse and canonicalize raw schema text. Pure function: same input text
/// (modulo whitespace/attribute order/doc fields) always yields the same
/// canonical_text and fingerprint.
pub fn parse(text: &str) -> Result<CanonicalSchema> {
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| RegistryError::InvalidSchema(format!("malformed schema JSON: {}", e)))?;

    let tree = parse_node(&value, &None)?;
    let canonical_text = render(&tree);
    let structural_fingerprint = fingerprint(&canonical_text);

    Ok(CanonicalSchema {
        canonical_text,
        structural_fingerprint,
        tree,
    })
}

fn fingerprint(canonical_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_node(value: &JsonValue, enclosing_namespace: &Option<String>) -> Result<SchemaNode> {
    match value {
        JsonValue::String(s) => parse_primitive(s),
        JsonValue::Array(variants) => {
            if variants.is_empty() {
                return Err(RegistryError::InvalidSchema("union must have at least one member".to_string()));
            }
            let members = variants
                .iter()
                .map(|v| parse_node(v, enclosing_namespace))
                .collect::<Result<Vec<_>>>()?;
            Ok(SchemaNode::Union(members))
        }
        JsonValue::Object(map) => {
            let type_field = map
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| RegistryError::InvalidSchema("object schema missing 'type'".to_string()))?;

            match type_field {
                "null" | "boolean" | "int" | "long" | "float" | "double" | "string" | "bytes" => {
                    parse_primitive(type_field)
                }
                "record" => parse_record(map, enclosing_namespace),
                "enum" => parse_enum(map, enclosing_namespace),
                "array" => {
                    let items = map
                        .get("items")
                        .ok_or_else(|| RegistryError::InvalidSchema("array schema missing 'items'".to_string()))?;
                    Ok(SchemaNode::Array {
                        items: Box::new(parse_node(items, enclosing_namespace)?),
                    })
                }
                "map" => {
                    let values = map
                        .get("values")
                        .ok_or_else(|| RegistryError::InvalidSchema("map schema missing 'values'".to_string()))?;
                    Ok(SchemaNode::Map {
                        values: Box::new(parse_node(values, enclosing_namespace)?),
                    })
                }
                "fixed" => parse_fixed(map, enclosing_namespace),
                other => Err(RegistryError::InvalidSchema(format!("unknown schema type: {}", other))),
            }
        }
        _ => Err(RegistryError::InvalidSchema("schema node must be a string, array, or object".to_string())),
    }
}

fn parse_primitive(name: &str) -> Result<SchemaNode> {
    Ok(match name {
        "null" => SchemaNode::Null,
        "boolean" => SchemaNode::Boolean,
        "int" => SchemaNode::Int,
        "long" => SchemaNode::Long,
        "float" => SchemaNode::Float,
        "double" => SchemaNode::Double,
        "string" => SchemaNode::String,
        "bytes" => SchemaNode::Bytes,
        other => return Err(RegistryError::InvalidSchema(format!("unknown primitive type: {}", other))),
    })
}

fn parse_record(
    map: &serde_json::Map<String, JsonValue>,
    enclosing_namespace: &Option<String>,
) -> Result<SchemaNode> {
    let raw_name = map
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| RegistryError::InvalidSchema("record missing 'name'".to_string()))?;
    let namespace = map
        .get("namespace")
        .and_then(|n| n.as_str())
        .map(String::from)
        .or_else(|| enclosing_namespace.clone());

    let name = SchemaNode::fully_qualified(raw_name, &namespace);

    let fields_json = map
        .get("fields")
        .and_then(|f| f.as_array())
        .ok_or_else(|| RegistryError::InvalidSchema("record missing 'fields' array".to_string()))?;

    if fields_json.is_empty() {
        return Err(RegistryError::InvalidSchema(format!("record '{}' has no fields", name)));
    }

    let mut seen = std::collections::HashSet::new();
    let mut fields = Vec::with_capacity(fields_json.len());
    for field_json in fields_json {
        let field_obj = field_json
            .as_object()
            .ok_or_else(|| RegistryError::InvalidSchema("field must be an object".to_string()))?;
        let field_name = field_obj
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| RegistryError::InvalidSchema("field missing 'name'".to_string()))?
            .to_string();
        if !seen.insert(field_name.clone()) {
            return Err(RegistryError::InvalidSchema(format!("duplicate field name: {}", field_name)));
        }
        let field_type = field_obj
            .get("type")
            .ok_or_else(|| RegistryError::InvalidSchema(format!("field '{}' missing 'type'", field_name)))?;
        let ty = parse_node(field_type, &namespace)?;
        let default = field_obj.get("default").cloned();

        fields.push(Field {
            name: field_name,
            ty,
            default,
        });
    }

    Ok(SchemaNode::Record {
        name,
        namespace,
        fields,
    })
}

fn parse_enum(
    map: &serde_json::Map<String, JsonValue>,
    enclosing_namespace: &Option<String>,
) -> Result<SchemaNode> {
    let raw_name = map
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| RegistryError::InvalidSchema("enum missing 'name'".to_string()))?;
    let namespace = map
        .get("namespace")
        .and_then(|n| n.as_str())
        .map(String::from)
        .or_else(|| enclosing_namespace.clone());
    let name = SchemaNode::fully_qualified(raw_name, &namespace);

    let symbols_json = map
        .get("symbols")
        .and_then(|s| s.as_array())
        .ok_or_else(|| RegistryError::InvalidSchema("enum missing 'symbols' array".to_string()))?;
    if symbols_json.is_empty() {
        return Err(RegistryError::InvalidSchema(format!("enum '{}' has no symbols", name)));
    }
    let symbols = symbols_json
        .iter()
        .map(|s| {
            s.as_str()
                .map(String::from)
                .ok_or_else(|| RegistryError::InvalidSchema("enum symbol must be a string".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SchemaNode::Enum {
        name,
        namespace,
        symbols,
    })
}

fn parse_fixed(
    map: &serde_json::Map<String, JsonValue>,
    enclosing_namespace: &Option<String>,
) -> Result<SchemaNode> {
    let raw_name = map
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| RegistryError::InvalidSchema("fixed missing 'name'".to_string()))?;
    let namespace = map
        .get("namespace")
        .and_then(|n| n.as_str())
        .map(String::from)
        .or_else(|| enclosing_namespace.clone());
    let name = SchemaNode::fully_qualified(raw_name, &namespace);

    let size = map
        .get("size")
        .and_then(|s| s.as_u64())
        .ok_or_else(|| RegistryError::InvalidSchema(format!("fixed '{}' missing numeric 'size'", name)))?
        as u32;

    Ok(SchemaNode::Fixed {
        name,
        namespace,
        size,
    })
}

/// Render a schema node into its canonical textual form. Attribute order
/// is fixed: type, name, namespace, fields, symbols, items, values, size.
/// Documentation and default-valued attributes are elided except field
/// defaults, which are semantically load-bearing for compatibility and
/// are retained.
fn render(node: &SchemaNode) -> String {
    render_value(node).to_string()
}

fn render_value(node: &SchemaNode) -> JsonValue {
    match node {
        SchemaNode::Null => JsonValue::String("null".into()),
        SchemaNode::Boolean => JsonValue::String("boolean".into()),
        SchemaNode::Int => JsonValue::String("int".into()),
        SchemaNode::Long => JsonValue::String("long".into()),
        SchemaNode::Float => JsonValue::String("float".into()),
        SchemaNode::Double => JsonValue::String("double".into()),
        SchemaNode::String => JsonValue::String("string".into()),
        SchemaNode::Bytes => JsonValue::String("bytes".into()),
        SchemaNode::Record { name, namespace, fields } => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), JsonValue::String("record".into()));
            obj.insert("name".into(), JsonValue::String(name.clone()));
            if let Some(ns) = namespace {
                obj.insert("namespace".into(), JsonValue::String(ns.clone()));
            }
            let fields_json: Vec<JsonValue> = fields
                .iter()
                .map(|f| {
                    let mut field_obj = serde_json::Map::new();
                    field_obj.insert("name".into(), JsonValue::String(f.name.clone()));
                    field_obj.insert("type".into(), render_value(&f.ty));
                    if let Some(default) = &f.default {
                        field_obj.insert("default".into(), default.clone());
                    }
                    JsonValue::Object(field_obj)
                })
                .collect();
            obj.insert("fields".into(), JsonValue::Array(fields_json));
            JsonValue::Object(obj)
        }
        SchemaNode::Enum { name, namespace, symbols } => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), JsonValue::String("enum".into()));
            obj.insert("name".into(), JsonValue::String(name.clone()));
            if let Some(ns) = namespace {
                obj.insert("namespace".into(), JsonValue::String(ns.clone()));
            }
            obj.insert(
                "symbols".into(),
                JsonValue::Array(symbols.iter().map(|s| JsonValue::String(s.clone())).collect()),
            );
            JsonValue::Object(obj)
        }
        SchemaNode::Array { items } => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), JsonValue::String("array".into()));
            obj.insert("items".into(), render_value(items));
            JsonValue::Object(obj)
        }
        SchemaNode::Map { values } => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), JsonValue::String("map".into()));
            obj.insert("values".into(), render_value(values));
            JsonValue::Object(obj)
        }
        SchemaNode::Fixed { name, namespace, size } => {
            let mut obj = serde_json::Map::new();
            obj.insert("type".into(), JsonValue::String("fixed".into()));
            obj.insert("name".into(), JsonValue::String(name.clone()));
            if let Some(ns) = namespace {
                obj.insert("namespace".into(), JsonValue::String(ns.clone()));
            }
            obj.insert("size".into(), JsonValue::Number(serde_json::Number::from(*size)));
            JsonValue::Object(obj)
        }
        SchemaNode::Union(members) => JsonValue::Array(members.iter().map(render_value).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_does_not_affect_canonical_text() {
        let a = parse("{   \"type\":   \"string\"}").unwrap();
        let b = parse("{\"type\":\"string\"}").unwrap();
        assert_eq!(a.canonical_text, b.canonical_text);
        assert_eq!(a.structural_fingerprint, b.structural_fingerprint);
    }

    #[test]
    fn primitive_string_shorthand_matches_object_form() {
        let a = parse("\"string\"").unwrap();
        let b = parse("{\"type\": \"string\"}").unwrap();
        assert_eq!(a.canonical_text, b.canonical_text);
    }

    #[test]
    fn doc_is_elided() {
        let with_doc = parse(
            r#"{"type":"record","name":"r","doc":"a record","fields":[{"name":"f","type":"string","doc":"a field"}]}"#,
        )
        .unwrap();
        let without_doc =
            parse(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#).unwrap();
        assert_eq!(with_doc.canonical_text, without_doc.canonical_text);
    }

    #[test]
    fn attribute_order_is_fixed_regardless_of_input_order() {
        let a = parse(r#"{"fields":[{"type":"string","name":"f"}],"name":"r","type":"record"}"#).unwrap();
        let b = parse(r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#).unwrap();
        assert_eq!(a.canonical_text, b.canonical_text);
    }

    #[test]
    fn namespace_resolves_into_fully_qualified_name() {
        let schema = parse(r#"{"type":"record","name":"r","namespace":"com.example","fields":[{"name":"f","type":"string"}]}"#).unwrap();
        assert!(schema.canonical_text.contains("com.example.r"));
    }

    #[test]
    fn record_without_fields_is_rejected() {
        assert!(parse(r#"{"type":"record","name":"r","fields":[]}"#).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse(r#"{"type":"weird"}"#).is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn union_is_supported() {
        let schema = parse(r#"["null", "string"]"#).unwrap();
        assert!(matches!(schema.tree, SchemaNode::Union(_)));
    }
}
