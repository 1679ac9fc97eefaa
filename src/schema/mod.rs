//! Terraform schema declarations and expand/flatten
//!
//! Terraform state is carried as `serde_json::Value` in Terraform's nesting
//! convention: every block is a list of attribute maps, so a resource looks
//! like `{"metadata": [{...}], "spec": [{...}], "status": [{...}]}`.
//!
//! - `expand_*` functions turn state into typed [`crate::api`] objects
//! - `flatten_*` functions turn typed objects back into state
//! - `*_fields`/`*_schema` functions declare the schema blocks that render
//!   into Terraform plugin protocol `Schema` messages

pub mod common;
pub mod kubernetes;
pub mod mpi_job;
pub mod paddle_job;
pub mod pytorch_job;
pub mod tensorflow_job;
pub mod xgboost_job;

use serde_json::{Map, Value};

use crate::proto::tfplugin6;

/// Scalar attribute types supported by the provider's schemas
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    /// cty string
    String,
    /// cty number
    Number,
    /// cty bool
    Bool,
    /// map of string
    StringMap,
    /// list of string
    StringList,
}

impl AttributeType {
    /// The cty type constraint, JSON-encoded as the protocol expects
    pub fn cty_json(&self) -> Vec<u8> {
        let v = match self {
            Self::String => Value::String("string".into()),
            Self::Number => Value::String("number".into()),
            Self::Bool => Value::String("bool".into()),
            Self::StringMap => serde_json::json!(["map", "string"]),
            Self::StringList => serde_json::json!(["list", "string"]),
        };
        // Serializing a literal Value cannot fail
        serde_json::to_vec(&v).unwrap_or_default()
    }
}

/// One scalar attribute of a schema block
#[derive(Clone, Debug)]
pub struct Attribute {
    /// Attribute name (snake_case, Terraform-side)
    pub name: &'static str,
    /// Value type
    pub type_: AttributeType,
    /// Documentation string
    pub description: &'static str,
    /// Whether the practitioner must set it
    pub required: bool,
    /// Whether the provider computes it
    pub computed: bool,
}

impl Attribute {
    /// An optional attribute
    pub fn optional(name: &'static str, type_: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            type_,
            description,
            required: false,
            computed: false,
        }
    }

    /// A required attribute
    pub fn required(name: &'static str, type_: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            type_,
            description,
            required: true,
            computed: false,
        }
    }

    /// A computed (provider-populated) attribute
    pub fn computed(name: &'static str, type_: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            type_,
            description,
            required: false,
            computed: true,
        }
    }
}

/// How a nested block repeats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nesting {
    /// At most one instance (`max_items = 1` list in state)
    Single,
    /// Arbitrarily repeated
    List,
}

/// A nested block within a schema block
#[derive(Clone, Debug)]
pub struct NestedBlock {
    /// Block type name (snake_case, Terraform-side)
    pub name: &'static str,
    /// The nested block's own schema
    pub block: Block,
    /// Repetition mode
    pub nesting: Nesting,
    /// Whether at least one instance is required
    pub required: bool,
}

/// A schema block: attributes plus nested blocks
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// Documentation string
    pub description: &'static str,
    /// Scalar attributes
    pub attributes: Vec<Attribute>,
    /// Nested blocks
    pub blocks: Vec<NestedBlock>,
}

/// A top-level resource (or provider) schema
#[derive(Clone, Debug)]
pub struct Schema {
    /// Schema version, bumped on breaking layout changes
    pub version: i64,
    /// The root block
    pub block: Block,
}

impl Schema {
    /// Render into the plugin protocol representation
    pub fn to_proto(&self) -> tfplugin6::Schema {
        tfplugin6::Schema {
            version: self.version,
            block: Some(block_to_proto(&self.block)),
        }
    }

    /// JSON rendering for the `--schema` documentation dump
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "version": self.version,
            "block": block_to_json(&self.block),
        })
    }
}

fn block_to_json(block: &Block) -> Value {
    serde_json::json!({
        "description": block.description,
        "attributes": block
            .attributes
            .iter()
            .map(|a| {
                serde_json::json!({
                    "name": a.name,
                    "type": serde_json::from_slice::<Value>(&a.type_.cty_json())
                        .unwrap_or(Value::Null),
                    "description": a.description,
                    "required": a.required,
                    "computed": a.computed,
                })
            })
            .collect::<Vec<_>>(),
        "block_types": block
            .blocks
            .iter()
            .map(|b| {
                serde_json::json!({
                    "name": b.name,
                    "nesting": match b.nesting {
                        Nesting::Single => "single",
                        Nesting::List => "list",
                    },
                    "required": b.required,
                    "block": block_to_json(&b.block),
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn block_to_proto(block: &Block) -> tfplugin6::schema::Block {
    tfplugin6::schema::Block {
        version: 0,
        attributes: block
            .attributes
            .iter()
            .map(|a| tfplugin6::schema::Attribute {
                name: a.name.to_string(),
                r#type: a.type_.cty_json(),
                description: a.description.to_string(),
                required: a.required,
                optional: !a.required && !a.computed,
                computed: a.computed,
                sensitive: false,
                deprecated_message: String::new(),
                description_kind: tfplugin6::StringKind::Plain as i32,
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|b| tfplugin6::schema::NestedBlock {
                type_name: b.name.to_string(),
                block: Some(block_to_proto(&b.block)),
                // Single is a max_items=1 list on the wire, matching how
                // SDK-based providers model MaxItems: 1.
                nesting: tfplugin6::schema::nested_block::NestingMode::List as i32,
                min_items: i64::from(b.required),
                max_items: match b.nesting {
                    Nesting::Single => 1,
                    Nesting::List => 0,
                },
            })
            .collect(),
        description: block.description.to_string(),
        description_kind: tfplugin6::StringKind::Plain as i32,
        deprecated: false,
    }
}

// ---------------------------------------------------------------------------
// State value helpers (Terraform's list-of-maps nesting)
// ---------------------------------------------------------------------------

/// The first instance of the named block, if present
pub fn first_block<'a>(state: &'a Value, key: &str) -> Option<&'a Value> {
    match state.get(key)? {
        Value::Array(items) => items.first().filter(|v| !v.is_null()),
        // Tolerate an unwrapped object; some callers hand blocks through
        // without the list shell.
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

/// A string attribute of a block
pub fn str_field<'a>(block: &'a Value, key: &str) -> Option<&'a str> {
    block.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// An i32 attribute of a block
pub fn i32_field(block: &Value, key: &str) -> Option<i32> {
    block.get(key).and_then(Value::as_i64).map(|v| v as i32)
}

/// An i64 attribute of a block
pub fn i64_field(block: &Value, key: &str) -> Option<i64> {
    block.get(key).and_then(Value::as_i64)
}

/// A bool attribute of a block
pub fn bool_field(block: &Value, key: &str) -> Option<bool> {
    block.get(key).and_then(Value::as_bool)
}

/// A list attribute of a block
pub fn list_field<'a>(block: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    block.get(key).and_then(Value::as_array)
}

/// A map-of-strings attribute of a block
pub fn string_map_field(
    block: &Value,
    key: &str,
) -> Option<std::collections::BTreeMap<String, String>> {
    let map = block.get(key)?.as_object()?;
    if map.is_empty() {
        return None;
    }
    Some(
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

/// Wrap a flattened attribute map in the single-element list Terraform uses
pub fn wrap_block(map: Map<String, Value>) -> Value {
    Value::Array(vec![Value::Object(map)])
}

/// A list of strings attribute of a block
pub fn string_list_field(block: &Value, key: &str) -> Option<Vec<String>> {
    let items = block.get(key)?.as_array()?;
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cty_types_encode_as_terraform_expects() {
        assert_eq!(AttributeType::String.cty_json(), b"\"string\"".to_vec());
        assert_eq!(
            AttributeType::StringMap.cty_json(),
            b"[\"map\",\"string\"]".to_vec()
        );
    }

    #[test]
    fn first_block_unwraps_the_list_shell() {
        let state = json!({"metadata": [{"name": "job"}]});
        assert_eq!(
            first_block(&state, "metadata").and_then(|b| str_field(b, "name")),
            Some("job")
        );
        assert!(first_block(&state, "spec").is_none());
        assert!(first_block(&json!({"metadata": []}), "metadata").is_none());
        assert!(first_block(&json!({"metadata": [null]}), "metadata").is_none());
    }

    #[test]
    fn empty_strings_read_as_absent() {
        let block = json!({"queue": ""});
        assert_eq!(str_field(&block, "queue"), None);
    }

    #[test]
    fn schema_renders_into_proto_blocks() {
        let schema = Schema {
            version: 0,
            block: Block {
                description: "test",
                attributes: vec![Attribute::required(
                    "name",
                    AttributeType::String,
                    "object name",
                )],
                blocks: vec![NestedBlock {
                    name: "spec",
                    block: Block::default(),
                    nesting: Nesting::Single,
                    required: true,
                }],
            },
        };
        let proto = schema.to_proto();
        let block = proto.block.unwrap();
        assert_eq!(block.attributes[0].name, "name");
        assert!(block.attributes[0].required);
        assert!(!block.attributes[0].optional);
        assert_eq!(block.block_types[0].type_name, "spec");
        assert_eq!(block.block_types[0].max_items, 1);
        assert_eq!(block.block_types[0].min_items, 1);
    }
}
