//! Recursive schema value model for structured-output requests.
//!
//! A [`Schema`] describes the JSON shape a model response must match, in the
//! restricted dialect the completions API accepts. Trees are plain owned
//! values: every child node belongs to its parent, reuse is expressed only
//! through `$ref` names resolved against a `$defs` side-table, and a tree
//! that has been shared across threads must be treated as immutable.

use std::fmt;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::SchemaError;

/// The closed set of primitive type names a schema node can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl Primitive {
    /// Lowercase wire name of this primitive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
            Primitive::Object => "object",
            Primitive::Array => "array",
            Primitive::Null => "null",
        }
    }

    /// Parse a wire name, returning `None` for anything outside the set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Primitive::String),
            "number" => Some(Primitive::Number),
            "integer" => Some(Primitive::Integer),
            "boolean" => Some(Primitive::Boolean),
            "object" => Some(Primitive::Object),
            "array" => Some(Primitive::Array),
            "null" => Some(Primitive::Null),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node's type declaration: one primitive, or a union of primitives.
///
/// Union members are [`Primitive`] values, so a union can never contain
/// another union and every member always has a single wire name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaType {
    Single(Primitive),
    Union(Vec<Primitive>),
}

impl SchemaType {
    /// Build a union from primitives, preserving member order.
    pub fn union(members: impl IntoIterator<Item = Primitive>) -> Self {
        SchemaType::Union(members.into_iter().collect())
    }

    /// The canonical "nullable primitive" spelling: `[T, null]`.
    ///
    /// The API treats every declared field as required, so an absent-able
    /// value has to be expressed as a union with `null` instead.
    pub fn optional(primitive: Primitive) -> Self {
        SchemaType::Union(vec![primitive, Primitive::Null])
    }

    /// Decode a wire value: a bare name string or an array of name strings.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(name) => match Primitive::from_name(name) {
                Some(primitive) => Ok(SchemaType::Single(primitive)),
                None => Err(SchemaError::UnknownType { found: name.clone() }),
            },
            Value::Array(items) => {
                let mut members = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(|| SchemaError::MalformedField {
                        key: "type".to_string(),
                        expected: "a string or an array of strings",
                    })?;
                    match Primitive::from_name(name) {
                        Some(primitive) => members.push(primitive),
                        None => {
                            return Err(SchemaError::UnknownUnionMember {
                                found: name.to_string(),
                            });
                        }
                    }
                }
                Ok(SchemaType::Union(members))
            }
            _ => Err(SchemaError::MalformedField {
                key: "type".to_string(),
                expected: "a string or an array of strings",
            }),
        }
    }
}

impl From<Primitive> for SchemaType {
    fn from(primitive: Primitive) -> Self {
        SchemaType::Single(primitive)
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Single(primitive) => write!(f, "{primitive}"),
            SchemaType::Union(members) => {
                let names: Vec<&str> = members.iter().map(Primitive::as_str).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

impl Serialize for SchemaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SchemaType::Single(primitive) => serializer.serialize_str(primitive.as_str()),
            SchemaType::Union(members) => {
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for member in members {
                    seq.serialize_element(member.as_str())?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SchemaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SchemaType::from_value(&value).map_err(D::Error::custom)
    }
}

/// One schema node, and transitively the sub-schemas it owns.
///
/// Every field is optional; absent fields are omitted from the wire form
/// entirely. A node with `reference` set encodes as `{"$ref": ...}` and
/// nothing else: any other populated field is suppressed, and the mirror
/// decode never inspects sibling keys of a string `$ref`.
///
/// `required` names are expected to be a subset of `properties` keys. That
/// convention is not validated here; [`Schema::with_property`] keeps the two
/// in step for callers building trees programmatically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    pub schema_type: Option<SchemaType>,
    pub description: Option<String>,
    pub properties: Option<IndexMap<String, Schema>>,
    pub items: Option<Box<Schema>>,
    pub required: Option<Vec<String>>,
    pub additional_properties: Option<bool>,
    pub enum_values: Option<Vec<String>>,
    pub reference: Option<String>,
    pub defs: Option<IndexMap<String, Schema>>,
    pub any_of: Option<Vec<Schema>>,
    pub strict: Option<bool>,
}

impl Schema {
    /// Decode recursion limit, in nesting levels.
    pub const MAX_DECODE_DEPTH: usize = 128;

    /// A node declaring the given type and nothing else.
    pub fn new(schema_type: impl Into<SchemaType>) -> Self {
        Schema {
            schema_type: Some(schema_type.into()),
            ..Schema::default()
        }
    }

    pub fn object() -> Self {
        Schema::new(Primitive::Object)
    }

    pub fn string() -> Self {
        Schema::new(Primitive::String)
    }

    pub fn integer() -> Self {
        Schema::new(Primitive::Integer)
    }

    pub fn number() -> Self {
        Schema::new(Primitive::Number)
    }

    pub fn boolean() -> Self {
        Schema::new(Primitive::Boolean)
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: Some(SchemaType::Single(Primitive::Array)),
            items: Some(Box::new(items)),
            ..Schema::default()
        }
    }

    /// An enumeration of string values, with no type declaration.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema {
            enum_values: Some(values.into_iter().map(Into::into).collect()),
            ..Schema::default()
        }
    }

    /// A reference to a sub-schema by name, e.g. `#/$defs/Person`.
    pub fn reference(target: impl Into<String>) -> Self {
        Schema {
            reference: Some(target.into()),
            ..Schema::default()
        }
    }

    /// A union of alternative schemas.
    pub fn any_of(alternatives: impl IntoIterator<Item = Schema>) -> Self {
        Schema {
            any_of: Some(alternatives.into_iter().collect()),
            ..Schema::default()
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_type(mut self, schema_type: impl Into<SchemaType>) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }

    /// Add a property and mark it required, the API's default convention.
    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(name.clone(), schema);
        self.required.get_or_insert_with(Vec::new).push(name);
        self
    }

    /// Add a named reusable sub-schema to the `$defs` side-table.
    pub fn with_def(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.defs
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), schema);
        self
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Encode this node to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("schema encoding is infallible")
    }

    /// Decode a schema document.
    ///
    /// A string `$ref` short-circuits the node: no sibling key is read, even
    /// a malformed one. Nesting is capped at [`Schema::MAX_DECODE_DEPTH`]
    /// levels so a pathological document cannot overflow the stack.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        Self::decode_at(value, 0)
    }

    fn decode_at(value: &Value, depth: usize) -> Result<Self, SchemaError> {
        if depth > Self::MAX_DECODE_DEPTH {
            return Err(SchemaError::TooDeep {
                limit: Self::MAX_DECODE_DEPTH,
            });
        }
        let map = value.as_object().ok_or(SchemaError::NotAnObject)?;

        // A non-string "$ref" does not name anything; fall through and
        // decode the node as inline, leaving the reference absent.
        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            return Ok(Schema::reference(reference));
        }

        let mut node = Schema::default();
        if let Some(value) = map.get("type") {
            node.schema_type = Some(SchemaType::from_value(value)?);
        }
        if let Some(value) = map.get("description") {
            node.description = Some(decode_string(value, "description")?);
        }
        if let Some(value) = map.get("properties") {
            node.properties = Some(decode_schema_map(value, "properties", depth)?);
        }
        if let Some(value) = map.get("items") {
            if !value.is_object() {
                return Err(SchemaError::MalformedField {
                    key: "items".to_string(),
                    expected: "a schema object",
                });
            }
            node.items = Some(Box::new(Self::decode_at(value, depth + 1)?));
        }
        if let Some(value) = map.get("required") {
            node.required = Some(decode_string_array(value, "required")?);
        }
        if let Some(value) = map.get("additionalProperties") {
            node.additional_properties =
                Some(value.as_bool().ok_or_else(|| SchemaError::MalformedField {
                    key: "additionalProperties".to_string(),
                    expected: "a boolean",
                })?);
        }
        if let Some(value) = map.get("enum") {
            node.enum_values = Some(decode_string_array(value, "enum")?);
        }
        if let Some(value) = map.get("$defs") {
            node.defs = Some(decode_schema_map(value, "$defs", depth)?);
        }
        if let Some(value) = map.get("anyOf") {
            let items = value.as_array().ok_or_else(|| SchemaError::MalformedField {
                key: "anyOf".to_string(),
                expected: "an array of schema objects",
            })?;
            node.any_of = Some(
                items
                    .iter()
                    .map(|item| Self::decode_at(item, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        if let Some(value) = map.get("strict") {
            node.strict = Some(value.as_bool().ok_or_else(|| SchemaError::MalformedField {
                key: "strict".to_string(),
                expected: "a boolean",
            })?);
        }
        Ok(node)
    }
}

fn decode_string(value: &Value, key: &str) -> Result<String, SchemaError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SchemaError::MalformedField {
            key: key.to_string(),
            expected: "a string",
        })
}

fn decode_string_array(value: &Value, key: &str) -> Result<Vec<String>, SchemaError> {
    let items = value.as_array().ok_or_else(|| SchemaError::MalformedField {
        key: key.to_string(),
        expected: "an array of strings",
    })?;
    items
        .iter()
        .map(|item| decode_string(item, key))
        .collect()
}

fn decode_schema_map(
    value: &Value,
    key: &str,
    depth: usize,
) -> Result<IndexMap<String, Schema>, SchemaError> {
    let entries = value.as_object().ok_or_else(|| SchemaError::MalformedField {
        key: key.to_string(),
        expected: "an object mapping names to schema objects",
    })?;
    let mut map = IndexMap::with_capacity(entries.len());
    for (name, child) in entries {
        if !child.is_object() {
            return Err(SchemaError::MalformedField {
                key: name.clone(),
                expected: "a schema object",
            });
        }
        map.insert(name.clone(), Schema::decode_at(child, depth + 1)?);
    }
    Ok(map)
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(reference) = &self.reference {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("$ref", reference)?;
            return map.end();
        }
        let mut map = serializer.serialize_map(None)?;
        if let Some(schema_type) = &self.schema_type {
            map.serialize_entry("type", schema_type)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(enum_values) = &self.enum_values {
            map.serialize_entry("enum", enum_values)?;
        }
        if let Some(properties) = &self.properties {
            map.serialize_entry("properties", properties)?;
        }
        if let Some(required) = &self.required {
            map.serialize_entry("required", required)?;
        }
        if let Some(additional_properties) = &self.additional_properties {
            map.serialize_entry("additionalProperties", additional_properties)?;
        }
        if let Some(items) = &self.items {
            map.serialize_entry("items", items)?;
        }
        if let Some(any_of) = &self.any_of {
            map.serialize_entry("anyOf", any_of)?;
        }
        if let Some(defs) = &self.defs {
            map.serialize_entry("$defs", defs)?;
        }
        if let Some(strict) = &self.strict {
            map.serialize_entry("strict", strict)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Schema::from_value(&value).map_err(D::Error::custom)
    }
}
