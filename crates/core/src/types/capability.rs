use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// Capability Schema (harmonized service description)
// =============================================================================

/// Uniform description of one discovered service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Service title taken from the API description.
    pub name: String,
    /// Human-readable service description.
    pub description: String,
    /// Operations, unique per (path, method).
    pub endpoints: Vec<OperationDescriptor>,
    /// Global type definitions keyed by definition name.
    pub schemas: BTreeMap<String, SchemaType>,
    /// Version, base path, host and similar document-level facts.
    pub metadata: Map<String, Value>,
}

impl CapabilityDescriptor {
    /// Find the operation registered for a path and method.
    pub fn operation(&self, path: &str, method: &str) -> Option<&OperationDescriptor> {
        self.endpoints
            .iter()
            .find(|op| op.path == path && op.method.eq_ignore_ascii_case(method))
    }
}

/// Harmonized capabilities of every currently available service.
pub type CapabilityContext = BTreeMap<String, CapabilityDescriptor>;

/// One HTTP operation exposed by a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub path: String,
    /// Upper-case HTTP method.
    pub method: String,
    pub summary: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<SchemaType>,
    /// Response specifications, copied verbatim.
    pub responses: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Where a parameter is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Parse the `in` value of a parameter object.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: SchemaType,
    pub description: String,
}

// =============================================================================
// Schema Types
// =============================================================================

/// Structural shape of a schema node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaShape {
    /// Scalar or otherwise unstructured value.
    #[default]
    Primitive,
    /// Object with named fields.
    Object {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        properties: BTreeMap<String, SchemaType>,
    },
    /// Homogeneous array.
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Box<SchemaType>>,
    },
}

/// Recursive, language-agnostic type description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaType {
    /// Declared `type`, or empty when absent or not a string.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(flatten)]
    pub shape: SchemaShape,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Every non-standard key of the source node, verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional: Map<String, Value>,
}

impl SchemaType {
    /// Properties when this is an object schema.
    pub fn properties(&self) -> Option<&BTreeMap<String, SchemaType>> {
        match &self.shape {
            SchemaShape::Object { properties } => Some(properties),
            _ => None,
        }
    }

    /// Element schema when this is an array schema.
    pub fn items(&self) -> Option<&SchemaType> {
        match &self.shape {
            SchemaShape::Array { items } => items.as_deref(),
            _ => None,
        }
    }
}
