//! Schema harmonizer.
//!
//! Converts a service's native API description (Swagger 2 or OpenAPI 3 JSON)
//! into a [`CapabilityDescriptor`]. Only the top-level `info.title`,
//! `info.description` and `paths` fields are mandatory; everything below them
//! is converted best-effort, since the document comes from a collaborator
//! rather than validated input.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use mcp_core::{
    types::{
        CapabilityDescriptor, OperationDescriptor, ParameterDescriptor, ParameterLocation,
        SchemaShape, SchemaType,
    },
    Error, Result,
};

/// Lifted into [`SchemaType::example`] rather than the extension bag.
const EXAMPLE_FIELD: &str = "example";

/// Keys of a parameter object that describe the parameter rather than its value type.
const PARAMETER_FIELDS: &[&str] = &["name", "in", "required", "description", "schema"];

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Default nesting limit for schema conversion.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Native document to capability schema converter.
#[derive(Debug, Clone, Copy)]
pub struct Harmonizer {
    max_depth: usize,
}

impl Default for Harmonizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Harmonize with the default depth limit.
pub fn harmonize(document: &Value) -> Result<CapabilityDescriptor> {
    Harmonizer::default().harmonize(document)
}

/// Convert one schema node with the default depth limit.
pub fn convert_schema(node: &Value) -> SchemaType {
    Harmonizer::default().convert_schema(node)
}

impl Harmonizer {
    /// Create a harmonizer that stops descending after `max_depth` levels.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Convert a full native document.
    ///
    /// Fails with [`Error::Schema`] when `info.title`, `info.description` or
    /// `paths` is missing or has the wrong type. No partial descriptor is
    /// produced in that case.
    pub fn harmonize(&self, document: &Value) -> Result<CapabilityDescriptor> {
        let doc = document
            .as_object()
            .ok_or_else(|| Error::schema("document is not a JSON object"))?;

        let info = doc
            .get("info")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::schema("missing or malformed `info` object"))?;
        let name = required_str(info, "title")?;
        let description = required_str(info, "description")?;

        let paths = doc
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::schema("missing or malformed `paths` object"))?;

        let mut endpoints = Vec::new();
        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                tracing::debug!(path = %path, "Skipping non-object path item");
                continue;
            };
            let shared_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for (method, details) in item {
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                let Some(details) = details.as_object() else {
                    tracing::debug!(path = %path, method = %method, "Skipping non-object operation");
                    continue;
                };
                endpoints.push(self.convert_operation(path, method, details, shared_params));
            }
        }

        let definitions = doc.get("definitions").and_then(Value::as_object).or_else(|| {
            doc.get("components")
                .and_then(|c| c.get("schemas"))
                .and_then(Value::as_object)
        });
        let schemas = definitions
            .map(|defs| {
                defs.iter()
                    .map(|(name, schema)| (name.clone(), self.convert_schema(schema)))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        let mut metadata = Map::new();
        if let Some(version) = info.get("version") {
            metadata.insert("version".into(), version.clone());
        }
        for key in ["basePath", "host", "schemes", "servers"] {
            if let Some(value) = doc.get(key) {
                metadata.insert(key.into(), value.clone());
            }
        }

        Ok(CapabilityDescriptor {
            name,
            description,
            endpoints,
            schemas,
            metadata,
        })
    }

    /// Convert a schema node. Non-object nodes yield an empty primitive schema.
    pub fn convert_schema(&self, node: &Value) -> SchemaType {
        match node.as_object() {
            Some(map) => self.convert_map(map, 0),
            None => SchemaType::default(),
        }
    }

    fn convert_map(&self, map: &Map<String, Value>, depth: usize) -> SchemaType {
        let type_name = str_field(map, "type");
        let format = str_field(map, "format");

        // Keys whose values landed in a typed slot (`type`, `format`,
        // `properties`, `items`, `required`, `example`). Everything else,
        // including a standard key whose value does not fit, is copied
        // verbatim into `additional`.
        let mut consumed: Vec<&str> = vec![EXAMPLE_FIELD];
        if map.get("type").is_some_and(Value::is_string) {
            consumed.push("type");
        }
        if map.get("format").is_some_and(Value::is_string) {
            consumed.push("format");
        }

        let nested_allowed = depth + 1 < self.max_depth;
        if !nested_allowed && (map.contains_key("properties") || map.contains_key("items")) {
            tracing::debug!(depth, "Schema depth limit reached, nested structure kept verbatim");
        }

        let properties = map.get("properties").and_then(Value::as_object);
        let items = map.get("items").and_then(Value::as_object);
        let shape = match (properties, items) {
            (Some(props), _) if nested_allowed => {
                consumed.push("properties");
                SchemaShape::Object {
                    properties: props
                        .iter()
                        .map(|(name, prop)| (name.clone(), self.convert_child(prop, depth + 1)))
                        .collect(),
                }
            }
            (None, Some(items)) if nested_allowed => {
                consumed.push("items");
                SchemaShape::Array {
                    items: Some(Box::new(self.convert_map(items, depth + 1))),
                }
            }
            _ => match type_name.as_str() {
                "object" => SchemaShape::Object {
                    properties: BTreeMap::new(),
                },
                "array" => SchemaShape::Array { items: None },
                _ => SchemaShape::Primitive,
            },
        };

        let mut required = Vec::new();
        if let Some(names) = map.get("required").and_then(Value::as_array) {
            required = names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            if required.len() == names.len() {
                consumed.push("required");
            }
        }

        let additional = map
            .iter()
            .filter(|(key, _)| !consumed.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        SchemaType {
            type_name,
            format,
            shape,
            required,
            example: map.get(EXAMPLE_FIELD).cloned(),
            additional,
        }
    }

    fn convert_child(&self, node: &Value, depth: usize) -> SchemaType {
        match node.as_object() {
            Some(map) => self.convert_map(map, depth),
            None => SchemaType::default(),
        }
    }

    fn convert_operation(
        &self,
        path: &str,
        method: &str,
        details: &Map<String, Value>,
        shared_params: &[Value],
    ) -> OperationDescriptor {
        let own_params = details
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut parameters = Vec::new();
        let mut request_body = None;
        let mut form_fields = BTreeMap::new();
        let mut form_required = Vec::new();

        for param in merge_parameters(shared_params, own_params) {
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                tracing::debug!(path = %path, method = %method, "Skipping parameter without a name");
                continue;
            };
            let location = str_field(param, "in");
            let required = param.get("required").and_then(Value::as_bool).unwrap_or(false);
            let schema = self.parameter_schema(param);

            match location.as_str() {
                "body" => request_body = Some(schema),
                "formData" => {
                    if required {
                        form_required.push(name.to_string());
                    }
                    form_fields.insert(name.to_string(), schema);
                }
                other => match ParameterLocation::parse(other) {
                    Some(location) => parameters.push(ParameterDescriptor {
                        name: name.to_string(),
                        location,
                        required,
                        schema,
                        description: str_field(param, "description"),
                    }),
                    None => {
                        tracing::debug!(path = %path, param = %name, location = %other, "Skipping parameter with unknown location");
                    }
                },
            }
        }

        if request_body.is_none() && !form_fields.is_empty() {
            request_body = Some(SchemaType {
                type_name: "object".into(),
                shape: SchemaShape::Object {
                    properties: form_fields,
                },
                required: form_required,
                ..Default::default()
            });
        }

        if request_body.is_none() {
            request_body = details
                .get("requestBody")
                .and_then(|rb| rb.get("content"))
                .and_then(Value::as_object)
                .and_then(|content| {
                    content
                        .get("application/json")
                        .or_else(|| content.values().next())
                })
                .and_then(|media| media.get("schema"))
                .map(|schema| self.convert_schema(schema));
        }

        OperationDescriptor {
            path: path.to_string(),
            method: method.to_ascii_uppercase(),
            summary: str_field(details, "summary"),
            description: str_field(details, "description"),
            parameters,
            request_body,
            responses: details
                .get("responses")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            tags: details
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Explicit `schema` when present, otherwise the inline Swagger 2 type
    /// description carried by the parameter object itself.
    fn parameter_schema(&self, param: &Map<String, Value>) -> SchemaType {
        if let Some(schema) = param.get("schema").and_then(Value::as_object) {
            return self.convert_map(schema, 0);
        }
        let inline: Map<String, Value> = param
            .iter()
            .filter(|(key, _)| !PARAMETER_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.convert_map(&inline, 0)
    }
}

/// Path-level parameters first, replaced in place by operation parameters
/// with the same name and location; new operation parameters are appended.
fn merge_parameters<'a>(
    shared: &'a [Value],
    own: &'a [Value],
) -> Vec<&'a Map<String, Value>> {
    let mut merged: Vec<&Map<String, Value>> =
        shared.iter().filter_map(Value::as_object).collect();

    for param in own.iter().filter_map(Value::as_object) {
        let key = (param.get("name"), param.get("in"));
        match merged
            .iter()
            .position(|p| (p.get("name"), p.get("in")) == key)
        {
            Some(idx) => merged[idx] = param,
            None => merged.push(param),
        }
    }
    merged
}

fn str_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn required_str(map: &Map<String, Value>, key: &str) -> Result<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::schema(format!("missing or malformed `info.{}`", key)))
}
