//! Response schemas: the structural contract between a processor and a
//! backend.
//!
//! A processor describes the shape it expects back as a JSON Schema object.
//! Before dispatch the service folds any shared sub-schema definitions
//! (`$defs`) into the outgoing payload, because the canonical local-network
//! backend enforces the schema verbatim and resolves no external `$ref`s.
//! Schemas without `$defs` go out without one — the payload never grows an
//! empty `$defs` key.
//!
//! The service does not validate responses against the schema; it only
//! guarantees the payload parsed as JSON. Conformance checks (required keys
//! present, values sane) belong to the calling processor, which knows what a
//! usable correction looks like.

use serde_json::{json, Map, Value};

/// A JSON Schema describing the expected structured output of an LLM call.
///
/// Construct from a full schema object (`type: object` with `properties`,
/// `required`, and optionally `$defs`), or use [`ResponseSchema::object`]
/// for the common flat case.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    root: Value,
}

impl ResponseSchema {
    /// Wrap a complete JSON Schema object.
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// A flat object schema: every listed property is required.
    ///
    /// ```rust
    /// use treemark::services::ResponseSchema;
    /// use serde_json::json;
    ///
    /// let schema = ResponseSchema::object(&[
    ///     ("table_html", json!({"type": "string"})),
    /// ]);
    /// ```
    pub fn object(properties: &[(&str, Value)]) -> Self {
        let mut props = Map::new();
        let mut required = Vec::new();
        for (name, prop) in properties {
            props.insert((*name).to_string(), prop.clone());
            required.push(Value::String((*name).to_string()));
        }
        Self {
            root: json!({
                "type": "object",
                "properties": props,
                "required": required,
            }),
        }
    }

    /// The property names the schema requires, used by processors for
    /// conformance checks on returned payloads.
    pub fn required_keys(&self) -> Vec<&str> {
        self.root
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Build the wire form: `type`/`properties`/`required`, with `$defs`
    /// inlined if and only if the schema defines any.
    pub fn to_wire(&self) -> Value {
        let mut wire = Map::new();
        wire.insert("type".into(), json!("object"));
        wire.insert(
            "properties".into(),
            self.root.get("properties").cloned().unwrap_or(json!({})),
        );
        wire.insert(
            "required".into(),
            self.root.get("required").cloned().unwrap_or(json!([])),
        );
        if let Some(defs) = self.root.get("$defs") {
            wire.insert("$defs".into(), defs.clone());
        }
        Value::Object(wire)
    }
}
