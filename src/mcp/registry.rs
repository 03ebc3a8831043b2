//! Handler and schema registries.
//!
//! These two maps are the boundary to the excluded code-generation layer: a
//! build step elsewhere turns annotated functions into a name-keyed map of
//! async callables and a name-keyed map of declared parameter schemas. The
//! engine only reads them. Both are populated once before the owning
//! component starts and are never mutated afterwards.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::utils::error::{McpError, McpResult};

/// The boxed future a registered handler returns.
pub type HandlerFuture = BoxFuture<'static, McpResult<Value>>;

/// A registered async callable: JSON params in, JSON result out.
pub type Handler = Arc<dyn Fn(Option<Value>) -> HandlerFuture + Send + Sync>;

/// Name-keyed map of callable handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async handler under a name.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        self.handlers
            .insert(name.to_string(), Arc::new(move |params| handler(params).boxed()));
    }

    /// Looks up a handler by name.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Whether the registry holds no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &format!("{} handlers", self.handlers.len()))
            .finish()
    }
}

/// Declared schema for one tool or prompt.
#[derive(Debug, Clone)]
pub struct MethodSchema {
    /// Registered name, unique within its registry
    pub name: String,
    /// Human-readable description, if the source carried one
    pub description: Option<String>,
    /// JSON Schema object describing the parameters
    pub params_schema: Value,
    /// Names of parameters that must be present
    pub required: Vec<String>,
}

impl MethodSchema {
    /// Creates a schema entry with no required parameters.
    pub fn new(name: &str, description: Option<&str>, params_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            params_schema,
            required: Vec::new(),
        }
    }

    /// Marks parameters as required.
    pub fn with_required(mut self, required: &[&str]) -> Self {
        self.required = required.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Name-keyed map of declared parameter schemas.
///
/// Entries are kept name-sorted so catalog listings paginate in a stable
/// order across requests.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, MethodSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema entry, keyed by its name.
    pub fn register(&mut self, schema: MethodSchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Looks up a schema by name.
    pub fn get(&self, name: &str) -> Option<&MethodSchema> {
        self.schemas.get(name)
    }

    /// All entries in name order.
    pub fn entries(&self) -> Vec<&MethodSchema> {
        self.schemas.values().collect()
    }

    /// Whether the registry holds no schemas.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Validates call arguments against the declared schema.
    ///
    /// Checks required parameters, rejects parameters the schema does not
    /// declare, and checks primitive `type` tags on declared properties.
    /// Every failure names the offending field.
    pub fn validate_args(&self, name: &str, arguments: Option<&Value>) -> McpResult<()> {
        let schema = self
            .schemas
            .get(name)
            .ok_or_else(|| McpError::MethodNotFound(name.to_string()))?;

        let args = match arguments {
            None | Some(Value::Null) => {
                if let Some(missing) = schema.required.first() {
                    return Err(McpError::InvalidParams(format!(
                        "missing required parameter '{}'",
                        missing
                    )));
                }
                return Ok(());
            }
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(McpError::InvalidParams(
                    "arguments must be an object".to_string(),
                ))
            }
        };

        for required in &schema.required {
            if !args.contains_key(required) {
                return Err(McpError::InvalidParams(format!(
                    "missing required parameter '{}'",
                    required
                )));
            }
        }

        let properties = schema
            .params_schema
            .get("properties")
            .and_then(Value::as_object);

        if let Some(properties) = properties {
            for (key, value) in args {
                let Some(declared) = properties.get(key) else {
                    return Err(McpError::InvalidParams(format!(
                        "unknown parameter '{}'",
                        key
                    )));
                };
                if let Some(expected) = declared.get("type").and_then(Value::as_str) {
                    if !type_matches(expected, value) {
                        return Err(McpError::InvalidParams(format!(
                            "parameter '{}' must be of type {}",
                            key, expected
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unrecognized type tags pass through rather than rejecting calls
        // a stricter validator elsewhere already vetted.
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_schema() -> MethodSchema {
        MethodSchema::new(
            "echo",
            Some("Echoes its input"),
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "repeat": {"type": "integer"}
                }
            }),
        )
        .with_required(&["text"])
    }

    #[tokio::test]
    async fn handler_round_trip() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", |params| async move {
            Ok(params.unwrap_or(Value::Null))
        });

        let handler = registry.get("echo").unwrap();
        let result = handler(Some(json!({"text": "hi"}))).await.unwrap();
        assert_eq!(result, json!({"text": "hi"}));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn missing_required_parameter_named() {
        let mut registry = SchemaRegistry::new();
        registry.register(echo_schema());

        match registry.validate_args("echo", Some(&json!({"repeat": 2}))) {
            Err(McpError::InvalidParams(msg)) => assert!(msg.contains("'text'")),
            other => panic!("expected invalid params, got {:?}", other),
        }
        match registry.validate_args("echo", None) {
            Err(McpError::InvalidParams(msg)) => assert!(msg.contains("'text'")),
            other => panic!("expected invalid params, got {:?}", other),
        }
    }

    #[test]
    fn unknown_parameter_named() {
        let mut registry = SchemaRegistry::new();
        registry.register(echo_schema());

        match registry.validate_args("echo", Some(&json!({"text": "x", "bogus": 1}))) {
            Err(McpError::InvalidParams(msg)) => assert!(msg.contains("'bogus'")),
            other => panic!("expected invalid params, got {:?}", other),
        }
    }

    #[test]
    fn type_mismatch_named() {
        let mut registry = SchemaRegistry::new();
        registry.register(echo_schema());

        match registry.validate_args("echo", Some(&json!({"text": 5}))) {
            Err(McpError::InvalidParams(msg)) => {
                assert!(msg.contains("'text'"));
                assert!(msg.contains("string"));
            }
            other => panic!("expected invalid params, got {:?}", other),
        }
    }

    #[test]
    fn unregistered_name_is_method_not_found() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.validate_args("ghost", None),
            Err(McpError::MethodNotFound(_))
        ));
    }

    #[test]
    fn entries_are_name_sorted() {
        let mut registry = SchemaRegistry::new();
        registry.register(MethodSchema::new("zeta", None, json!({"type": "object"})));
        registry.register(MethodSchema::new("alpha", None, json!({"type": "object"})));
        let names: Vec<&str> = registry.entries().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
