//! JSON Schema generation and validation.
//!
//! Schemas are generated from Rust types with [`schemars`] and checked with
//! [`jsonschema`]. The same validator guards tool arguments, handoff payloads
//! and structured agent output.

use schemars::JsonSchema;
use serde_json::Value;

use crate::chat::ResponseFormat;

/// Generate a JSON Schema from a Rust type.
///
/// Returns `(name, schema)` where `name` is the type's schema name and
/// `schema` has the `$schema` meta field removed.
#[must_use]
pub fn generate_json_schema<T: JsonSchema>() -> (String, Value) {
    let root = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(&root).unwrap_or_default();
    if let Value::Object(ref mut map) = schema {
        map.remove("$schema");
    }
    (T::schema_name().into_owned(), schema)
}

/// Validate `instance` against `schema`.
///
/// # Errors
///
/// Returns a description of every violation, joined with `"; "`, or of the
/// schema itself when it does not compile.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("invalid schema: {e}"))?;
    if validator.is_valid(instance) {
        return Ok(());
    }
    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{path}: {e}")
            }
        })
        .collect();
    Err(errors.join("; "))
}

/// Declared shape of an agent's final output.
///
/// When an agent has an output schema, its final message must be JSON
/// conforming to it; the run result then carries the parsed value.
///
/// ```rust,ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct Recipe { title: String, minutes: u32 }
///
/// let agent = Agent::new("chef").output_schema(OutputSchema::from_type::<Recipe>());
/// let recipe: Recipe = Runner::run(&agent, "pasta", RunConfig::default()).await?.parse()?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    schema: Value,
    strict: bool,
}

impl OutputSchema {
    /// Creates a new output schema with strict mode enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// Creates an output schema from a type deriving [`JsonSchema`].
    #[must_use]
    pub fn from_type<T: JsonSchema>() -> Self {
        let (name, schema) = generate_json_schema::<T>();
        Self::new(name, schema)
    }

    /// Set whether the backend is asked to enforce the schema strictly.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns the schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the JSON Schema definition.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Converts to the response format sent to the backend.
    #[must_use]
    pub fn to_response_format(&self) -> ResponseFormat {
        ResponseFormat::json_schema(&self.name, self.schema.clone(), self.strict)
    }

    /// Parse and validate a raw model reply.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `text` is not JSON or does not
    /// conform to the schema.
    pub fn parse_text(&self, text: &str) -> Result<Value, String> {
        let value: Value = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| format!("output is not valid JSON: {e}"))?;
        validate(&self.schema, &value)?;
        Ok(value)
    }
}

/// Strips a surrounding Markdown code fence (` ```json ... ``` `), which
/// models sometimes wrap around JSON replies.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, |inner| {
            inner.trim_start_matches("json").trim()
        })
}
