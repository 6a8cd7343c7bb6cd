//! Typed input schemas for tools and prompts.
//!
//! Each tool or prompt declares an [`InputSchema`]. Arguments are checked
//! field by field before any handler runs; unknown keys and wrong types are
//! rejected, nothing is coerced.

use crate::error::ValidationError;
use crate::protocol::types::PromptArgument;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Primitive or structured type constraint for one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// JSON Schema `type` keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Name of the JSON type a value actually has.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub description: Option<String>,
    pub required: bool,
}

/// Ordered set of argument declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    fields: Vec<FieldSchema>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(name, field_type, true, None)
    }

    pub fn optional(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(name, field_type, false, None)
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        required: bool,
        description: Option<&str>,
    ) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            description: description.map(str::to_string),
            required,
        });
        self
    }

    /// Attach a description to the most recently declared field.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = Some(description.into());
        }
        self
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check an argument map. `null` stands for an empty map.
    pub fn validate(&self, arguments: &Value) -> Result<ValidatedArgs, ValidationError> {
        let empty = Map::new();
        let map = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(json_type_name(other))),
        };

        if let Some(unknown) = map.keys().find(|key| self.get(key).is_none()) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        let mut validated = Map::new();
        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(ValidationError::MissingField(field.name.clone()));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.field_type.accepts(value) => {
                    return Err(ValidationError::WrongType {
                        field: field.name.clone(),
                        expected: field.field_type.as_str(),
                        actual: json_type_name(value),
                    });
                }
                Some(value) => {
                    validated.insert(field.name.clone(), value.clone());
                }
            }
        }

        Ok(ValidatedArgs(validated))
    }

    /// JSON Schema object advertised in `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut property = json!({ "type": f.field_type.as_str() });
                if let Some(description) = &f.description {
                    property["description"] = json!(description);
                }
                (f.name.clone(), property)
            })
            .collect();

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Argument list advertised in `prompts/list`.
    pub fn to_prompt_arguments(&self) -> Vec<PromptArgument> {
        self.fields
            .iter()
            .map(|f| PromptArgument {
                name: f.name.clone(),
                description: f.description.clone(),
                required: Some(f.required),
            })
            .collect()
    }
}

/// Argument map that passed its schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Deserialize into the handler's argument struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> InputSchema {
        InputSchema::new()
            .required("name", FieldType::String)
            .describe("Full name")
            .required("age", FieldType::Integer)
            .optional("admin", FieldType::Boolean)
    }

    #[test]
    fn test_valid_arguments() {
        let args = user_schema()
            .validate(&json!({"name": "A", "age": 30}))
            .unwrap();
        assert_eq!(args.get_str("name"), Some("A"));
        assert_eq!(args.get("age"), Some(&json!(30)));
        assert!(args.get("admin").is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let err = user_schema().validate(&json!({"name": "A"})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("age".into()));

        let err = user_schema()
            .validate(&json!({"name": null, "age": 1}))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("name".into()));
    }

    #[test]
    fn test_wrong_type() {
        let err = user_schema()
            .validate(&json!({"name": "A", "age": "thirty"}))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                field: "age".into(),
                expected: "integer",
                actual: "string",
            }
        );

        let err = user_schema()
            .validate(&json!({"name": "A", "age": 1.5}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { actual: "number", .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = user_schema()
            .validate(&json!({"name": "A", "age": 1, "extra": true}))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("extra".into()));
    }

    #[test]
    fn test_non_object_arguments() {
        let err = user_schema().validate(&json!(["A"])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject("array"));

        // null is an empty map: fine for a schema without required fields
        assert!(InputSchema::new().validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_json_schema_shape() {
        let schema = user_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["name"]["description"], "Full name");
        assert_eq!(schema["required"], json!(["name", "age"]));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_prompt_arguments() {
        let args = user_schema().to_prompt_arguments();
        assert_eq!(args.len(), 3);
        assert_eq!(args[2].name, "admin");
        assert_eq!(args[2].required, Some(false));
    }
}
