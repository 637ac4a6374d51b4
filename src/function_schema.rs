//! Function Schema Definitions
//!
//! Internal description format for structured model outputs and tool
//! arguments, rendered to the JSON-Schema subset the chat API understands.

use crate::error::{OttoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Function definition for the chat API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    String {
        enum_values: Option<Vec<String>>,
        format: Option<String>,
    },
    Boolean,
    Integer,
    Number,
    Array(Box<ParamSchema>),
    Object(ObjectSchema),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    pub parameter_type: ParameterType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub schema: ParamSchema,
    pub optional: bool,
}

/// An object with ordered fields; the root of every tool contract.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub fields: Vec<FieldSpec>,
}

impl ParamSchema {
    pub fn string() -> Self {
        Self::of(ParameterType::String { enum_values: None, format: None })
    }

    pub fn enumeration(values: &[&str]) -> Self {
        Self::of(ParameterType::String {
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            format: None,
        })
    }

    pub fn boolean() -> Self {
        Self::of(ParameterType::Boolean)
    }

    pub fn integer() -> Self {
        Self::of(ParameterType::Integer)
    }

    pub fn number() -> Self {
        Self::of(ParameterType::Number)
    }

    pub fn array(items: ParamSchema) -> Self {
        Self::of(ParameterType::Array(Box::new(items)))
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::of(ParameterType::Object(schema))
    }

    fn of(parameter_type: ParameterType) -> Self {
        Self { parameter_type, description: None }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_format(mut self, fmt: impl Into<String>) -> Self {
        if let ParameterType::String { format, .. } = &mut self.parameter_type {
            *format = Some(fmt.into());
        }
        self
    }

    pub fn to_json_schema(&self) -> Value {
        let mut out = match &self.parameter_type {
            ParameterType::String { enum_values, format } => {
                let mut m = Map::new();
                m.insert("type".into(), json!("string"));
                if let Some(values) = enum_values {
                    m.insert("enum".into(), json!(values));
                }
                if let Some(f) = format {
                    m.insert("format".into(), json!(f));
                }
                m
            }
            ParameterType::Boolean => single("boolean"),
            ParameterType::Integer => single("integer"),
            ParameterType::Number => single("number"),
            ParameterType::Array(items) => {
                let mut m = single("array");
                m.insert("items".into(), items.to_json_schema());
                m
            }
            ParameterType::Object(obj) => match obj.to_json_schema() {
                Value::Object(m) => m,
                _ => Map::new(),
            },
        };
        if let Some(desc) = &self.description {
            out.insert("description".into(), json!(desc));
        }
        Value::Object(out)
    }

    fn validate_at(&self, value: &Value, path: &str, issues: &mut Vec<String>) {
        match &self.parameter_type {
            ParameterType::String { enum_values, .. } => match value.as_str() {
                Some(s) => {
                    if let Some(allowed) = enum_values {
                        if !allowed.iter().any(|a| a == s) {
                            issues.push(format!(
                                "{}: '{}' is not one of [{}]",
                                path,
                                s,
                                allowed.join(", ")
                            ));
                        }
                    }
                }
                None => issues.push(format!("{}: expected string", path)),
            },
            ParameterType::Boolean => {
                if !value.is_boolean() {
                    issues.push(format!("{}: expected boolean", path));
                }
            }
            ParameterType::Integer => {
                if !(value.is_i64() || value.is_u64()) {
                    issues.push(format!("{}: expected integer", path));
                }
            }
            ParameterType::Number => {
                if !value.is_number() {
                    issues.push(format!("{}: expected number", path));
                }
            }
            ParameterType::Array(items) => match value.as_array() {
                Some(arr) => {
                    for (idx, item) in arr.iter().enumerate() {
                        items.validate_at(item, &format!("{}[{}]", path, idx), issues);
                    }
                }
                None => issues.push(format!("{}: expected array", path)),
            },
            ParameterType::Object(obj) => obj.validate_at(value, path, issues),
        }
    }
}

fn single(type_name: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("type".into(), json!(type_name));
    m
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, schema: ParamSchema) -> Self {
        self.fields.push(FieldSpec { name: name.to_string(), schema, optional: false });
        self
    }

    pub fn optional(mut self, name: &str, schema: ParamSchema) -> Self {
        self.fields.push(FieldSpec { name: name.to_string(), schema, optional: true });
        self
    }

    /// Names of the fields that must be present.
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.schema.to_json_schema());
        }
        let mut out = Map::new();
        out.insert("type".into(), json!("object"));
        out.insert("properties".into(), Value::Object(properties));
        let required = self.required_fields();
        if !required.is_empty() {
            out.insert("required".into(), json!(required));
        }
        Value::Object(out)
    }

    /// Check a model-produced value; every problem found is reported at once.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let mut issues = Vec::new();
        self.validate_at(value, "$", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(OttoError::InvalidPlan(issues.join("; ")))
        }
    }

    fn validate_at(&self, value: &Value, path: &str, issues: &mut Vec<String>) {
        let Some(obj) = value.as_object() else {
            issues.push(format!("{}: expected object", path));
            return;
        };
        for field in &self.fields {
            let field_path = format!("{}.{}", path, field.name);
            match obj.get(&field.name) {
                None | Some(Value::Null) if field.optional => {}
                None | Some(Value::Null) => issues.push(format!("{}: missing required field", field_path)),
                Some(v) => field.schema.validate_at(v, &field_path, issues),
            }
        }
    }

    pub fn into_function(self, name: &str, description: &str) -> FunctionDefinition {
        FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters: self.to_json_schema(),
        }
    }
}

/// Parse a JSON argument blob emitted by the model and check it against `schema`.
pub fn parse_arguments(raw: &str, schema: &ObjectSchema) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        OttoError::InvalidPlan(format!("Failed to parse function call arguments: {}. Arguments: {}", e, raw))
    })?;
    schema.validate(&value)?;
    Ok(value)
}
