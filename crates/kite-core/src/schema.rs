use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::SchemaError;
use crate::state::json_type_label;
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    StringArray,
    Object,
}

impl SemanticType {
    pub fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringArray => "array<string>",
            Self::Object => "object",
        }
    }

    pub fn check(self, path: &str, value: &Value) -> Result<(), SchemaError> {
        let ok = match (self, value) {
            (Self::String, Value::String(_))
            | (Self::Number, Value::Number(_))
            | (Self::Boolean, Value::Bool(_))
            | (Self::Object, Value::Object(_)) => true,
            (Self::StringArray, Value::Array(items)) => {
                if let Some(idx) = items.iter().position(|item| !item.is_string()) {
                    return Err(SchemaError::new(
                        format!("{path}[{idx}]"),
                        format!("expected string, got {}", json_type_label(&items[idx])),
                    ));
                }
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(SchemaError::new(
                path,
                format!("expected {}, got {}", self.label(), json_type_label(value)),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SemanticType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: &str, ty: SemanticType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: &str, ty: SemanticType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Arguments of an invocation after they have been checked against the
/// descriptor's parameter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionArgs(Map<String, Value>);

impl ActionArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn string_list(&self, name: &str) -> Option<Vec<String>> {
        self.0.get(name).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

pub fn validate_args(params: &[ParamSpec], raw: &Value) -> Result<ActionArgs, SchemaError> {
    let fields = match raw {
        Value::Null => Map::new(),
        Value::Object(fields) => fields.clone(),
        other => {
            return Err(SchemaError::new(
                "args",
                format!("expected an object, got {}", json_type_label(other)),
            ))
        }
    };

    if let Some(unknown) = fields
        .keys()
        .find(|key| !params.iter().any(|param| &param.name == *key))
    {
        return Err(SchemaError::new(
            format!("args.{unknown}"),
            "unexpected argument",
        ));
    }

    let mut checked = Map::new();
    for param in params {
        match fields.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(SchemaError::new(
                        format!("args.{}", param.name),
                        "missing required argument",
                    ));
                }
            }
            Some(value) => {
                param.ty.check(&format!("args.{}", param.name), value)?;
                checked.insert(param.name.clone(), value.clone());
            }
        }
    }
    Ok(ActionArgs(checked))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SemanticType,
    #[serde(default)]
    pub description: String,
}

/// Declared shape of the shared state. Unknown fields are rejected so the
/// local copy never carries anything the agent would not receive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSchema {
    pub fields: Vec<StateField>,
}

impl StateSchema {
    pub fn field(mut self, name: &str, ty: SemanticType, description: &str) -> Self {
        self.fields.push(StateField {
            name: name.to_string(),
            ty,
            description: description.to_string(),
        });
        self
    }

    pub fn field_type(&self, name: &str) -> Option<SemanticType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.ty)
    }

    pub fn validate(&self, state: &SharedState) -> Result<(), SchemaError> {
        for (name, value) in state.fields() {
            let Some(ty) = self.field_type(name) else {
                return Err(SchemaError::new(name.as_str(), "field is not declared"));
            };
            ty.check(name, value)?;
        }
        Ok(())
    }
}
