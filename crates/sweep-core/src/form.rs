//! Preconfiguration form model.
//!
//! A [`FormSpec`] is a plain tree: groups own their child fields and no node
//! is shared. Values are captured as a JSON object ([`ConfigValues`]) whose
//! nesting mirrors the groups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Captured preconfiguration values of an action.
pub type ConfigValues = Map<String, Value>;

/// A form describing an action's preconfiguration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

/// One form element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Kind of a form element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Checkbox,
    Select {
        options: Vec<SelectOption>,
        #[serde(default)]
        multiple: bool,
    },
    /// Nested fields stored under this field's key.
    Group { fields: Vec<FormField> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Validation failure of one field, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Construction
// =============================================================================

impl FormField {
    fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Text { max_length: None })
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Number { min: None, max: None })
    }

    pub fn checkbox(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Checkbox)
    }

    pub fn select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Select {
                options,
                multiple: false,
            },
        )
    }

    pub fn group(key: impl Into<String>, label: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self::new(key, label, FieldKind::Group { fields })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

impl FormSpec {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self {
            title: None,
            fields,
        }
    }

    /// Return a copy whose defaults are the given existing values.
    pub fn prefilled(&self, existing: &ConfigValues) -> Self {
        Self {
            title: self.title.clone(),
            fields: prefill_fields(&self.fields, existing),
        }
    }

    /// Validate submitted values and return the normalized configuration.
    ///
    /// Missing optional fields fall back to their defaults; keys that are
    /// not part of the form are dropped.
    pub fn validate(&self, submitted: &ConfigValues) -> Result<ConfigValues, Vec<FieldError>> {
        let mut errors = Vec::new();
        let config = validate_fields(&self.fields, submitted, "", &mut errors);
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

fn prefill_fields(fields: &[FormField], existing: &ConfigValues) -> Vec<FormField> {
    fields
        .iter()
        .map(|field| {
            let mut field = field.clone();
            match (&mut field.kind, existing.get(&field.key)) {
                (FieldKind::Group { fields }, Some(Value::Object(nested))) => {
                    *fields = prefill_fields(fields, nested);
                }
                (FieldKind::Group { .. }, _) => {}
                (_, Some(value)) => field.default = Some(value.clone()),
                (_, None) => {}
            }
            field
        })
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

fn validate_fields(
    fields: &[FormField],
    submitted: &ConfigValues,
    prefix: &str,
    errors: &mut Vec<FieldError>,
) -> ConfigValues {
    let mut config = ConfigValues::new();

    for field in fields {
        let path = if prefix.is_empty() {
            field.key.clone()
        } else {
            format!("{}.{}", prefix, field.key)
        };

        if let FieldKind::Group { fields: children } = &field.kind {
            let empty = ConfigValues::new();
            let nested = match submitted.get(&field.key) {
                Some(Value::Object(map)) => map,
                Some(Value::Null) | None => &empty,
                Some(_) => {
                    errors.push(FieldError::new(path, "must be a group of values"));
                    continue;
                }
            };
            let value = validate_fields(children, nested, &path, errors);
            config.insert(field.key.clone(), Value::Object(value));
            continue;
        }

        let value = match submitted.get(&field.key) {
            Some(v) if !is_blank(v) => v.clone(),
            _ => match &field.default {
                Some(default) => default.clone(),
                None if field.required => {
                    errors.push(FieldError::new(path, format!("{} is required", field.label)));
                    continue;
                }
                None => continue,
            },
        };

        match check_value(&field.kind, &value) {
            Ok(value) => {
                config.insert(field.key.clone(), value);
            }
            Err(message) => errors.push(FieldError::new(path, message)),
        }
    }

    config
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn check_value(kind: &FieldKind, value: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::Text { max_length } => {
            let text = value.as_str().ok_or("must be text")?;
            if let Some(max) = max_length {
                if text.chars().count() > *max {
                    return Err(format!("must be at most {} characters", max));
                }
            }
            Ok(value.clone())
        }
        FieldKind::Number { min, max } => {
            // Kept as parsed so integers stay integers.
            let number = match value {
                Value::Number(n) => Some(n.clone()),
                Value::String(s) => s.trim().parse::<serde_json::Number>().ok(),
                _ => None,
            }
            .ok_or("must be a number")?;
            let approx = number.as_f64().ok_or("must be a finite number")?;
            if min.is_some_and(|min| approx < min) || max.is_some_and(|max| approx > max) {
                return Err("is out of range".to_string());
            }
            Ok(Value::Number(number))
        }
        FieldKind::Checkbox => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s == "1" || s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s == "0" || s == "false" => Ok(Value::Bool(false)),
            _ => Err("must be checked or unchecked".to_string()),
        },
        FieldKind::Select { options, multiple } => {
            let allowed = |v: &Value| {
                v.as_str()
                    .is_some_and(|s| options.iter().any(|o| o.value == s))
            };
            match value {
                Value::Array(values) if *multiple => {
                    if values.iter().all(allowed) {
                        Ok(value.clone())
                    } else {
                        Err("contains an invalid choice".to_string())
                    }
                }
                v if allowed(v) => Ok(value.clone()),
                _ => Err("is not a valid choice".to_string()),
            }
        }
        FieldKind::Group { .. } => Ok(value.clone()),
    }
}
