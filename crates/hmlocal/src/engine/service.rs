//! Entity services
//!
//! A platform may register a named service that targets one of its entities.
//! Service calls arrive as loose JSON objects; the schema validates and
//! coerces them before they are turned into a [`Command`].

use serde_json::Value;

use super::entity::EntityError;
use super::entity::Platform;
use super::message::Command;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unknown service {0}")]
    UnknownService(String),

    #[error("service data must be an object")]
    NotAnObject,

    #[error("required field {0} is missing")]
    MissingField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("unexpected field {0}")]
    ExtraField(String),

    #[error("service {service} does not apply to {platform} entities")]
    WrongPlatform { service: String, platform: Platform },

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// How a single field is checked and coerced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validator {
    /// Integer within the inclusive range
    IntRange { min: i64, max: i64 },
    /// Integer of at least zero
    PositiveInt,
    String,
}

impl Validator {
    fn coerce(self, field: &str, value: &Value) -> Result<Value, ServiceError> {
        let invalid = |reason: &str| ServiceError::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Validator::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(invalid("expected a string")),
            },
            Validator::PositiveInt => {
                let int = coerce_int(value).ok_or_else(|| invalid("expected an integer"))?;
                if int < 0 {
                    return Err(invalid("expected a positive integer"));
                }
                Ok(Value::from(int))
            }
            Validator::IntRange { min, max } => {
                let int = coerce_int(value).ok_or_else(|| invalid("expected an integer"))?;
                if !(min..=max).contains(&int) {
                    return Err(invalid(&format!("must be between {} and {}", min, max)));
                }
                Ok(Value::from(int))
            }
        }
    }
}

/// Integers may arrive as JSON integers, whole floats or numeric strings.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let float = n.as_f64()?;
            (float.fract() == 0.0).then_some(float as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: &'static str,
    validator: Validator,
    required: bool,
}

/// Field list of a service.
#[derive(Debug, Clone, Default)]
pub struct ServiceSchema {
    fields: Vec<Field>,
}

impl ServiceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, validator: Validator) -> Self {
        self.fields.push(Field {
            name,
            validator,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, validator: Validator) -> Self {
        self.fields.push(Field {
            name,
            validator,
            required: false,
        });
        self
    }

    pub fn validate(&self, data: &Value) -> Result<ServiceData, ServiceError> {
        let empty = serde_json::Map::new();
        let object = match data {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => return Err(ServiceError::NotAnObject),
        };

        if let Some(extra) = object
            .keys()
            .find(|key| !self.fields.iter().any(|f| f.name == key.as_str()))
        {
            return Err(ServiceError::ExtraField(extra.clone()));
        }

        let mut validated = serde_json::Map::new();
        for field in &self.fields {
            match object.get(field.name) {
                Some(value) if !value.is_null() => {
                    validated.insert(
                        field.name.to_string(),
                        field.validator.coerce(field.name, value)?,
                    );
                }
                _ if field.required => {
                    return Err(ServiceError::MissingField(field.name.to_string()));
                }
                _ => {}
            }
        }
        Ok(ServiceData(validated))
    }
}

/// Validated and coerced service call data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceData(serde_json::Map<String, Value>);

impl ServiceData {
    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_string)
    }
}

/// A service bound to one platform's entities.
#[derive(Debug, Clone)]
pub struct EntityService {
    pub platform: Platform,
    pub schema: ServiceSchema,
    pub build: fn(&ServiceData) -> Command,
}

impl EntityService {
    pub fn command(&self, data: &Value) -> Result<Command, ServiceError> {
        let data = self.schema.validate(data)?;
        Ok((self.build)(&data))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> ServiceSchema {
        ServiceSchema::new()
            .required("position", Validator::IntRange { min: 0, max: 100 })
            .optional("wait", Validator::PositiveInt)
            .optional("tone", Validator::String)
    }

    #[test]
    fn test_validate_coerces_integers() {
        let data = schema()
            .validate(&json!({"position": "50", "wait": 3.0}))
            .unwrap();
        assert_eq!(data.int("position"), Some(50));
        assert_eq!(data.int("wait"), Some(3));
        assert_eq!(data.string("tone"), None);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = schema().validate(&json!({"position": 101})).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidField { ref field, .. } if field == "position"));
    }

    #[test]
    fn test_validate_rejects_negative() {
        let err = schema()
            .validate(&json!({"position": 1, "wait": -1}))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidField { .. }));
    }

    #[test]
    fn test_validate_missing_and_extra() {
        assert!(matches!(
            schema().validate(&json!({})),
            Err(ServiceError::MissingField(f)) if f == "position"
        ));
        assert!(matches!(
            schema().validate(&json!({"position": 1, "speed": 2})),
            Err(ServiceError::ExtraField(f)) if f == "speed"
        ));
    }

    #[test]
    fn test_validate_fractional_is_not_an_integer() {
        assert!(schema().validate(&json!({"position": 1.5})).is_err());
    }

    #[test]
    fn test_null_data_with_optional_fields() {
        let schema = ServiceSchema::new().optional("tone", Validator::String);
        assert_eq!(schema.validate(&Value::Null).unwrap(), ServiceData::default());
    }
}
