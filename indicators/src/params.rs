//! Indicator parameter schema: the ordered set of named, typed parameters an indicator declares,
//! and the validated parameter map the framework builds from user input plus declared defaults
//! before any lifecycle method runs.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

/// The declared type of one [`ParamSpec`]. Validation coerces user input to this type and
/// rejects anything that doesn't fit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParamType {
    Integer,
    Decimal,
    String,
    Boolean,
}

/// One concrete parameter value, tagged by [`ParamType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Boolean(bool),
}

impl ParamValue {
    fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Decimal(_) => ParamType::Decimal,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Boolean(_) => ParamType::Boolean,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParamValue::Decimal(v) => Some(*v),
            ParamValue::Integer(v) => Some(Decimal::from(*v)),
            _ => None,
        }
    }
}

/// One entry in an indicator's parameter schema.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub param_type: ParamType,
    pub default: ParamValue,
    pub min: Option<ParamValue>,
    pub max: Option<ParamValue>,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(name: &'static str, display_name: &'static str, default: ParamValue) -> Self {
        let param_type = match default {
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Decimal(_) => ParamType::Decimal,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Boolean(_) => ParamType::Boolean,
        };
        Self { name, display_name, param_type, default, min: None, max: None, required: false }
    }

    pub fn with_range(mut self, min: ParamValue, max: ParamValue) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Raised when a caller-supplied parameter map fails validation against an indicator's schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("parameter {name} expected type {expected:?}, got {actual:?}")]
    WrongType { name: &'static str, expected: ParamType, actual: ParamType },
    #[error("parameter {name} value {value} is below minimum {min}")]
    BelowMin { name: &'static str, value: String, min: String },
    #[error("parameter {name} value {value} is above maximum {max}")]
    AboveMax { name: &'static str, value: String, max: String },
}

/// A validated, immutable-after-creation parameter map, keyed by [`ParamSpec::name`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(HashMap<String, ParamValue>);

impl Params {
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(ParamValue::as_integer)
    }

    pub fn get_decimal(&self, name: &str) -> Option<Decimal> {
        self.0.get(name).and_then(ParamValue::as_decimal)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParamValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(ParamValue::Boolean(v)) => Some(*v),
            _ => None,
        }
    }

    /// Validates `input` against `schema`, filling in any parameter `input` omits with its
    /// declared default. Every downstream lifecycle method receives only a [`Params`] built
    /// this way, never raw user input.
    pub fn validate(schema: &[ParamSpec], input: &HashMap<String, ParamValue>) -> Result<Self, ParamError> {
        let mut resolved = HashMap::with_capacity(schema.len());

        for spec in schema {
            let value = match input.get(spec.name) {
                Some(value) => {
                    if value.param_type() != spec.param_type {
                        return Err(ParamError::WrongType {
                            name: spec.name,
                            expected: spec.param_type,
                            actual: value.param_type(),
                        });
                    }
                    value.clone()
                }
                None if spec.required => return Err(ParamError::Missing(spec.name)),
                None => spec.default.clone(),
            };

            if let (Some(min), Some(decimal)) = (&spec.min, value.as_decimal()) {
                if let Some(min_decimal) = min.as_decimal() {
                    if decimal < min_decimal {
                        return Err(ParamError::BelowMin {
                            name: spec.name,
                            value: decimal.to_string(),
                            min: min_decimal.to_string(),
                        });
                    }
                }
            }
            if let (Some(max), Some(decimal)) = (&spec.max, value.as_decimal()) {
                if let Some(max_decimal) = max.as_decimal() {
                    if decimal > max_decimal {
                        return Err(ParamError::AboveMax {
                            name: spec.name,
                            value: decimal.to_string(),
                            max: max_decimal.to_string(),
                        });
                    }
                }
            }

            resolved.insert(spec.name.to_string(), value);
        }

        Ok(Self(resolved))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{v}"),
            ParamValue::Decimal(v) => write!(f, "{v}"),
            ParamValue::String(v) => write!(f, "{v}"),
            ParamValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![ParamSpec::new("period", "Period", ParamValue::Integer(14))
            .with_range(ParamValue::Integer(1), ParamValue::Integer(500))]
    }

    #[test]
    fn fills_in_default_when_absent() {
        let params = Params::validate(&schema(), &HashMap::new()).unwrap();
        assert_eq!(params.get_integer("period"), Some(14));
    }

    #[test]
    fn rejects_value_below_minimum() {
        let mut input = HashMap::new();
        input.insert("period".to_string(), ParamValue::Integer(0));
        assert!(matches!(Params::validate(&schema(), &input), Err(ParamError::BelowMin { .. })));
    }

    #[test]
    fn rejects_wrong_type() {
        let mut input = HashMap::new();
        input.insert("period".to_string(), ParamValue::String("oops".to_string()));
        assert!(matches!(Params::validate(&schema(), &input), Err(ParamError::WrongType { .. })));
    }
}
