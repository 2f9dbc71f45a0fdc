//! Loosely-typed oracle values and the strongly-typed values fields accept.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A value as the NLU oracle hands it over: either a single scalar or a
/// multi-value collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(String),
    Collection(Vec<RawValue>),
}

impl RawValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn collection<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Collection(values.into_iter().map(|value| Self::Scalar(value.into())).collect())
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.write_str(value),
            Self::Collection(values) => {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Integer,
    Decimal,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ScalarKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }
}

/// Declared type of an action field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    Array(Box<FieldType>),
    Enumeration(&'static [&'static str]),
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn text() -> Self {
        Self::Scalar(ScalarKind::Text)
    }

    pub fn integer() -> Self {
        Self::Scalar(ScalarKind::Integer)
    }

    pub fn decimal() -> Self {
        Self::Scalar(ScalarKind::Decimal)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarKind::Float)
    }

    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Boolean)
    }

    pub fn date() -> Self {
        Self::Scalar(ScalarKind::Date)
    }

    pub fn date_time() -> Self {
        Self::Scalar(ScalarKind::DateTime)
    }

    pub fn enumeration(symbols: &'static [&'static str]) -> Self {
        Self::Enumeration(symbols)
    }

    pub fn array_of(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn is_array(&self) -> bool {
        match self {
            Self::Array(_) => true,
            Self::Optional(inner) => inner.is_array(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.label()),
            Self::Array(element) => write!(f, "[{element}]"),
            Self::Enumeration(symbols) => write!(f, "enum({})", symbols.join("|")),
            Self::Optional(inner) => write!(f, "{inner}?"),
        }
    }
}

/// A value already converted to the declared type of its target field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Symbol(String),
    List(Vec<TypedValue>),
}

impl TypedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) | Self::Symbol(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            Self::DateTime(value) => Some(value.date()),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) | Self::Symbol(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Self::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            Self::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldType, RawValue, TypedValue};

    #[test]
    fn raw_collection_renders_comma_joined() {
        let value = RawValue::collection(["Drama", "Horror"]);
        assert_eq!(value.to_string(), "Drama,Horror");
        assert!(value.is_collection());
    }

    #[test]
    fn optional_array_reports_array_shape() {
        let declared = FieldType::optional(FieldType::array_of(FieldType::text()));
        assert!(declared.is_array());
        assert_eq!(declared.to_string(), "[text]?");
    }

    #[test]
    fn raw_value_deserializes_nested_json_arrays() {
        let value: RawValue =
            serde_json::from_str(r#"["10", ["20", "30"]]"#).expect("raw value should decode");
        assert_eq!(
            value,
            RawValue::Collection(vec![
                RawValue::scalar("10"),
                RawValue::collection(["20", "30"]),
            ])
        );
    }

    #[test]
    fn typed_list_display_is_bracketed() {
        let list = TypedValue::List(vec![TypedValue::Integer(1), TypedValue::Integer(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }
}
