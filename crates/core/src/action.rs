//! Typed actions: the unit of work an intent resolves to.
//!
//! An action type declares its intent bindings and field schema statically
//! through [`ActionType`]; the registry reads those declarations once at
//! startup. Instances are plain structs that accept coerced values through
//! [`Action::assign`] and produce a [`Fulfillment`] when executed.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::errors::{AssignmentError, FulfillmentError};
use crate::reply::Card;
use crate::value::{FieldType, TypedValue};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub declared_type: FieldType,
    pub writable: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, declared_type: FieldType) -> Self {
        Self { name, declared_type, writable: true }
    }

    pub fn read_only(name: &'static str, declared_type: FieldType) -> Self {
        Self { name, declared_type, writable: false }
    }
}

/// A question the host should ask before the action can be fulfilled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clarification {
    pub field: &'static str,
    pub prompt: String,
}

impl Clarification {
    pub fn new(field: &'static str, prompt: impl Into<String>) -> Self {
        Self { field, prompt: prompt.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fulfillment {
    Text(String),
    Card(Card),
    Cards(Vec<Card>),
    Nothing,
}

#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn fields(&self) -> Vec<FieldDescriptor>;

    fn assign(&mut self, field: &str, value: TypedValue) -> Result<(), AssignmentError>;

    fn value_of(&self, field: &str) -> Option<TypedValue>;

    fn clarification(&self) -> Option<Clarification> {
        None
    }

    async fn fulfill(&self, ctx: &FulfillmentContext) -> Result<Fulfillment, FulfillmentError>;
}

/// Static declaration of an action type, read by the registry at startup.
pub trait ActionType: Action + Default + 'static {
    const INTENTS: &'static [&'static str];
    const DESCRIPTION: &'static str;
}

/// Per-turn context handed to fulfillment: correlation id, cancellation and
/// the downstream services the host injected.
#[derive(Clone, Default)]
pub struct FulfillmentContext {
    pub correlation_id: String,
    pub cancel: CancellationToken,
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl FulfillmentContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), ..Self::default() }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_service<S>(mut self, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.insert(TypeId::of::<S>(), Arc::new(service));
        self
    }

    pub fn service<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<S>())
            .and_then(|service| service.downcast_ref::<Arc<S>>())
            .cloned()
    }

    pub fn require<S>(&self) -> Result<Arc<S>, FulfillmentError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.service::<S>().ok_or(FulfillmentError::MissingService(std::any::type_name::<S>()))
    }
}

impl fmt::Debug for FulfillmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FulfillmentContext")
            .field("correlation_id", &self.correlation_id)
            .field("services", &self.services.len())
            .finish_non_exhaustive()
    }
}

// Conversions used by `Action::assign` implementations.

fn mismatch(field: &str, expected: &str) -> AssignmentError {
    AssignmentError::TypeMismatch { field: field.to_owned(), expected: expected.to_owned() }
}

pub fn text_value(field: &str, value: TypedValue) -> Result<String, AssignmentError> {
    match value {
        TypedValue::Text(text) | TypedValue::Symbol(text) => Ok(text),
        _ => Err(mismatch(field, "text")),
    }
}

pub fn integer_value(field: &str, value: TypedValue) -> Result<i64, AssignmentError> {
    value.as_integer().ok_or_else(|| mismatch(field, "integer"))
}

pub fn date_value(field: &str, value: TypedValue) -> Result<NaiveDate, AssignmentError> {
    value.as_date().ok_or_else(|| mismatch(field, "date"))
}

pub fn symbol_value<T>(field: &str, value: TypedValue) -> Result<T, AssignmentError>
where
    T: FromStr,
{
    match value {
        TypedValue::Symbol(symbol) => symbol.parse().map_err(|_| mismatch(field, "enumeration")),
        _ => Err(mismatch(field, "enumeration")),
    }
}

pub fn symbol_list<T>(field: &str, value: TypedValue) -> Result<Vec<T>, AssignmentError>
where
    T: FromStr,
{
    match value {
        TypedValue::List(values) => {
            values.into_iter().map(|value| symbol_value(field, value)).collect()
        }
        _ => Err(mismatch(field, "list of enumeration symbols")),
    }
}
