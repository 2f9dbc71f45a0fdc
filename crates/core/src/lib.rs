pub mod action;
pub mod audit;
pub mod binder;
pub mod coercion;
pub mod config;
pub mod errors;
pub mod nlu;
pub mod registry;
pub mod reply;
pub mod resolver;
pub mod router;
pub mod value;

pub use action::{
    Action, ActionType, Clarification, FieldDescriptor, Fulfillment, FulfillmentContext,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use binder::{assign_value, bind, TieBreak};
pub use coercion::coerce;
pub use errors::{
    ConfigurationError, DispatchError, EngineError, FormatError, FulfillmentError, HandlerError,
    InterfaceError, TransportError, UnresolvedIntentError,
};
pub use nlu::{ClassificationResult, EntityOrigin, ExtractedEntity, IntentScore, NluOracle};
pub use registry::{ActionDescriptor, ActionRegistry, ActionTypeHandle, RegistryBuilder};
pub use reply::{Card, CardButton, Reply, ReplyBuilder};
pub use resolver::{ActionResolver, QueryOutcome, Resolution};
pub use router::{HandlerRouter, HandlerRouterBuilder, IntentHandler, OutcomeHandler, Turn};
pub use value::{FieldType, RawValue, ScalarKind, TypedValue};
