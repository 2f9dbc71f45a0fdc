use thiserror::Error;

/// Fatal wiring mistakes detected while building the registry or the router.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("intent `{intent}` is bound to both `{existing}` and `{attempted}`")]
    DuplicateIntent { intent: String, existing: &'static str, attempted: &'static str },
    #[error("action type `{action_type}` declares no usable intent binding")]
    EmptyIntentDeclaration { action_type: &'static str },
    #[error("intent `{intent}` has more than one handler")]
    DuplicateHandler { intent: String },
    #[error("no handler for intent `{intent}` and no default handler registered")]
    MissingDefaultHandler { intent: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot represent `{raw}` as {target}: {reason}")]
pub struct FormatError {
    pub raw: String,
    pub target: String,
    pub reason: String,
}

impl FormatError {
    pub fn new(raw: impl Into<String>, target: impl ToString, reason: impl Into<String>) -> Self {
        Self { raw: raw.into(), target: target.to_string(), reason: reason.into() }
    }
}

/// Raised by an action when a typed value cannot be stored in a field.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is read-only")]
    ReadOnly(String),
    #[error("field `{field}` expects {expected}")]
    TypeMismatch { field: String, expected: String },
    #[error("field `{field}` does not accept `{value}`: expected {expected}")]
    OutOfRange { field: String, value: String, expected: String },
    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("oracle request failed: {0}")]
    Http(String),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle rate limit exceeded")]
    RateLimited,
    #[error("oracle response could not be decoded: {0}")]
    Decode(String),
    #[error("oracle request timed out after {0}s")]
    Timeout(u64),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no winning intent could be selected from the classification")]
pub struct UnresolvedIntentError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("downstream service failure: {0}")]
    Service(String),
    #[error("service `{0}` is not available to this action")]
    MissingService(&'static str),
    #[error("action is not ready: {0}")]
    NotReady(String),
    #[error("fulfillment cancelled")]
    Cancelled,
}

/// Raised by an intent handler while building its reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),
    #[error("handler for `{intent}` failed: {message}")]
    Handler { intent: String, message: String },
}

/// Everything the engine can surface to its host.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    UnresolvedIntent(#[from] UnresolvedIntentError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not understood: {message}")]
    NotUnderstood { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotUnderstood { .. } => {
                "Sorry, I did not understand. Type 'help' if you need assistance."
            }
            Self::ServiceUnavailable { .. } => {
                "Something went wrong while talking to a service. Please try again shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotUnderstood { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl EngineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotUnderstood { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<EngineError> for InterfaceError {
    fn from(value: EngineError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            EngineError::UnresolvedIntent(error) => {
                Self::NotUnderstood { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::Transport(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::Dispatch(DispatchError::Fulfillment(error)) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::Configuration(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::Dispatch(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ConfigurationError, DispatchError, EngineError, FulfillmentError, InterfaceError,
        TransportError, UnresolvedIntentError,
    };

    #[test]
    fn unresolved_intent_maps_to_not_understood() {
        let interface = EngineError::from(UnresolvedIntentError).into_interface("turn-1");

        assert!(matches!(
            interface,
            InterfaceError::NotUnderstood { ref correlation_id, .. } if correlation_id == "turn-1"
        ));
        assert_eq!(
            interface.user_message(),
            "Sorry, I did not understand. Type 'help' if you need assistance."
        );
    }

    #[test]
    fn transport_error_maps_to_service_unavailable() {
        let interface = EngineError::from(TransportError::RateLimited).into_interface("turn-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "turn-2");
    }

    #[test]
    fn fulfillment_failure_is_a_service_problem_not_an_internal_one() {
        let interface = EngineError::from(DispatchError::from(FulfillmentError::Service(
            "reservation backend offline".to_owned(),
        )))
        .into_interface("turn-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = EngineError::from(ConfigurationError::MissingDefaultHandler {
            intent: "Order.GetStatus".to_owned(),
        })
        .into_interface("turn-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
