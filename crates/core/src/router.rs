use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::action::{Action, Fulfillment, FulfillmentContext};
use crate::errors::{ConfigurationError, DispatchError, FulfillmentError, HandlerError};
use crate::reply::Reply;

/// One inbound utterance as the host received it.
#[derive(Clone, Debug)]
pub struct Turn {
    pub correlation_id: String,
    pub text: String,
    pub user_id: Option<String>,
    pub cancel: CancellationToken,
}

impl Turn {
    pub fn new(correlation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            text: text.into(),
            user_id: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new("unknown-correlation-id", "")
    }
}

/// Handler receiving the whole turn alongside the fulfillment.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    async fn handle(&self, turn: &Turn, fulfillment: Fulfillment) -> Result<Reply, HandlerError>;
}

/// Handler that only looks at the fulfillment.
#[async_trait]
pub trait OutcomeHandler: Send + Sync {
    async fn handle(&self, fulfillment: Fulfillment) -> Result<Reply, HandlerError>;
}

struct OutcomeAdapter<H> {
    inner: H,
}

#[async_trait]
impl<H> IntentHandler for OutcomeAdapter<H>
where
    H: OutcomeHandler + 'static,
{
    async fn handle(&self, _turn: &Turn, fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        self.inner.handle(fulfillment).await
    }
}

#[derive(Default)]
pub struct HandlerRouterBuilder {
    routes: Vec<(String, Arc<dyn IntentHandler>)>,
    services: FulfillmentContext,
}

impl HandlerRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to each intent name. An empty name binds the default handler.
    pub fn route<H>(mut self, intents: &[&str], handler: H) -> Self
    where
        H: IntentHandler + 'static,
    {
        let handler: Arc<dyn IntentHandler> = Arc::new(handler);
        for intent in intents {
            self.routes.push((intent.trim().to_owned(), Arc::clone(&handler)));
        }
        self
    }

    pub fn route_outcome<H>(self, intents: &[&str], handler: H) -> Self
    where
        H: OutcomeHandler + 'static,
    {
        self.route(intents, OutcomeAdapter { inner: handler })
    }

    pub fn fallback<H>(self, handler: H) -> Self
    where
        H: IntentHandler + 'static,
    {
        self.route(&[""], handler)
    }

    /// Services made available to every action fulfilled through this router.
    pub fn services(mut self, services: FulfillmentContext) -> Self {
        self.services = services;
        self
    }

    pub fn build(self) -> Result<HandlerRouter, ConfigurationError> {
        let mut handlers: HashMap<String, Arc<dyn IntentHandler>> = HashMap::new();
        let mut fallback = None;

        for (intent, handler) in self.routes {
            if intent.is_empty() {
                if fallback.replace(handler).is_some() {
                    return Err(ConfigurationError::DuplicateHandler { intent });
                }
                continue;
            }
            if handlers.contains_key(&intent) {
                return Err(ConfigurationError::DuplicateHandler { intent });
            }
            handlers.insert(intent, handler);
        }

        Ok(HandlerRouter { handlers, fallback, services: self.services })
    }
}

pub struct HandlerRouter {
    handlers: HashMap<String, Arc<dyn IntentHandler>>,
    fallback: Option<Arc<dyn IntentHandler>>,
    services: FulfillmentContext,
}

impl HandlerRouter {
    pub fn builder() -> HandlerRouterBuilder {
        HandlerRouterBuilder::new()
    }

    /// Fulfills `action` (if any) and hands the result to the handler for `intent`.
    pub async fn dispatch(
        &self,
        turn: &Turn,
        intent: Option<&str>,
        action: Option<&dyn Action>,
    ) -> Result<Reply, DispatchError> {
        let intent = intent.map(str::trim).unwrap_or_default();
        let handler = self.handler_for(intent)?;

        let fulfillment = match action {
            Some(action) => self.fulfill(turn, action).await?,
            None => Fulfillment::Nothing,
        };

        let reply = handler.handle(turn, fulfillment).await.map_err(|error| {
            warn!(
                event_name = "engine.router.handler_failed",
                correlation_id = %turn.correlation_id,
                intent,
                error = %error,
                "intent handler failed"
            );
            DispatchError::Handler { intent: intent.to_owned(), message: error.message }
        })?;

        info!(
            event_name = "engine.router.dispatched",
            correlation_id = %turn.correlation_id,
            intent,
            action_type = action.map(|action| action.type_name()).unwrap_or_default(),
            attachments = reply.attachments.len(),
            "turn dispatched"
        );
        Ok(reply)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len() + usize::from(self.fallback.is_some())
    }

    fn handler_for(&self, intent: &str) -> Result<&Arc<dyn IntentHandler>, ConfigurationError> {
        self.handlers
            .get(intent)
            .or(self.fallback.as_ref())
            .ok_or_else(|| ConfigurationError::MissingDefaultHandler { intent: intent.to_owned() })
    }

    async fn fulfill(&self, turn: &Turn, action: &dyn Action) -> Result<Fulfillment, FulfillmentError> {
        let mut ctx = self.services.clone().with_cancel(turn.cancel.clone());
        ctx.correlation_id = turn.correlation_id.clone();

        tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => Err(FulfillmentError::Cancelled),
            result = action.fulfill(&ctx) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::{HandlerRouter, IntentHandler, OutcomeHandler, Turn};
    use crate::action::{Action, Fulfillment};
    use crate::errors::{ConfigurationError, DispatchError, FulfillmentError, HandlerError};
    use crate::registry::fixtures::TrackParcel;
    use crate::reply::Reply;

    struct Echo;

    #[async_trait]
    impl IntentHandler for Echo {
        async fn handle(&self, turn: &Turn, fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
            Ok(match fulfillment {
                Fulfillment::Text(text) => Reply::text(format!("{}: {text}", turn.correlation_id)),
                _ => Reply::text(format!("{}: nothing", turn.correlation_id)),
            })
        }
    }

    struct NotUnderstood;

    #[async_trait]
    impl OutcomeHandler for NotUnderstood {
        async fn handle(&self, _fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
            Ok(Reply::text("Sorry, I did not understand."))
        }
    }

    struct Failing;

    #[async_trait]
    impl IntentHandler for Failing {
        async fn handle(&self, _turn: &Turn, _fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
            Err(HandlerError::new("template missing"))
        }
    }

    fn tracked() -> TrackParcel {
        TrackParcel { tracking_number: Some("1Z999".to_owned()), carrier: None }
    }

    #[tokio::test]
    async fn dispatch_fulfills_action_and_calls_handler() {
        let router = HandlerRouter::builder()
            .route(&["Parcel.Track", "Parcel.Where"], Echo)
            .build()
            .expect("router builds");
        let action = tracked();

        let reply = router
            .dispatch(&Turn::new("turn-1", "where is 1Z999"), Some("Parcel.Where"), Some(&action))
            .await
            .expect("dispatch succeeds");

        assert_eq!(reply.text.as_deref(), Some("turn-1: parcel 1Z999 is in transit"));
    }

    #[tokio::test]
    async fn missing_handler_falls_back_to_default() {
        let router = HandlerRouter::builder()
            .route(&["Parcel.Track"], Echo)
            .route_outcome(&["", "None"], NotUnderstood)
            .build()
            .expect("router builds");

        let unknown = router.dispatch(&Turn::default(), Some("Weather"), None).await;
        let absent = router.dispatch(&Turn::default(), None, None).await;

        assert_eq!(unknown.expect("fallback").text.as_deref(), Some("Sorry, I did not understand."));
        assert_eq!(absent.expect("fallback").text.as_deref(), Some("Sorry, I did not understand."));
        assert_eq!(router.handler_count(), 3);
    }

    #[tokio::test]
    async fn no_handler_and_no_default_is_a_configuration_error() {
        let router =
            HandlerRouter::builder().route(&["Parcel.Track"], Echo).build().expect("router builds");

        let error = router.dispatch(&Turn::default(), Some("Help"), None).await.expect_err("no route");

        assert_eq!(
            error,
            DispatchError::Configuration(ConfigurationError::MissingDefaultHandler {
                intent: "Help".to_owned()
            })
        );
    }

    #[test]
    fn duplicate_handler_fails_the_build() {
        let result = HandlerRouter::builder()
            .route(&["Parcel.Track"], Echo)
            .route(&["Parcel.Track"], Failing)
            .build();

        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateHandler { intent }) if intent == "Parcel.Track"
        ));
    }

    #[test]
    fn two_default_handlers_fail_the_build() {
        let result = HandlerRouter::builder().fallback(Echo).route(&[""], Failing).build();

        assert!(matches!(result, Err(ConfigurationError::DuplicateHandler { .. })));
    }

    #[tokio::test]
    async fn handler_failure_carries_the_intent() {
        let router =
            HandlerRouter::builder().route(&["Help"], Failing).build().expect("router builds");

        let error = router.dispatch(&Turn::default(), Some("Help"), None).await.expect_err("fails");

        assert_eq!(
            error,
            DispatchError::Handler { intent: "Help".to_owned(), message: "template missing".to_owned() }
        );
    }

    #[tokio::test]
    async fn cancelled_turn_skips_fulfillment() {
        let router = HandlerRouter::builder().fallback(Echo).build().expect("router builds");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let action = tracked();
        let action: &dyn Action = &action;

        let error = router
            .dispatch(&Turn::new("turn-9", "").with_cancel(cancel), Some("Parcel.Track"), Some(action))
            .await
            .expect_err("cancelled");

        assert_eq!(error, DispatchError::Fulfillment(FulfillmentError::Cancelled));
    }
}
