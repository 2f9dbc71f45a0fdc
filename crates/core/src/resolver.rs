//! Turns a classification into a populated action instance, and re-queries the
//! oracle when a single field still needs a value.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::binder::{assign_value, bind, TieBreak};
use crate::errors::{TransportError, UnresolvedIntentError};
use crate::nlu::{is_none_intent, ClassificationResult, IntentScore, NluOracle, NONE_INTENT};
use crate::registry::ActionRegistry;
use crate::value::RawValue;

/// Result of resolving one classification.
#[derive(Debug, Default)]
pub struct Resolution {
    /// The winning intent name, reported even when no action is bound to it.
    pub intent: Option<String>,
    pub action: Option<Box<dyn Action>>,
    /// Whether every writable field of `action` was filled.
    pub fully_bound: bool,
}

impl Resolution {
    pub fn intent_name(&self) -> &str {
        self.intent.as_deref().unwrap_or_default()
    }
}

/// Result of a single-field re-query.
#[derive(Default)]
pub struct QueryOutcome {
    pub succeeded: bool,
    pub redirected_action: Option<Box<dyn Action>>,
    pub redirected_intent: Option<String>,
}

impl QueryOutcome {
    fn filled(succeeded: bool) -> Self {
        Self { succeeded, ..Self::default() }
    }

    pub fn is_redirect(&self) -> bool {
        self.redirected_action.is_some()
    }
}

impl fmt::Debug for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOutcome")
            .field("succeeded", &self.succeeded)
            .field("redirected_action", &self.redirected_action.as_ref().map(|a| a.type_name()))
            .field("redirected_intent", &self.redirected_intent)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ActionResolver {
    registry: Arc<ActionRegistry>,
    none_intent: String,
}

impl ActionResolver {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry, none_intent: NONE_INTENT.to_owned() }
    }

    /// Treats `none_intent` as "nothing matched" in addition to the built-in sentinel.
    pub fn with_none_intent(mut self, none_intent: impl Into<String>) -> Self {
        self.none_intent = none_intent.into();
        self
    }

    pub fn is_none(&self, intent: &str) -> bool {
        is_none_intent(intent) || intent.trim().eq_ignore_ascii_case(self.none_intent.trim())
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn select_intent(
        &self,
        classification: &ClassificationResult,
    ) -> Result<IntentScore, UnresolvedIntentError> {
        classification.winning_intent().cloned().ok_or(UnresolvedIntentError)
    }

    pub fn resolve(&self, classification: &ClassificationResult) -> Resolution {
        self.resolve_with(classification, None)
    }

    pub fn resolve_with(
        &self,
        classification: &ClassificationResult,
        tie_break: Option<&dyn TieBreak>,
    ) -> Resolution {
        let Ok(selected) = self.select_intent(classification) else {
            info!(event_name = "engine.resolver.no_intent", query = %classification.query, "no intent to resolve");
            return Resolution::default();
        };

        let intent = selected.intent;
        if self.is_none(&intent) {
            return Resolution { intent: Some(intent), ..Resolution::default() };
        }

        let Some(descriptor) = self.registry.lookup(&intent) else {
            debug!(
                event_name = "engine.resolver.unbound_intent",
                intent = %intent,
                "intent has no action binding"
            );
            return Resolution { intent: Some(intent), ..Resolution::default() };
        };

        let mut action = descriptor.action_type.instantiate();
        let fully_bound =
            bind(action.as_mut(), &descriptor.fields, &classification.entities, tie_break);

        info!(
            event_name = "engine.resolver.intent_selected",
            intent = %intent,
            action_type = descriptor.action_type.name,
            score = selected.score.unwrap_or_default(),
            fully_bound,
            "action resolved"
        );

        Resolution { intent: Some(intent), action: Some(action), fully_bound }
    }

    /// Sends `answer` back to the oracle to fill `field` on `action`.
    ///
    /// If the answer classifies as a different action the outcome carries the
    /// new action and `action` is left untouched. A cancelled query writes
    /// nothing.
    pub async fn resolve_from_free_text(
        &self,
        oracle: &dyn NluOracle,
        action: &mut dyn Action,
        field: &str,
        answer: &str,
        cancel: &CancellationToken,
        tie_break: Option<&dyn TieBreak>,
    ) -> Result<QueryOutcome, TransportError> {
        let classification = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = oracle.classify(answer) => result,
        };

        let classification = match classification {
            Ok(classification) => classification,
            Err(error) => {
                warn!(
                    event_name = "engine.resolver.requery_failed",
                    action_type = action.type_name(),
                    field,
                    error = %error,
                    "oracle re-query failed"
                );
                return Err(error);
            }
        };

        if let Some(outcome) = self.redirect(&classification, action, tie_break) {
            return Ok(outcome);
        }

        let Some(descriptor) = action.fields().into_iter().find(|candidate| candidate.name == field)
        else {
            return Ok(QueryOutcome::filled(false));
        };
        if !descriptor.writable {
            return Ok(QueryOutcome::filled(false));
        }

        let targeted = [descriptor];
        if bind(action, &targeted, &classification.entities, tie_break) {
            return Ok(QueryOutcome::filled(true));
        }

        Ok(QueryOutcome::filled(assign_value(action, field, &RawValue::scalar(answer))))
    }

    fn redirect(
        &self,
        classification: &ClassificationResult,
        current: &dyn Action,
        tie_break: Option<&dyn TieBreak>,
    ) -> Option<QueryOutcome> {
        let leading = classification.leading_intent()?;
        if self.is_none(&leading.intent) {
            return None;
        }

        let resolution = self.resolve_with(classification, tie_break);
        let redirected = resolution.action?;
        if redirected.type_name() == current.type_name() {
            return None;
        }

        info!(
            event_name = "engine.resolver.redirected",
            from_action = current.type_name(),
            to_action = redirected.type_name(),
            intent = resolution.intent.as_deref().unwrap_or_default(),
            "answer redirected to a different action"
        );

        Some(QueryOutcome {
            succeeded: false,
            redirected_action: Some(redirected),
            redirected_intent: resolution.intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::ActionResolver;
    use crate::errors::TransportError;
    use crate::nlu::{ClassificationResult, ExtractedEntity, IntentScore, NluOracle};
    use crate::registry::fixtures::{CancelParcel, TrackParcel};
    use crate::registry::ActionRegistry;
    use crate::value::TypedValue;

    struct ScriptedOracle {
        response: ClassificationResult,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(response: ClassificationResult) -> Self {
            Self { response, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl NluOracle for ScriptedOracle {
        async fn classify(&self, text: &str) -> Result<ClassificationResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClassificationResult { query: text.to_owned(), ..self.response.clone() })
        }
    }

    struct PendingOracle;

    #[async_trait]
    impl NluOracle for PendingOracle {
        async fn classify(&self, _text: &str) -> Result<ClassificationResult, TransportError> {
            std::future::pending().await
        }
    }

    fn resolver() -> ActionResolver {
        let registry = ActionRegistry::builder()
            .register::<TrackParcel>()
            .register::<CancelParcel>()
            .build()
            .expect("registry builds");
        ActionResolver::new(Arc::new(registry))
    }

    #[test]
    fn resolve_binds_entities_of_the_winning_intent() {
        let classification = ClassificationResult::with_top_intent("Parcel.Track", 0.93)
            .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber"))
            .with_entity(ExtractedEntity::custom("UPS", "Carrier"));

        let resolution = resolver().resolve(&classification);

        assert_eq!(resolution.intent.as_deref(), Some("Parcel.Track"));
        assert!(resolution.fully_bound);
        let action = resolution.action.expect("action is bound");
        assert_eq!(action.value_of("TrackingNumber"), Some(TypedValue::Text("1Z999".to_owned())));
    }

    #[test]
    fn resolve_without_intents_yields_nothing() {
        let resolution = resolver().resolve(&ClassificationResult::default());

        assert!(resolution.intent.is_none());
        assert!(resolution.action.is_none());
    }

    #[test]
    fn none_intent_reports_name_without_action() {
        let resolution = resolver().resolve(&ClassificationResult::with_top_intent("NONE", 0.7));

        assert_eq!(resolution.intent.as_deref(), Some("NONE"));
        assert!(resolution.action.is_none());
    }

    #[test]
    fn unbound_intent_is_reported_for_handler_routing() {
        let resolution = resolver().resolve(&ClassificationResult::with_top_intent("Help", 0.99));

        assert_eq!(resolution.intent_name(), "Help");
        assert!(resolution.action.is_none());
    }

    #[test]
    fn partially_bound_action_is_still_returned() {
        let classification = ClassificationResult::with_top_intent("Parcel.Where", 0.8)
            .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber"));

        let resolution = resolver().resolve(&classification);

        assert!(!resolution.fully_bound);
        assert_eq!(resolution.action.map(|action| action.type_name()), Some("TrackParcel"));
    }

    #[test]
    fn select_intent_falls_back_to_best_alternative() {
        let classification = ClassificationResult {
            intents: vec![IntentScore::new("Help", 0.1), IntentScore::new("Parcel.Cancel", 0.6)],
            ..ClassificationResult::default()
        };

        let selected = resolver().select_intent(&classification).expect("an intent wins");
        assert_eq!(selected.intent, "Parcel.Cancel");
        assert!(resolver().select_intent(&ClassificationResult::default()).is_err());
    }

    #[tokio::test]
    async fn free_text_answer_fills_the_requested_field() {
        let oracle = ScriptedOracle::new(
            ClassificationResult::with_top_intent("None", 0.6)
                .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber")),
        );
        let mut action = TrackParcel::default();

        let outcome = resolver()
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "TrackingNumber",
                "it is 1Z999",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(outcome.succeeded);
        assert!(!outcome.is_redirect());
        assert_eq!(action.tracking_number.as_deref(), Some("1Z999"));
        assert!(action.carrier.is_none());
    }

    #[tokio::test]
    async fn free_text_falls_back_to_the_raw_answer() {
        let oracle = ScriptedOracle::new(ClassificationResult::with_top_intent("None", 0.9));
        let mut action = TrackParcel::default();

        let outcome = resolver()
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "Carrier",
                "DHL",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(outcome.succeeded);
        assert_eq!(action.carrier.as_deref(), Some("DHL"));
    }

    #[tokio::test]
    async fn different_action_redirects_and_leaves_original_untouched() {
        let oracle = ScriptedOracle::new(
            ClassificationResult::with_top_intent("Parcel.Cancel", 0.88)
                .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber")),
        );
        let mut action = TrackParcel::default();

        let outcome = resolver()
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "TrackingNumber",
                "actually cancel 1Z999",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(!outcome.succeeded);
        assert_eq!(outcome.redirected_intent.as_deref(), Some("Parcel.Cancel"));
        let redirected = outcome.redirected_action.expect("new action");
        assert_eq!(redirected.type_name(), "CancelParcel");
        assert_eq!(
            redirected.value_of("TrackingNumber"),
            Some(TypedValue::Text("1Z999".to_owned()))
        );
        assert!(action.tracking_number.is_none());
    }

    #[tokio::test]
    async fn same_action_type_does_not_redirect() {
        let oracle = ScriptedOracle::new(
            ClassificationResult::with_top_intent("Parcel.Where", 0.88)
                .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber")),
        );
        let mut action = TrackParcel::default();

        let outcome = resolver()
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "TrackingNumber",
                "where is 1Z999",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(outcome.succeeded);
        assert!(!outcome.is_redirect());
        assert_eq!(action.tracking_number.as_deref(), Some("1Z999"));
    }

    #[tokio::test]
    async fn configured_none_intent_neither_resolves_nor_redirects() {
        let resolver = resolver().with_none_intent("Parcel.Cancel");
        let classification = ClassificationResult::with_top_intent("Parcel.Cancel", 0.91)
            .with_entity(ExtractedEntity::custom("1Z999", "TrackingNumber"));

        let resolution = resolver.resolve(&classification);
        assert_eq!(resolution.intent.as_deref(), Some("Parcel.Cancel"));
        assert!(resolution.action.is_none());

        let oracle = ScriptedOracle::new(classification);
        let mut action = TrackParcel::default();
        let outcome = resolver
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "TrackingNumber",
                "cancel 1Z999",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(outcome.succeeded);
        assert!(!outcome.is_redirect());
        assert_eq!(action.tracking_number.as_deref(), Some("1Z999"));
    }

    #[tokio::test]
    async fn unknown_field_is_not_filled() {
        let oracle = ScriptedOracle::new(ClassificationResult::with_top_intent("None", 0.9));
        let mut action = TrackParcel::default();

        let outcome = resolver()
            .resolve_from_free_text(
                &oracle,
                &mut action,
                "Weight",
                "12kg",
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("oracle answers");

        assert!(!outcome.succeeded);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_query_writes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut action = TrackParcel::default();

        let error = resolver()
            .resolve_from_free_text(
                &PendingOracle,
                &mut action,
                "TrackingNumber",
                "1Z999",
                &cancel,
                None,
            )
            .await
            .expect_err("query is cancelled");

        assert_eq!(error, TransportError::Cancelled);
        assert!(action.tracking_number.is_none());
    }
}
