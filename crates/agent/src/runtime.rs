//! Multi-turn conversation loop: classify, resolve, clarify, dispatch.

use std::fmt;
use std::sync::Arc;

use parley_core::action::Action;
use parley_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use parley_core::errors::{EngineError, TransportError};
use parley_core::nlu::{NluOracle, NONE_INTENT};
use parley_core::reply::Reply;
use parley_core::resolver::ActionResolver;
use parley_core::router::{HandlerRouter, Turn};
use tracing::{info, warn};
use uuid::Uuid;

pub const GIVE_UP: &str = "Sorry, I don't understand.";

const DEFAULT_MAX_CLARIFICATION_ATTEMPTS: u32 = 3;

/// A field the conversation is waiting on.
struct PendingSlot {
    intent: String,
    action: Box<dyn Action>,
    field: &'static str,
    prompt: String,
    attempts: u32,
}

/// Per-conversation state owned by the host between turns.
pub struct ConversationState {
    pub conversation_id: String,
    pending: Option<PendingSlot>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self { conversation_id: conversation_id.into(), pending: None }
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_field(&self) -> Option<&'static str> {
        self.pending.as_ref().map(|slot| slot.field)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationState")
            .field("conversation_id", &self.conversation_id)
            .field("pending_field", &self.pending_field())
            .finish()
    }
}

pub struct ConversationRuntime {
    resolver: ActionResolver,
    router: HandlerRouter,
    oracle: Arc<dyn NluOracle>,
    audit: Arc<dyn AuditSink>,
    max_clarification_attempts: u32,
    none_intent: String,
}

impl ConversationRuntime {
    pub fn new(resolver: ActionResolver, router: HandlerRouter, oracle: Arc<dyn NluOracle>) -> Self {
        Self {
            resolver,
            router,
            oracle,
            audit: Arc::new(NoopAuditSink),
            max_clarification_attempts: DEFAULT_MAX_CLARIFICATION_ATTEMPTS,
            none_intent: NONE_INTENT.to_owned(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_max_clarification_attempts(mut self, attempts: u32) -> Self {
        self.max_clarification_attempts = attempts.max(1);
        self
    }

    /// Intent name the oracle uses for "nothing matched".
    pub fn with_none_intent(mut self, none_intent: impl Into<String>) -> Self {
        self.none_intent = none_intent.into();
        self.resolver = self.resolver.with_none_intent(self.none_intent.clone());
        self
    }

    pub async fn handle_turn(
        &self,
        state: &mut ConversationState,
        turn: &Turn,
    ) -> Result<Reply, EngineError> {
        info!(
            event_name = "agent.runtime.turn_received",
            correlation_id = %turn.correlation_id,
            conversation_id = %state.conversation_id,
            awaiting = state.pending_field(),
            "turn received"
        );

        if let Some(pending) = state.pending.take() {
            return self.answer_clarification(state, turn, pending).await;
        }

        let classification = tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            result = self.oracle.classify(&turn.text) => result?,
        };

        let resolution = self.resolver.resolve(&classification);
        let intent = resolution
            .intent
            .filter(|intent| !intent.trim().eq_ignore_ascii_case(self.none_intent.trim()));

        match (intent, resolution.action) {
            (Some(intent), Some(action)) => {
                self.record(
                    state,
                    turn,
                    AuditEvent::new(
                        &turn.correlation_id,
                        "intent_resolved",
                        AuditCategory::Resolution,
                        AuditOutcome::Success,
                    )
                    .for_intent(&intent)
                    .with_metadata("action_type", action.type_name())
                    .with_metadata("fully_bound", resolution.fully_bound.to_string()),
                );
                self.advance(state, turn, intent, action).await
            }
            (intent, _) => {
                let outcome =
                    if intent.is_some() { AuditOutcome::Success } else { AuditOutcome::Rejected };
                self.record(
                    state,
                    turn,
                    AuditEvent::new(
                        &turn.correlation_id,
                        "intent_without_action",
                        AuditCategory::Resolution,
                        outcome,
                    )
                    .for_intent(intent.as_deref().unwrap_or_default()),
                );
                self.dispatch(state, turn, intent.as_deref(), None).await
            }
        }
    }

    async fn answer_clarification(
        &self,
        state: &mut ConversationState,
        turn: &Turn,
        mut pending: PendingSlot,
    ) -> Result<Reply, EngineError> {
        let outcome = self
            .resolver
            .resolve_from_free_text(
                self.oracle.as_ref(),
                pending.action.as_mut(),
                pending.field,
                &turn.text,
                &turn.cancel,
                None,
            )
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                state.pending = Some(pending);
                return Err(error.into());
            }
        };

        if let Some(action) = outcome.redirected_action {
            let intent = outcome.redirected_intent.unwrap_or_default();
            self.record(
                state,
                turn,
                AuditEvent::new(
                    &turn.correlation_id,
                    "answer_redirected",
                    AuditCategory::Redirection,
                    AuditOutcome::Success,
                )
                .for_intent(&intent)
                .with_metadata("from_action", pending.action.type_name())
                .with_metadata("to_action", action.type_name()),
            );
            return self.advance(state, turn, intent, action).await;
        }

        if outcome.succeeded {
            self.record(
                state,
                turn,
                AuditEvent::new(
                    &turn.correlation_id,
                    "slot_filled",
                    AuditCategory::Clarification,
                    AuditOutcome::Success,
                )
                .for_intent(&pending.intent)
                .with_metadata("field", pending.field),
            );
            return self.advance(state, turn, pending.intent, pending.action).await;
        }

        pending.attempts += 1;
        if pending.attempts >= self.max_clarification_attempts {
            warn!(
                event_name = "agent.runtime.clarification_abandoned",
                correlation_id = %turn.correlation_id,
                conversation_id = %state.conversation_id,
                intent = %pending.intent,
                field = pending.field,
                attempts = pending.attempts,
                "giving up on clarification"
            );
            self.record(
                state,
                turn,
                AuditEvent::new(
                    &turn.correlation_id,
                    "clarification_abandoned",
                    AuditCategory::Clarification,
                    AuditOutcome::Rejected,
                )
                .for_intent(&pending.intent)
                .with_metadata("field", pending.field),
            );
            return Ok(Reply::text(GIVE_UP));
        }

        let prompt = Reply::text(&pending.prompt);
        state.pending = Some(pending);
        Ok(prompt)
    }

    /// Asks for the next missing field, or dispatches once nothing is missing.
    async fn advance(
        &self,
        state: &mut ConversationState,
        turn: &Turn,
        intent: String,
        action: Box<dyn Action>,
    ) -> Result<Reply, EngineError> {
        let Some(clarification) = action.clarification() else {
            return self.dispatch(state, turn, Some(&intent), Some(action.as_ref())).await;
        };

        info!(
            event_name = "agent.runtime.clarification_requested",
            correlation_id = %turn.correlation_id,
            conversation_id = %state.conversation_id,
            intent = %intent,
            field = clarification.field,
            "asking for missing field"
        );
        self.record(
            state,
            turn,
            AuditEvent::new(
                &turn.correlation_id,
                "clarification_requested",
                AuditCategory::Clarification,
                AuditOutcome::Success,
            )
            .for_intent(&intent)
            .with_metadata("field", clarification.field),
        );

        state.pending = Some(PendingSlot {
            intent,
            action,
            field: clarification.field,
            prompt: clarification.prompt.clone(),
            attempts: 0,
        });
        Ok(Reply::text(clarification.prompt))
    }

    async fn dispatch(
        &self,
        state: &ConversationState,
        turn: &Turn,
        intent: Option<&str>,
        action: Option<&dyn Action>,
    ) -> Result<Reply, EngineError> {
        let result = self.router.dispatch(turn, intent, action).await;
        let outcome = if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Failed };
        self.record(
            state,
            turn,
            AuditEvent::new(&turn.correlation_id, "turn_dispatched", AuditCategory::Dispatch, outcome)
                .for_intent(intent.unwrap_or_default()),
        );
        Ok(result?)
    }

    fn record(&self, state: &ConversationState, turn: &Turn, event: AuditEvent) {
        let mut event = event.in_conversation(&state.conversation_id);
        if let Some(user_id) = &turn.user_id {
            event = event.with_metadata("user_id", user_id);
        }
        self.audit.emit(event);
    }
}
