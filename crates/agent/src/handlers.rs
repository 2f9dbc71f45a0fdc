//! Reply handlers for the bookstore demo and the wiring that registers them.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::action::{Fulfillment, FulfillmentContext};
use parley_core::errors::{ConfigurationError, HandlerError};
use parley_core::registry::ActionRegistry;
use parley_core::reply::{Reply, ReplyBuilder};
use parley_core::router::{HandlerRouter, IntentHandler, OutcomeHandler, Turn};

use crate::actions::order_status::ASK_ORDER_NUMBER;
use crate::actions::{FindBooksAction, GetOrderStatusAction, ReserveBookAction};
use crate::bookstore::BookstoreOperations;

pub const HELP_INTENT: &str = "Help";
pub const GREETING: &str = "Hi! How can I help you?";
pub const NOT_UNDERSTOOD: &str =
    "Sorry, I did not understand. Type 'help' if you need assistance.";

pub struct OrderStatusHandler;

#[async_trait]
impl OutcomeHandler for OrderStatusHandler {
    async fn handle(&self, fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        match fulfillment {
            Fulfillment::Card(card) => Ok(Reply::card(card)),
            Fulfillment::Text(text) => Ok(Reply::text(text)),
            Fulfillment::Nothing => Ok(Reply::text(ASK_ORDER_NUMBER)),
            Fulfillment::Cards(_) => Err(HandlerError::new("order status returned several cards")),
        }
    }
}

pub struct BooksHandler;

#[async_trait]
impl OutcomeHandler for BooksHandler {
    async fn handle(&self, fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        match fulfillment {
            Fulfillment::Cards(cards) => {
                let summary = format!("I found in total {} Books for your genre", cards.len());
                Ok(cards
                    .into_iter()
                    .fold(ReplyBuilder::new().text(summary).carousel(), ReplyBuilder::attachment)
                    .build())
            }
            Fulfillment::Card(card) => Ok(Reply::card(card)),
            Fulfillment::Text(text) => Ok(Reply::text(text)),
            Fulfillment::Nothing => Err(HandlerError::new("book search produced no result")),
        }
    }
}

pub struct ReservationHandler;

#[async_trait]
impl OutcomeHandler for ReservationHandler {
    async fn handle(&self, fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        match fulfillment {
            Fulfillment::Text(text) => Ok(Reply::text(text)),
            Fulfillment::Card(card) => Ok(Reply::card(card)),
            Fulfillment::Cards(_) | Fulfillment::Nothing => {
                Err(HandlerError::new("reservation produced no confirmation"))
            }
        }
    }
}

pub struct HelpHandler;

#[async_trait]
impl IntentHandler for HelpHandler {
    async fn handle(&self, _turn: &Turn, _fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        Ok(Reply::text(GREETING))
    }
}

pub struct NotUnderstoodHandler;

#[async_trait]
impl IntentHandler for NotUnderstoodHandler {
    async fn handle(&self, _turn: &Turn, _fulfillment: Fulfillment) -> Result<Reply, HandlerError> {
        Ok(Reply::text(NOT_UNDERSTOOD))
    }
}

pub fn default_registry() -> Result<ActionRegistry, ConfigurationError> {
    ActionRegistry::builder()
        .register::<GetOrderStatusAction>()
        .register::<FindBooksAction>()
        .register::<ReserveBookAction>()
        .build()
}

/// Router for the bookstore demo; `bookstore` is injected into every fulfillment.
pub fn default_router(
    bookstore: Arc<dyn BookstoreOperations>,
) -> Result<HandlerRouter, ConfigurationError> {
    HandlerRouter::builder()
        .route_outcome(&["Order.GetStatus"], OrderStatusHandler)
        .route_outcome(&["Books.Search", "Books.Browse"], BooksHandler)
        .route_outcome(&["Reserve.Book"], ReservationHandler)
        .route(&[HELP_INTENT], HelpHandler)
        .route(&["", "None"], NotUnderstoodHandler)
        .services(FulfillmentContext::default().with_service(bookstore))
        .build()
}
