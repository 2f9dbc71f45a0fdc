use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use parley_core::action::{
    date_value, integer_value, Action, ActionType, Clarification, FieldDescriptor, Fulfillment,
    FulfillmentContext,
};
use parley_core::errors::{AssignmentError, FulfillmentError};
use parley_core::value::{FieldType, TypedValue};
use tracing::info;

use crate::bookstore::BookstoreOperations;

pub const BOOK_ID: &str = "BookId";
pub const START_DATE: &str = "StartDate";
pub const DAYS: &str = "Days";

const DEFAULT_DAYS: u32 = 3;
const DEFAULT_RESERVATION_ID: u32 = 1;
const MAX_DAYS: i64 = 14;

#[derive(Debug, Default)]
pub struct ReserveBookAction {
    pub book_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub days: Option<i64>,
}

#[async_trait]
impl Action for ReserveBookAction {
    fn type_name(&self) -> &'static str {
        "ReserveBookAction"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new(BOOK_ID, FieldType::integer()),
            FieldDescriptor::new(START_DATE, FieldType::optional(FieldType::date())),
            FieldDescriptor::new(DAYS, FieldType::optional(FieldType::integer())),
        ]
    }

    fn assign(&mut self, field: &str, value: TypedValue) -> Result<(), AssignmentError> {
        match field {
            BOOK_ID => self.book_id = Some(integer_value(field, value)?),
            START_DATE => self.start_date = Some(date_value(field, value)?),
            DAYS => {
                let days = integer_value(field, value)?;
                if !(1..=MAX_DAYS).contains(&days) {
                    return Err(AssignmentError::OutOfRange {
                        field: field.to_owned(),
                        value: days.to_string(),
                        expected: format!("1 to {MAX_DAYS} days"),
                    });
                }
                self.days = Some(days);
            }
            other => return Err(AssignmentError::UnknownField(other.to_owned())),
        }
        Ok(())
    }

    fn value_of(&self, field: &str) -> Option<TypedValue> {
        match field {
            BOOK_ID => self.book_id.map(TypedValue::Integer),
            START_DATE => self.start_date.map(TypedValue::Date),
            DAYS => self.days.map(TypedValue::Integer),
            _ => None,
        }
    }

    fn clarification(&self) -> Option<Clarification> {
        match self.book_id {
            Some(_) => None,
            None => Some(Clarification::new(BOOK_ID, "Which book would you like to reserve?")),
        }
    }

    async fn fulfill(&self, ctx: &FulfillmentContext) -> Result<Fulfillment, FulfillmentError> {
        let Some(book_id) = self.book_id else {
            return Err(FulfillmentError::NotReady("no book selected".to_owned()));
        };
        let start_date = self.start_date.unwrap_or_else(|| Local::now().date_naive());
        let days = self.days.and_then(|days| u32::try_from(days).ok()).unwrap_or(DEFAULT_DAYS);

        let bookstore = ctx.require::<dyn BookstoreOperations>()?;
        let reservation =
            bookstore.reserve_book(DEFAULT_RESERVATION_ID, book_id, start_date, days).await?;

        info!(
            event_name = "agent.bookstore.reserved",
            correlation_id = %ctx.correlation_id,
            book_id,
            booking_id = reservation.booking_id,
            days,
            "book reserved"
        );

        Ok(Fulfillment::Text(format!(
            "Success. Your Book Booking Id is {}.",
            reservation.booking_id
        )))
    }
}

impl ActionType for ReserveBookAction {
    const INTENTS: &'static [&'static str] = &["Reserve.Book"];
    const DESCRIPTION: &'static str = "Reserve a book for a number of days";
}
