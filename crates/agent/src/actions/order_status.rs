use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use parley_core::action::{
    text_value, Action, ActionType, Clarification, FieldDescriptor, Fulfillment,
    FulfillmentContext,
};
use parley_core::errors::{AssignmentError, FulfillmentError};
use parley_core::reply::Card;
use parley_core::value::{FieldType, TypedValue};
use reqwest::Url;

pub const ORDER_ID: &str = "OrderId";
pub const ASK_ORDER_NUMBER: &str = "Please give me your order number.";

const SHIPMENT_STATUS: &str =
    "Shipment is currently in Cam Ranh bay, Khanh Hoa. The status is Delivered.";
const ROUTE: [&str; 3] =
    ["Port of Hai Phong, Hai Phong", "Cam Ranh bay, Khanh Hoa, 650000", "Saigon Port, Ho Chi Minh city"];
const TRANSIT_DAYS: u64 = 7;

#[derive(Debug, Default)]
pub struct GetOrderStatusAction {
    pub order_id: Option<String>,
}

impl GetOrderStatusAction {
    fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

#[async_trait]
impl Action for GetOrderStatusAction {
    fn type_name(&self) -> &'static str {
        "GetOrderStatusAction"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::new(ORDER_ID, FieldType::text())]
    }

    fn assign(&mut self, field: &str, value: TypedValue) -> Result<(), AssignmentError> {
        match field {
            ORDER_ID => self.order_id = Some(text_value(field, value)?),
            other => return Err(AssignmentError::UnknownField(other.to_owned())),
        }
        Ok(())
    }

    fn value_of(&self, field: &str) -> Option<TypedValue> {
        match field {
            ORDER_ID => self.order_id.clone().map(TypedValue::Text),
            _ => None,
        }
    }

    fn clarification(&self) -> Option<Clarification> {
        match self.order_id() {
            Some(_) => None,
            None => Some(Clarification::new(ORDER_ID, ASK_ORDER_NUMBER)),
        }
    }

    async fn fulfill(&self, _ctx: &FulfillmentContext) -> Result<Fulfillment, FulfillmentError> {
        let Some(order_id) = self.order_id() else {
            return Ok(Fulfillment::Text(ASK_ORDER_NUMBER.to_owned()));
        };

        let today = Local::now().date_naive();
        Ok(Fulfillment::Card(status_card(order_id, today)))
    }
}

impl ActionType for GetOrderStatusAction {
    const INTENTS: &'static [&'static str] = &["Order.GetStatus"];
    const DESCRIPTION: &'static str = "Get the status from order ID";
}

fn status_card(order_id: &str, today: NaiveDate) -> Card {
    let arrival = today.checked_add_days(Days::new(TRANSIT_DAYS)).unwrap_or(today);
    let card = Card::new(format!("Order number {order_id}"))
        .subtitle(format!("Expected arrive date: {}", arrival.format("%Y-%m-%d")))
        .text(SHIPMENT_STATUS);

    match route_map_url() {
        Some(url) => card.image(url),
        None => card,
    }
}

fn route_map_url() -> Option<String> {
    let path = format!("color:red|{}", ROUTE.join("|"));
    Url::parse_with_params(
        "https://maps.googleapis.com/maps/api/staticmap",
        &[("center", ROUTE[1]), ("size", "500x500"), ("zoom", "4"), ("path", path.as_str())],
    )
    .ok()
    .map(String::from)
}
