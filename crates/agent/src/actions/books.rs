use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use parley_core::action::{
    symbol_list, Action, ActionType, Clarification, FieldDescriptor, Fulfillment,
    FulfillmentContext,
};
use parley_core::errors::{AssignmentError, FulfillmentError};
use parley_core::reply::{Card, CardButton};
use parley_core::value::{FieldType, TypedValue};
use reqwest::Url;

use crate::bookstore::{Book, BookstoreOperations, BOOK_GENRES};

pub const GENRE: &str = "Genre";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Genre {
    Action,
    Drama,
    Fantasy,
    Horror,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "Action",
            Self::Drama => "Drama",
            Self::Fantasy => "Fantasy",
            Self::Horror => "Horror",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Action" => Ok(Self::Action),
            "Drama" => Ok(Self::Drama),
            "Fantasy" => Ok(Self::Fantasy),
            "Horror" => Ok(Self::Horror),
            other => Err(format!("unknown genre `{other}`")),
        }
    }
}

#[derive(Debug, Default)]
pub struct FindBooksAction {
    pub genres: Option<Vec<Genre>>,
}

impl FindBooksAction {
    fn requested_genres(&self) -> &[Genre] {
        self.genres.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl Action for FindBooksAction {
    fn type_name(&self) -> &'static str {
        "FindBooksAction"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::new(GENRE, FieldType::array_of(FieldType::enumeration(&BOOK_GENRES)))]
    }

    fn assign(&mut self, field: &str, value: TypedValue) -> Result<(), AssignmentError> {
        match field {
            GENRE => self.genres = Some(symbol_list(field, value)?),
            other => return Err(AssignmentError::UnknownField(other.to_owned())),
        }
        Ok(())
    }

    fn value_of(&self, field: &str) -> Option<TypedValue> {
        match field {
            GENRE => self.genres.as_ref().map(|genres| {
                TypedValue::List(
                    genres.iter().map(|genre| TypedValue::Symbol(genre.to_string())).collect(),
                )
            }),
            _ => None,
        }
    }

    fn clarification(&self) -> Option<Clarification> {
        if !self.requested_genres().is_empty() {
            return None;
        }
        Some(Clarification::new(
            GENRE,
            format!("Please choose book genres: {}", BOOK_GENRES.join(", ")),
        ))
    }

    async fn fulfill(&self, ctx: &FulfillmentContext) -> Result<Fulfillment, FulfillmentError> {
        let genres = self.requested_genres();
        if genres.is_empty() {
            return Err(FulfillmentError::NotReady("no genre selected".to_owned()));
        }

        let bookstore = ctx.require::<dyn BookstoreOperations>()?;
        let mut cards = Vec::new();
        for genre in genres {
            let books = bookstore.book_availability(genre.as_str()).await?;
            cards.extend(books.iter().map(|book| book_card(book, *genre)));
        }

        Ok(Fulfillment::Cards(cards))
    }
}

impl ActionType for FindBooksAction {
    const INTENTS: &'static [&'static str] = &["Books.Search", "Books.Browse"];
    const DESCRIPTION: &'static str = "Search books by genre";
}

fn book_card(book: &Book, genre: Genre) -> Card {
    let card = Card::new(book.name.clone())
        .subtitle(format!(
            "{} stars. {} reviews. From ${} per day.",
            book.rating, book.reviews, book.price_per_day
        ))
        .image(book.image_url.clone());

    let query = format!("books genre {genre}");
    match Url::parse_with_params("https://www.bing.com/search", &[("q", query.as_str())]) {
        Ok(url) => card.button(CardButton::open_url("More details", url)),
        Err(_) => card,
    }
}
