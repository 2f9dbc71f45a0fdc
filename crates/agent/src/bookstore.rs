//! Bookstore backend used by the demo actions.
//!
//! `InMemoryBookstore` is deterministic: the same seed always yields the same
//! catalogue and the same booking ids.

use async_trait::async_trait;
use chrono::NaiveDate;
use parley_core::errors::FulfillmentError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub const BOOK_GENRES: [&str; 4] = ["Action", "Drama", "Fantasy", "Horror"];

const BOOKS_PER_GENRE: u32 = 3;
const MAX_RESERVATION_DAYS: u32 = 14;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: u32,
    pub name: String,
    pub genre: String,
    pub rating: u8,
    pub reviews: u32,
    pub price_per_day: u32,
    pub image_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookReservation {
    pub booking_id: u32,
    pub book_id: i64,
    pub reservation_id: u32,
    pub start_date: NaiveDate,
    pub days: u32,
}

#[async_trait]
pub trait BookstoreOperations: Send + Sync {
    async fn existing_genres(&self) -> Result<Vec<String>, FulfillmentError>;

    /// Books of one genre, cheapest first.
    async fn book_availability(&self, genre: &str) -> Result<Vec<Book>, FulfillmentError>;

    async fn reserve_book(
        &self,
        reservation_id: u32,
        book_id: i64,
        start_date: NaiveDate,
        days: u32,
    ) -> Result<BookReservation, FulfillmentError>;
}

#[derive(Clone, Debug)]
pub struct InMemoryBookstore {
    seed: u64,
}

impl Default for InMemoryBookstore {
    fn default() -> Self {
        Self { seed: 1 }
    }
}

impl InMemoryBookstore {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn canonical_genre(genre: &str) -> Option<&'static str> {
        BOOK_GENRES.into_iter().find(|known| known.eq_ignore_ascii_case(genre.trim()))
    }
}

#[async_trait]
impl BookstoreOperations for InMemoryBookstore {
    async fn existing_genres(&self) -> Result<Vec<String>, FulfillmentError> {
        Ok(BOOK_GENRES.iter().map(|genre| (*genre).to_string()).collect())
    }

    async fn book_availability(&self, genre: &str) -> Result<Vec<Book>, FulfillmentError> {
        let Some(genre) = Self::canonical_genre(genre) else {
            return Err(FulfillmentError::Service(format!("unknown book genre `{genre}`")));
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut books = (1..=BOOKS_PER_GENRE)
            .map(|id| Book {
                id,
                name: format!("{genre} Book {id}"),
                genre: genre.to_string(),
                rating: rng.gen_range(1..5),
                reviews: rng.gen_range(0..5000),
                price_per_day: rng.gen_range(95..495),
                image_url: format!(
                    "https://placeholdit.imgix.net/~text?txtsize=35&txt=Book+{id}&w=500&h=260"
                ),
            })
            .collect::<Vec<_>>();

        books.sort_by_key(|book| book.price_per_day);
        Ok(books)
    }

    async fn reserve_book(
        &self,
        reservation_id: u32,
        book_id: i64,
        start_date: NaiveDate,
        days: u32,
    ) -> Result<BookReservation, FulfillmentError> {
        if days == 0 || days > MAX_RESERVATION_DAYS {
            return Err(FulfillmentError::Service(format!(
                "reservations last 1 to {MAX_RESERVATION_DAYS} days, got {days}"
            )));
        }

        let booking_id = StdRng::seed_from_u64(self.seed).gen_range(10_000..99_999);
        Ok(BookReservation { booking_id, book_id, reservation_id, start_date, days })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use parley_core::errors::FulfillmentError;

    use super::{BookstoreOperations, InMemoryBookstore, BOOK_GENRES};

    #[tokio::test]
    async fn availability_lists_three_books_cheapest_first() {
        let bookstore = InMemoryBookstore::default();

        let books = bookstore.book_availability("drama").await.expect("known genre");

        assert_eq!(books.len(), 3);
        assert!(books.windows(2).all(|pair| pair[0].price_per_day <= pair[1].price_per_day));
        assert!(books.iter().all(|book| book.name.starts_with("Drama Book ")));
        assert!(books.iter().all(|book| (1..5).contains(&book.rating)));
    }

    #[tokio::test]
    async fn same_seed_gives_same_catalogue() {
        let first = InMemoryBookstore::new(7).book_availability("Horror").await;
        let second = InMemoryBookstore::new(7).book_availability("Horror").await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_genre_is_a_service_error() {
        let error = InMemoryBookstore::default()
            .book_availability("Poetry")
            .await
            .expect_err("genre is not stocked");

        assert!(matches!(error, FulfillmentError::Service(message) if message.contains("Poetry")));
    }

    #[tokio::test]
    async fn reservation_echoes_request_with_booking_id() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");

        let reservation = InMemoryBookstore::default()
            .reserve_book(1, 2, start, 3)
            .await
            .expect("reservation succeeds");

        assert_eq!(reservation.book_id, 2);
        assert_eq!(reservation.start_date, start);
        assert!((10_000..99_999).contains(&reservation.booking_id));
    }

    #[tokio::test]
    async fn reservation_length_is_bounded() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");

        let result = InMemoryBookstore::default().reserve_book(1, 2, start, 15).await;

        assert!(result.is_err());
        let genres = InMemoryBookstore::default().existing_genres().await.expect("genres");
        assert_eq!(genres, BOOK_GENRES.map(str::to_string).to_vec());
    }
}
