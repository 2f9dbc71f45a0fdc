//! Demo actions served by the bookstore assistant.

pub mod books;
pub mod order_status;
pub mod reservation;

pub use books::{FindBooksAction, Genre};
pub use order_status::GetOrderStatusAction;
pub use reservation::ReserveBookAction;
