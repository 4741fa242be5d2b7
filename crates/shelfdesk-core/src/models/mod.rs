//! Data models for the library API resources.
//!
//! - `Book` and its catalog lookups: `Author`, `Category`, `Publisher`, `Branch`
//! - Circulation: `Loan`, `Reservation`, `Fine`
//! - `Notification`
//! - `LibraryUser`: account records managed by librarians

pub mod book;
pub mod circulation;
pub mod notification;
pub mod user;

pub use book::{Author, Book, BookInput, Branch, Category, Publisher};
pub use circulation::{Fine, Loan, LoanInput, Reservation, ReservationStatus};
pub use notification::Notification;
pub use user::{LibraryUser, UserInput};
