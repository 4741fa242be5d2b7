//! Typed client for the library resource endpoints.
//!
//! Each method maps one screen action onto one gateway call. No client-side
//! validation is done; the server's field errors come back in `GatewayError::Api`.

use serde::Serialize;

use crate::auth::Role;
use crate::models::{
    Author, Book, BookInput, Branch, Category, Fine, LibraryUser, Loan, LoanInput, Notification,
    Publisher, Reservation, ReservationStatus, UserInput,
};

use super::error::GatewayError;
use super::gateway::ApiGateway;
use super::request::RequestOptions;

/// Search and filter options for the book list.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub search: Option<String>,
    pub branch: Option<i64>,
    pub available_only: bool,
}

impl BookQuery {
    fn options(&self) -> RequestOptions {
        let mut options = RequestOptions::default();
        if let Some(ref term) = self.search {
            if !term.trim().is_empty() {
                options = options.query("search", term.trim());
            }
        }
        if let Some(branch) = self.branch {
            options = options.query("branch", branch.to_string());
        }
        if self.available_only {
            options = options.query("available_only", "true");
        }
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaidFilter {
    #[default]
    All,
    Unpaid,
    Paid,
}

/// All catalog lookups needed by the book editor.
#[derive(Debug, Clone, Default)]
pub struct CatalogLookups {
    pub authors: Vec<Author>,
    pub categories: Vec<Category>,
    pub publishers: Vec<Publisher>,
    pub branches: Vec<Branch>,
}

#[derive(Serialize)]
struct ReservationRequest {
    book: i64,
}

#[derive(Serialize)]
struct StatusUpdate {
    status: ReservationStatus,
}

#[derive(Serialize)]
struct AmountUpdate<'a> {
    amount: &'a str,
}

/// Library API client. Clone is cheap - it only wraps the shared gateway.
#[derive(Clone)]
pub struct LibraryApi {
    gateway: ApiGateway,
}

impl LibraryApi {
    pub fn new(gateway: ApiGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    // ===== Books =====

    pub async fn list_books(&self, query: &BookQuery) -> Result<Vec<Book>, GatewayError> {
        self.gateway.get_with("/books/", query.options()).await
    }

    pub async fn get_book(&self, book_id: i64) -> Result<Book, GatewayError> {
        self.gateway.get(&format!("/books/{}/", book_id)).await
    }

    pub async fn create_book(&self, book: &BookInput) -> Result<Book, GatewayError> {
        self.gateway.post("/books/", book).await
    }

    pub async fn update_book(&self, book_id: i64, book: &BookInput) -> Result<Book, GatewayError> {
        self.gateway.put(&format!("/books/{}/", book_id), book).await
    }

    pub async fn delete_book(&self, book_id: i64) -> Result<(), GatewayError> {
        self.gateway.delete(&format!("/books/{}/", book_id)).await?;
        Ok(())
    }

    // ===== Catalog lookups =====

    pub async fn list_authors(&self) -> Result<Vec<Author>, GatewayError> {
        self.gateway.get("/authors/").await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        self.gateway.get("/categories/").await
    }

    pub async fn list_publishers(&self) -> Result<Vec<Publisher>, GatewayError> {
        self.gateway.get("/publishers/").await
    }

    pub async fn list_branches(&self) -> Result<Vec<Branch>, GatewayError> {
        self.gateway.get("/branches/").await
    }

    /// Fetch all four lookups concurrently.
    pub async fn load_catalog_lookups(&self) -> Result<CatalogLookups, GatewayError> {
        let (authors, categories, publishers, branches) = futures::try_join!(
            self.list_authors(),
            self.list_categories(),
            self.list_publishers(),
            self.list_branches(),
        )?;
        Ok(CatalogLookups {
            authors,
            categories,
            publishers,
            branches,
        })
    }

    // ===== Loans =====

    pub async fn list_loans(&self) -> Result<Vec<Loan>, GatewayError> {
        self.gateway.get("/loans/").await
    }

    pub async fn create_loan(&self, loan: &LoanInput) -> Result<Loan, GatewayError> {
        self.gateway.post("/loans/", loan).await
    }

    pub async fn return_loan(&self, loan_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .post_action(&format!("/loans/{}/return/", loan_id))
            .await?;
        Ok(())
    }

    // ===== Reservations =====

    pub async fn list_reservations(&self) -> Result<Vec<Reservation>, GatewayError> {
        self.gateway.get("/reservations/").await
    }

    pub async fn create_reservation(&self, book_id: i64) -> Result<Reservation, GatewayError> {
        self.gateway
            .post("/reservations/", &ReservationRequest { book: book_id })
            .await
    }

    pub async fn cancel_reservation(&self, reservation_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .post_action(&format!("/reservations/{}/cancel/", reservation_id))
            .await?;
        Ok(())
    }

    pub async fn update_reservation_status(
        &self,
        reservation_id: i64,
        status: ReservationStatus,
    ) -> Result<(), GatewayError> {
        let path = format!("/reservations/{}/update-status/", reservation_id);
        self.gateway
            .send(
                reqwest::Method::POST,
                &path,
                Some(to_body(&StatusUpdate { status })?),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    // ===== Notifications =====

    pub async fn list_notifications(
        &self,
        filter: ReadFilter,
    ) -> Result<Vec<Notification>, GatewayError> {
        let options = match filter {
            ReadFilter::All => RequestOptions::default(),
            ReadFilter::Unread => RequestOptions::default().query("is_read", "false"),
            ReadFilter::Read => RequestOptions::default().query("is_read", "true"),
        };
        self.gateway.get_with("/notifications/", options).await
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .post_action(&format!("/notifications/{}/read/", notification_id))
            .await?;
        Ok(())
    }

    // ===== Fines =====

    pub async fn list_fines(&self, filter: PaidFilter) -> Result<Vec<Fine>, GatewayError> {
        let options = match filter {
            PaidFilter::All => RequestOptions::default(),
            PaidFilter::Unpaid => RequestOptions::default().query("paid", "false"),
            PaidFilter::Paid => RequestOptions::default().query("paid", "true"),
        };
        self.gateway.get_with("/fines/", options).await
    }

    pub async fn pay_fine(&self, fine_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .post_action(&format!("/fines/{}/pay/", fine_id))
            .await?;
        Ok(())
    }

    pub async fn update_fine(&self, fine_id: i64, amount: &str) -> Result<(), GatewayError> {
        let path = format!("/fines/{}/update/", fine_id);
        self.gateway
            .send(
                reqwest::Method::PUT,
                &path,
                Some(to_body(&AmountUpdate { amount })?),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_fine(&self, fine_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .delete(&format!("/fines/{}/delete/", fine_id))
            .await?;
        Ok(())
    }

    // ===== Users =====

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<LibraryUser>, GatewayError> {
        let options = match role {
            Some(role) => RequestOptions::default().query("role", role.as_str()),
            None => RequestOptions::default(),
        };
        self.gateway.get_with("/users/", options).await
    }

    pub async fn create_user(&self, user: &UserInput) -> Result<LibraryUser, GatewayError> {
        self.gateway.post("/users/", user).await
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        user: &UserInput,
    ) -> Result<LibraryUser, GatewayError> {
        self.gateway.put(&format!("/users/{}/", user_id), user).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .delete(&format!("/users/{}/", user_id))
            .await?;
        Ok(())
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(value).map_err(GatewayError::Encode)
}
