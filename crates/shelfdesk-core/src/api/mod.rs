//! REST API access for the library service.
//!
//! This module provides the `ApiGateway`, which attaches bearer tokens to
//! outgoing calls and transparently renews an expired access token once per
//! call, plus `LibraryApi`, a typed client for the resource endpoints.
//!
//! The API uses JWT bearer tokens obtained from `/auth/login/` and renewed
//! through `/auth/token/refresh/`.

pub mod auth;
pub mod error;
pub mod gateway;
pub mod library;
pub mod request;
pub mod transport;

pub use auth::Registration;
pub use error::{GatewayError, TransportError};
pub use gateway::ApiGateway;
pub use library::{BookQuery, CatalogLookups, LibraryApi, PaidFilter, ReadFilter};
pub use request::{ApiResponse, PendingRequest, RequestOptions};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
