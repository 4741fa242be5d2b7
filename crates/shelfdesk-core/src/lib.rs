//! Client core for the shelfdesk library management UI.
//!
//! The UI screens talk to the library REST API exclusively through
//! [`ApiGateway`], which owns the stored credentials, attaches them to every
//! call and handles access token renewal. A failed renewal clears the session
//! and surfaces [`GatewayError::SessionExpired`]; where to send the user next
//! is up to the UI.

pub mod api;
pub mod auth;
pub mod config;
pub mod logging;
pub mod models;

pub use api::{ApiGateway, GatewayError, LibraryApi, RequestOptions};
pub use auth::{Access, CredentialPair, CredentialVault, Role, SessionUser, TokenStore};
pub use config::{GatewayConfig, StorageBackend};
