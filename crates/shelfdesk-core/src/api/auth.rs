//! Login, registration and logout flows built on the gateway.
//!
//! Login and registration are anonymous calls: they never carry a bearer
//! token and a rejection never triggers token renewal.

use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{Access, AccessGuard, CredentialPair, Role, SessionUser};

use super::error::GatewayError;
use super::gateway::ApiGateway;
use super::request::RequestOptions;

const LOGIN_PATH: &str = "/auth/login/";
const REGISTER_PATH: &str = "/auth/register/";
const CURRENT_USER_PATH: &str = "/auth/me/";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    tokens: CredentialPair,
    user: SessionUser,
}

/// New account details for `/auth/register/`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("password_confirm", &"[REDACTED]")
            .field("role", &self.role)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

impl ApiGateway {
    /// Log in and store the issued tokens and user.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, GatewayError> {
        let body = LoginRequest { username, password };
        let auth: AuthResponse = self
            .send_json(Method::POST, LOGIN_PATH, Some(&body), RequestOptions::anonymous())
            .await?;
        self.begin_session(auth)
    }

    /// Create an account; the server logs the new user in immediately.
    pub async fn register(&self, registration: &Registration) -> Result<SessionUser, GatewayError> {
        let auth: AuthResponse = self
            .send_json(
                Method::POST,
                REGISTER_PATH,
                Some(registration),
                RequestOptions::anonymous(),
            )
            .await?;
        self.begin_session(auth)
    }

    /// Fetch the logged-in user from the server.
    pub async fn current_user(&self) -> Result<SessionUser, GatewayError> {
        self.get(CURRENT_USER_PATH).await
    }

    /// Forget the stored session. The server keeps no session state to end.
    pub fn logout(&self) -> Result<(), GatewayError> {
        self.vault().clear()?;
        info!("Logged out");
        Ok(())
    }

    pub fn session_user(&self) -> Result<Option<SessionUser>, GatewayError> {
        Ok(self.vault().session_user()?)
    }

    /// Same answer as `check_access(None)`: a token and a readable user.
    pub fn is_authenticated(&self) -> Result<bool, GatewayError> {
        Ok(self.check_access(None)?.is_granted())
    }

    /// Check the stored session against an optional role requirement.
    pub fn check_access(&self, required: Option<Role>) -> Result<Access, GatewayError> {
        Ok(AccessGuard::check(self.vault(), required)?)
    }

    fn begin_session(&self, auth: AuthResponse) -> Result<SessionUser, GatewayError> {
        self.vault().store_session(&auth.tokens, &auth.user)?;
        info!(username = %auth.user.username, role = %auth.user.role, "Session started");
        Ok(auth.user)
    }
}
