//! Authenticated request gateway for the library REST API.
//!
//! Every outbound call goes through `ApiGateway::send`, which attaches the
//! stored access token, and on a 401 renews the token once via the refresh
//! endpoint before retrying the original request. If renewal is impossible
//! the stored session is cleared and the caller gets `SessionExpired`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::CredentialVault;
use crate::config::GatewayConfig;

use super::error::{GatewayError, TransportError};
use super::request::{ApiResponse, PendingRequest, RequestOptions};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Token renewal endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    // Only present when the server rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

/// Why a renewal exchange did not produce a new access token.
#[derive(Error, Debug)]
enum RenewalError {
    #[error("renewal rejected with status {0}")]
    Rejected(StatusCode),

    #[error("renewal request failed: {0}")]
    Network(#[source] TransportError),

    #[error("renewal response missing access token: {0}")]
    Malformed(String),
}

/// Gateway to the library API.
/// Clone is cheap - clones share the transport, credential store and renewal lock.
#[derive(Clone)]
pub struct ApiGateway {
    base_url: Arc<str>,
    transport: Arc<dyn Transport>,
    vault: CredentialVault,
    // Held for the duration of one renewal exchange
    renewal: Arc<Mutex<()>>,
    coalesce_renewals: bool,
}

impl ApiGateway {
    pub fn new(
        base_url: impl AsRef<str>,
        transport: Arc<dyn Transport>,
        vault: CredentialVault,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
            transport,
            vault,
            renewal: Arc::new(Mutex::new(())),
            coalesce_renewals: true,
        }
    }

    /// Build a gateway with the configured store and a reqwest transport.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        let vault = CredentialVault::new(config.open_store()?);
        Ok(Self::new(&config.base_url, Arc::new(transport), vault)
            .with_coalesced_renewals(config.coalesce_renewals))
    }

    /// When disabled, every 401 performs its own renewal exchange.
    pub fn with_coalesced_renewals(mut self, enabled: bool) -> Self {
        self.coalesce_renewals = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Request entry points =====

    /// Send a request to `base_url + path`.
    ///
    /// Resolves with the 2xx response. Fails with `Api` for other statuses,
    /// `Network` when no response arrived, and `SessionExpired` when a 401
    /// could not be cured by one renewal and one retry.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, GatewayError> {
        self.execute(PendingRequest::new(method, path, body, options))
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, GatewayError> {
        self.send(Method::GET, path, None, options).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }

    /// POST without a body, for action endpoints like `/loans/{id}/return/`.
    pub async fn post_action(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(Method::POST, path, None, RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Send a serializable body and decode a JSON response.
    pub async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, GatewayError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(GatewayError::Encode)?;
        self.send(method, path, body, options).await?.json()
    }

    // ===== Request lifecycle =====

    async fn execute(&self, mut request: PendingRequest) -> Result<ApiResponse, GatewayError> {
        loop {
            let (sent_with, response) = self.dispatch(&request).await?;
            let status = response.status;

            if status.is_success() {
                return Ok(ApiResponse {
                    status,
                    body: response.body,
                });
            }

            if status != StatusCode::UNAUTHORIZED || request.options.anonymous {
                debug!(method = %request.method, path = %request.path, %status, "Request failed");
                return Err(GatewayError::from_status(status, &response.body));
            }

            if request.retried {
                warn!(method = %request.method, path = %request.path, "Still unauthorized after renewal");
                self.expire_session(Expiry::Access(sent_with.as_deref()));
                return Err(GatewayError::SessionExpired);
            }

            debug!(method = %request.method, path = %request.path, "Unauthorized, renewing access token");
            self.renew_after_unauthorized(sent_with.as_deref()).await?;
            request = request.into_retry();
        }
    }

    /// Attach credentials and put the request on the wire.
    /// Returns the access token that was attached, if any.
    async fn dispatch(
        &self,
        request: &PendingRequest,
    ) -> Result<(Option<String>, HttpResponse), GatewayError> {
        let token = if request.options.anonymous {
            None
        } else {
            self.vault.access_token()?
        };

        let mut headers = request.options.headers.clone();
        headers.remove(header::AUTHORIZATION);
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        }
        if let Some(ref token) = token {
            headers.insert(header::AUTHORIZATION, bearer(token)?);
        }

        let http_request = HttpRequest {
            method: request.method.clone(),
            url: self.url_for(&request.path),
            query: request.options.query.clone(),
            headers,
            body: request.body.clone(),
        };

        debug!(
            method = %request.method,
            path = %request.path,
            retried = request.retried,
            authenticated = token.is_some(),
            "Dispatching request"
        );

        let response = self
            .transport
            .execute(http_request)
            .await
            .map_err(GatewayError::Network)?;
        Ok((token, response))
    }

    // ===== Renewal =====

    async fn renew_after_unauthorized(&self, sent_with: Option<&str>) -> Result<(), GatewayError> {
        if !self.coalesce_renewals {
            return self.renew().await;
        }

        let _guard = self.renewal.lock().await;
        // Another request may have renewed while we waited for the lock
        let current = self.vault.access_token()?;
        if current.is_some() && current.as_deref() != sent_with {
            debug!("Access token already renewed by a concurrent request");
            return Ok(());
        }
        self.renew().await
    }

    /// Trade the stored refresh token for a new access token.
    ///
    /// The outcome is only applied to the session the exchange started
    /// from. If a logout or a new login replaced it meanwhile, a renewed
    /// token is dropped and a failed renewal leaves the new session alone.
    async fn renew(&self) -> Result<(), GatewayError> {
        let Some(refresh_token) = self.vault.refresh_token()? else {
            warn!("No refresh token available, session expired");
            self.expire_session(Expiry::Refresh(None));
            return Err(GatewayError::SessionExpired);
        };

        match self.exchange_refresh_token(&refresh_token).await {
            Ok(renewed) => {
                let committed = self.vault.commit_renewal(
                    &refresh_token,
                    &renewed.access,
                    renewed.refresh.as_deref(),
                )?;
                if committed {
                    info!("Access token renewed");
                    return Ok(());
                }
                // Retry with whatever session is stored now, if any
                debug!("Session changed during renewal, discarding renewed token");
                if self.vault.access_token()?.is_none() {
                    return Err(GatewayError::SessionExpired);
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token renewal failed, session expired");
                self.expire_session(Expiry::Refresh(Some(&refresh_token)));
                Err(GatewayError::SessionExpired)
            }
        }
    }

    /// Token-less call trading the refresh token for a new access token.
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshResponse, RenewalError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh: refresh_token,
        })
        .map_err(|e| RenewalError::Malformed(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let request = HttpRequest {
            method: Method::POST,
            url: self.url_for(REFRESH_PATH),
            query: Vec::new(),
            headers,
            body: Some(body),
        };

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(RenewalError::Network)?;
        if !response.status.is_success() {
            return Err(RenewalError::Rejected(response.status));
        }

        let renewed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|e| RenewalError::Malformed(e.to_string()))?;
        if renewed.access.is_empty() {
            return Err(RenewalError::Malformed("empty access token".to_string()));
        }
        Ok(renewed)
    }

    /// Clear the session, unless it has been replaced since it failed.
    fn expire_session(&self, expiry: Expiry<'_>) {
        let cleared = match expiry {
            Expiry::Access(token) => self.vault.clear_if_access_token(token),
            Expiry::Refresh(token) => self.vault.clear_if_refresh_token(token),
        };
        match cleared {
            Ok(true) => {}
            Ok(false) => debug!("Session replaced before it expired, keeping it"),
            Err(e) => warn!(error = %e, "Failed to clear expired session"),
        }
    }
}

/// The token that identifies the session being expired.
#[derive(Debug, Clone, Copy)]
enum Expiry<'a> {
    Access(Option<&'a str>),
    Refresh(Option<&'a str>),
}

fn bearer(token: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| GatewayError::Storage(anyhow!("Stored access token is not a valid header value")))
}
