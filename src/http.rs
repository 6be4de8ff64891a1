//! HTTP client with a switchable bearer token for the backend API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * A fixed base URL that endpoint paths are resolved against
//! * An `Authorization: Bearer` header that can be attached and removed
//! * Consistent timeouts and headers
//! * Mapping of non-success responses to typed errors
//!
//! # Authorization
//!
//! The header is copied into each request when the request is built. After
//! [`Client::set_auth_token`] returns, every request built from then on
//! carries the new state; requests built earlier keep what they had.
//!
//! # Example
//!
//! ```rust
//! use groovify::http::Client;
//!
//! let client = Client::new(&config)?;
//! client.set_auth_token(Some(&token));
//!
//! let request = client.get("/me")?;
//! let response = client.execute(request).await?;
//! ```

use std::sync::{PoisonError, RwLock};

use http::StatusCode;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Url,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{BackendDetail, Error, ErrorKind, Result},
    protocol,
    token::SessionToken,
};

/// HTTP client bound to one backend.
pub struct Client {
    /// Underlying connection pool.
    inner: reqwest::Client,

    /// Address all endpoint paths are relative to. Always ends in `/`.
    base_url: Url,

    /// Value of the `Authorization` header, if a session is attached.
    authorization: RwLock<Option<HeaderValue>>,
}

impl Client {
    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

    /// Duration to wait for a connection to be established.
    const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    /// `Accept` header value for all requests.
    const JSON_CONTENT: HeaderValue = HeaderValue::from_static("application/json");

    /// Creates a new client for the backend in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, Self::JSON_CONTENT);

        let inner = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()?;

        // `Url::join` replaces the last path segment unless the base ends
        // with a slash.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        debug!("backend: {base_url}");

        Ok(Self {
            inner,
            base_url,
            authorization: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path such as `/me/top/tracks` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not form a valid URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(Into::into)
    }

    /// Attaches `token` to all subsequent requests, or removes the
    /// `Authorization` header entirely when `token` is `None`.
    pub fn set_auth_token(&self, token: Option<&SessionToken>) {
        let value = token.and_then(|token| {
            match HeaderValue::from_str(&format!("Bearer {}", token.as_str())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    Some(value)
                }
                Err(e) => {
                    // `SessionToken` only admits visible ASCII.
                    error!("session token cannot be sent as header: {e}");
                    None
                }
            }
        });

        if value.is_some() {
            debug!("authorization header set");
        } else {
            debug!("authorization header removed");
        }

        *self
            .authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// The `Authorization` header value that new requests will carry.
    #[must_use]
    pub fn authorization(&self) -> Option<HeaderValue> {
        self.authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Builds a request with specified method and endpoint path.
    ///
    /// The current `Authorization` header, if any, is copied in.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not form a valid URL.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::Request> {
        let mut request = reqwest::Request::new(method, self.url(path)?);
        if let Some(value) = self.authorization() {
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }

    /// Builds a GET request.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not form a valid URL.
    pub fn get(&self, path: &str) -> Result<reqwest::Request> {
        self.request(Method::GET, path)
    }

    /// Builds a POST request without a body.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not form a valid URL.
    pub fn post(&self, path: &str) -> Result<reqwest::Request> {
        self.request(Method::POST, path)
    }

    /// Builds a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not form a valid URL or the body
    /// cannot be serialized.
    pub fn post_json<B>(&self, path: &str, body: &B) -> Result<reqwest::Request>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.post(path)?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, Self::JSON_CONTENT);
        *request.body_mut() = Some(serde_json::to_vec(body)?.into());

        Ok(request)
    }

    /// Executes a request.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * the request could not complete ([`NetworkFault`](crate::error::ErrorKind::NetworkFault))
    /// * the backend answered 401 ([`Unauthorized`](crate::error::ErrorKind::Unauthorized))
    /// * the backend answered any other non-success status ([`Api`](crate::error::ErrorKind::Api))
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let method = request.method().clone();
        let path = request.url().path().to_owned();

        let response = self.inner.execute(request).await?;
        let status = response.status();
        trace!("{method} {path}: {status}");

        if status.is_success() {
            return Ok(response);
        }

        // The body is only used to explain the failure.
        let body = response.text().await.unwrap_or_default();
        Err(Self::status_error(status, &body, &format!("{method} {path}")))
    }

    /// Executes a request and parses the JSON response as `T`.
    ///
    /// # Errors
    ///
    /// Returns error if execution fails or the response does not match `T`.
    pub async fn json<T>(&self, request: reqwest::Request) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + std::fmt::Debug,
    {
        let origin = format!("{} {}", request.method(), request.url().path());
        let response = self.execute(request).await?;
        let body = response.text().await?;
        protocol::json(&body, &origin)
    }

    /// Maps a non-success response to an error.
    fn status_error(status: StatusCode, body: &str, origin: &str) -> Error {
        let error = match protocol::detail_message(body) {
            Some(message) => Error::api(BackendDetail { status, message }),
            None => Error::api(format!("{origin} failed with HTTP {status}")),
        };

        if status == StatusCode::UNAUTHORIZED {
            error.with_kind(ErrorKind::Unauthorized)
        } else {
            error
        }
    }
}
