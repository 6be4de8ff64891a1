//! Login exchange, profile and logout.
//!
//! # Example Response
//!
//! `POST /auth/profile` answers a valid one-time code with:
//!
//! ```json
//! {
//!     "profile": {
//!         "display_name": "Ada",
//!         "email": "ada@example.com",
//!         "id": "ada123"
//!     },
//!     "token": "secret_token"
//! }
//! ```

use serde::{Deserialize, Serialize};
use veil::Redact;

use super::null_as_default;
use crate::token::SessionToken;

/// The signed-in user as returned by `GET /me`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserProfile {
    /// Empty when the account has none; the backend then sends `null`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    pub id: String,
}

impl UserProfile {
    /// Display name, or the user id for accounts without one.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

/// Body of `POST /auth/profile`.
#[derive(Serialize, Redact)]
pub struct ExchangeRequest<'a> {
    #[redact]
    pub code: &'a str,
}

/// Answer to a successful code exchange.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub profile: UserProfile,

    /// Bearer token for all further requests. Redacted by its own type.
    pub token: SessionToken,
}

/// Answer to `POST /auth/logout`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LogoutResponse {
    #[serde(default)]
    pub status: String,
}
