//! Session credentials.
//!
//! * [`SessionToken`] - opaque bearer token issued by the backend after login
//! * [`AuthExchangeCode`] - one-time code carried by the login redirect
//!
//! Both are redacted in `Debug` output so they never end up in logs.

use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use veil::Redact;

use crate::error::{Error, Result};

/// Opaque bearer token representing an authenticated session.
///
/// The client never inspects its structure. The only requirements are that
/// it is non-empty and can be sent in an `Authorization` header.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Redact)]
#[serde(try_from = "String", into = "String")]
#[redact(all)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        if token.is_empty() {
            return Err(Error::invalid_argument("session token is empty"));
        }

        // Header values only allow visible ASCII.
        if let Some(chr) = token.chars().find(|chr| !chr.is_ascii_graphic()) {
            return Err(Error::invalid_argument(format!(
                "session token contains invalid character {:?}",
                chr.escape_default().to_string()
            )));
        }

        Ok(Self(token.to_owned()))
    }
}

impl TryFrom<String> for SessionToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

/// One-time code extracted from a login redirect.
///
/// Deliberately not `Clone`: a code is moved into the single exchange call
/// that consumes it.
#[derive(PartialEq, Eq, Redact)]
#[redact(all)]
pub struct AuthExchangeCode(String);

impl AuthExchangeCode {
    /// Wraps a code, rejecting empty values.
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(Error::malformed_redirect("exchange code is empty"));
        }

        Ok(Self(code))
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for AuthExchangeCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
