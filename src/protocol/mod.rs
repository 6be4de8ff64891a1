//! Wire types for the backend API.
//!
//! # Submodules
//!
//! * [`auth`] - login exchange, profile and logout
//! * [`playlist`] - playlists, tracks and AI-generated playlist metadata
//! * [`stats`] - top tracks/artists and the AI listening analysis
//! * [`player`] - now-playing snapshots
//!
//! # Shared Functionality
//!
//! * [`json`] parses and logs response bodies
//! * [`detail_message`] extracts the explanation from error bodies

pub mod auth;
pub mod player;
pub mod playlist;
pub mod stats;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parses and logs JSON responses from the backend.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of API endpoint for logging
///
/// # Errors
///
/// Returns error if the body is not valid JSON or does not match `T`.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Extracts the human-readable message from an error response body.
///
/// The backend reports errors as `{"detail": ...}` where `detail` is either
/// a string or an upstream error object such as
/// `{"error": {"status": 404, "message": "Not found."}}`.
#[must_use]
pub fn detail_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let detail = value.get("detail")?;

    let message = match detail {
        serde_json::Value::String(message) => Some(message.as_str()),
        serde_json::Value::Object(_) => detail
            .pointer("/error/message")
            .or_else(|| detail.get("message"))
            .and_then(serde_json::Value::as_str),
        _ => None,
    }?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_owned())
}

/// Image attached to a playlist, album or artist.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Links to the streaming service's own pages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

/// Paging envelope used by list endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
