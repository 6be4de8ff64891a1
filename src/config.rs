//! Runtime configuration.
//!
//! [`Config::default`] points at the production backend. Any field can be
//! overridden from a TOML file with [`Config::from_file`]:
//!
//! ```toml
//! base_url = "https://groovifyspotifyapiproject.vercel.app"
//! token_file = "session.toml"
//! poll_interval = 10
//! timeout = 60
//!
//! [redirect]
//! scheme = "myapp"
//! host = "auth"
//! path = "/success"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use url::Url;

use crate::{
    error::{Error, Result},
    redirect::RedirectPattern,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub user_agent: String,

    /// Address of the backend proxy. All endpoint paths are relative to it.
    pub base_url: Url,

    /// Where the session token is persisted.
    pub token_file: PathBuf,

    /// Shape of the login redirect URL.
    pub redirect: RedirectPattern,

    /// How often now-playing is polled.
    pub poll_interval: Duration,

    /// Overall timeout of a single request. AI endpoints can take a while.
    pub timeout: Duration,
}

/// Optional overrides as read from a configuration file.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overrides {
    base_url: Option<Url>,
    token_file: Option<PathBuf>,
    redirect: Option<RedirectPattern>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    poll_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    timeout: Option<Duration>,
}

impl Config {
    /// Production backend.
    pub const DEFAULT_BASE_URL: &'static str = "https://groovifyspotifyapiproject.vercel.app";

    pub const DEFAULT_TOKEN_FILE: &'static str = "session.toml";

    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Largest configuration file that will be read.
    const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Creates a configuration for the backend at `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: Url) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        // `User-Agent` product tokens cannot contain these.
        let sanitize = |s: &str| s.replace(['/', ';', '(', ')'], "_");

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        let user_agent = format!(
            "{app_name}/{app_version} (Rust; {}/{}; CLI)",
            sanitize(os_name),
            sanitize(&os_version)
        );
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            user_agent,
            base_url,
            token_file: PathBuf::from(Self::DEFAULT_TOKEN_FILE),
            redirect: RedirectPattern::default(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Loads the defaults and applies the overrides in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is too large, or is not
    /// a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: configuration should be small.
        let file_size = std::fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::default().merge(&contents).map_err(|e| {
            Error::invalid_argument(format!("{} format is invalid: {e}", path.display()))
        })
    }

    /// Applies TOML overrides on top of `self`.
    fn merge(mut self, contents: &str) -> Result<Self> {
        let overrides: Overrides = toml::from_str(contents)?;

        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(token_file) = overrides.token_file {
            self.token_file = token_file;
        }
        if let Some(redirect) = overrides.redirect {
            self.redirect = redirect;
        }
        if let Some(poll_interval) = overrides.poll_interval {
            if poll_interval.is_zero() {
                return Err(Error::invalid_argument("poll interval must not be zero"));
            }
            self.poll_interval = poll_interval;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }

        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        // A compile-time constant that is known to parse.
        let base_url = Url::parse(Self::DEFAULT_BASE_URL)
            .unwrap_or_else(|e| unreachable!("invalid default base url: {e}"));
        Self::with_base_url(base_url)
    }
}
