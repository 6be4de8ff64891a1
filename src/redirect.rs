//! Login redirect handling.
//!
//! After the user signs in through the browser, the backend redirects to a
//! custom URL scheme carrying a one-time exchange code:
//!
//! ```text
//! myapp://auth/success?code=XYZ
//! ```
//!
//! [`RedirectPattern::extract_code`] decides whether a URL is such a
//! redirect and pulls the code out of it.

use serde::Deserialize;
use url::Url;

use crate::{
    error::{Error, Result},
    token::AuthExchangeCode,
};

/// Scheme, host and path a login redirect must have.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedirectPattern {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Default for RedirectPattern {
    fn default() -> Self {
        Self {
            scheme: "myapp".to_owned(),
            host: "auth".to_owned(),
            path: "/success".to_owned(),
        }
    }
}

impl RedirectPattern {
    /// Name of the query parameter holding the exchange code.
    const CODE_PARAM: &'static str = "code";

    /// Name of the query parameter an authorization server uses to report
    /// a failed login.
    const ERROR_PARAM: &'static str = "error";

    /// Whether `url` has the scheme, host and path of a login redirect.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        url.scheme().eq_ignore_ascii_case(&self.scheme)
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
            && url.path().trim_end_matches('/') == self.path.trim_end_matches('/')
    }

    /// Extracts the exchange code from a login redirect.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - `url` is not a login redirect and should be ignored
    /// * `Ok(Some(code))` - the one-time code to exchange
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRedirect`](crate::error::ErrorKind::MalformedRedirect)
    /// if `url` is a login redirect without a non-empty `code`.
    pub fn extract_code(&self, url: &str) -> Result<Option<AuthExchangeCode>> {
        let Ok(url) = Url::parse(url.trim()) else {
            trace!("ignoring unparsable url");
            return Ok(None);
        };

        if !self.matches(&url) {
            trace!("ignoring url {}://{}", url.scheme(), url.host_str().unwrap_or_default());
            return Ok(None);
        }

        let mut code = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                Self::CODE_PARAM if code.is_none() => code = Some(value.into_owned()),
                Self::ERROR_PARAM => error = Some(value.into_owned()),
                _ => {}
            }
        }

        match code.filter(|code| !code.trim().is_empty()) {
            Some(code) => AuthExchangeCode::new(code).map(Some),
            None => Err(Error::malformed_redirect(match error {
                Some(error) => format!("no code found in redirect url: {error}"),
                None => "no code found in redirect url".to_owned(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn extracts_code() {
        let pattern = RedirectPattern::default();
        let code = pattern
            .extract_code("myapp://auth/success?code=XYZ")
            .unwrap()
            .unwrap();
        assert_eq!(&*code, "XYZ");

        let code = pattern
            .extract_code("myapp://auth/success/?state=1&code=a%2Bb")
            .unwrap()
            .unwrap();
        assert_eq!(&*code, "a+b");
    }

    #[test]
    fn ignores_other_urls() {
        let pattern = RedirectPattern::default();
        for url in [
            "https://example.com/?code=XYZ",
            "myapp://settings?code=XYZ",
            "myapp://auth/failure?code=XYZ",
            "not a url",
            "",
        ] {
            assert!(pattern.extract_code(url).unwrap().is_none(), "{url}");
        }
    }

    #[test]
    fn missing_code_is_malformed() {
        let pattern = RedirectPattern::default();
        for url in [
            "myapp://auth/success",
            "myapp://auth/success?code=",
            "myapp://auth/success?error=access_denied",
        ] {
            let err = pattern.extract_code(url).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedRedirect, "{url}");
        }
    }

    #[test]
    fn custom_pattern() {
        let pattern = RedirectPattern {
            scheme: "groovify".to_owned(),
            host: "login".to_owned(),
            path: "/done".to_owned(),
        };
        assert!(pattern.extract_code("groovify://login/done?code=1").unwrap().is_some());
        assert!(pattern.extract_code("myapp://auth/success?code=1").unwrap().is_none());
    }
}
