//! Typed calls to the backend API.
//!
//! [`Backend`] turns each endpoint into a method returning the parsed
//! [`protocol`] type. Authorization is whatever the underlying
//! [`http::Client`](crate::http::Client) carries at the time the request is
//! built; only the [`Session`](crate::session::Session) changes it.

use url::Url;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    http::Client as HttpClient,
    protocol::{
        auth::{AuthResponse, ExchangeRequest, LogoutResponse, UserProfile},
        player::NowPlaying,
        playlist::{
            AiCover, AiDescription, NewPlaylist, PlaylistTracks, SimplifiedPlaylist, Track,
        },
        stats::{AiAnalysis, TimeRange, TopArtists, TopTracks},
        Paging,
    },
    token::AuthExchangeCode,
};

/// Typed calls to the backend endpoints.
pub struct Backend {
    http_client: HttpClient,
}

impl Backend {
    /// Browser login page. The backend redirects back to the app when done.
    const LOGIN_PATH: &'static str = "/login";

    const PROFILE_PATH: &'static str = "/me";

    const EXCHANGE_PATH: &'static str = "/auth/profile";

    const LOGOUT_PATH: &'static str = "/auth/logout";

    /// Creates a backend for the base URL in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
        })
    }

    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// URL to open in a browser to start logging in.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL cannot be joined with the login path.
    pub fn login_url(&self) -> Result<Url> {
        self.http_client.url(Self::LOGIN_PATH)
    }

    /// Fetches the profile of the signed-in user. This doubles as token
    /// validation: an invalid token fails with
    /// [`Unauthorized`](ErrorKind::Unauthorized).
    pub async fn me(&self) -> Result<UserProfile> {
        let request = self.http_client.get(Self::PROFILE_PATH)?;
        self.http_client.json(request).await
    }

    /// Swaps a one-time code for the user's profile and a session token.
    ///
    /// # Errors
    ///
    /// * [`ExchangeFailed`](ErrorKind::ExchangeFailed) if the backend
    ///   rejects the code; the backend message is kept
    /// * [`NetworkFault`](ErrorKind::NetworkFault) if the backend could
    ///   not be reached
    pub async fn exchange_code(&self, code: AuthExchangeCode) -> Result<AuthResponse> {
        let request = self
            .http_client
            .post_json(Self::EXCHANGE_PATH, &ExchangeRequest { code: &code })?;

        // The code is single use: it is dropped here whatever the outcome.
        drop(code);

        self.http_client
            .json(request)
            .await
            .map_err(|e| match e.kind {
                ErrorKind::Api | ErrorKind::Unauthorized | ErrorKind::InvalidArgument => {
                    e.with_kind(ErrorKind::ExchangeFailed)
                }
                _ => e,
            })
    }

    /// Asks the backend to invalidate the current session token.
    pub async fn logout(&self) -> Result<()> {
        let request = self.http_client.post(Self::LOGOUT_PATH)?;
        let response: LogoutResponse = self.http_client.json(request).await?;
        debug!("backend logout: {}", response.status);
        Ok(())
    }

    pub async fn playlists(&self) -> Result<Paging<SimplifiedPlaylist>> {
        let request = self.http_client.get("/playlists")?;
        self.http_client.json(request).await
    }

    pub async fn playlist_details(&self, playlist_id: &str) -> Result<SimplifiedPlaylist> {
        let request = self
            .http_client
            .get(&Self::playlist_path(playlist_id, "details")?)?;
        self.http_client.json(request).await
    }

    /// Tracks of a playlist, without removed or incomplete entries.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let request = self
            .http_client
            .get(&Self::playlist_path(playlist_id, "tracks")?)?;
        let tracks: PlaylistTracks = self.http_client.json(request).await?;
        Ok(tracks.into_listable())
    }

    /// Generates a description for a playlist and saves it on the
    /// streaming service. Returns the new description.
    pub async fn ai_description(&self, playlist_id: &str) -> Result<String> {
        let request = self
            .http_client
            .post(&Self::playlist_path(playlist_id, "ai-description")?)?;
        let response: AiDescription = self.http_client.json(request).await?;
        Ok(response.description)
    }

    /// Generates a cover image for a playlist and uploads it. Returns the
    /// URL of the new image.
    pub async fn ai_cover(&self, playlist_id: &str) -> Result<String> {
        let request = self
            .http_client
            .post(&Self::playlist_path(playlist_id, "ai-cover")?)?;
        let response: AiCover = self.http_client.json(request).await?;
        Ok(response.image_url)
    }

    pub async fn top_tracks(&self, time_range: TimeRange) -> Result<TopTracks> {
        let request = self
            .http_client
            .get(&format!("/me/top/tracks?time_range={time_range}"))?;
        self.http_client.json(request).await
    }

    pub async fn top_artists(&self, time_range: TimeRange) -> Result<TopArtists> {
        let request = self
            .http_client
            .get(&format!("/me/top/artists?time_range={time_range}"))?;
        self.http_client.json(request).await
    }

    pub async fn currently_playing(&self) -> Result<NowPlaying> {
        let request = self.http_client.get("/currently-playing")?;
        self.http_client.json(request).await
    }

    /// Creates a playlist of past favourites not listened to lately.
    pub async fn forgotten_gems(&self) -> Result<NewPlaylist> {
        let request = self.http_client.post("/features/forgotten-gems")?;
        self.http_client.json(request).await
    }

    /// Generated text about the user's listening habits.
    pub async fn ai_analysis(&self) -> Result<String> {
        let request = self.http_client.get("/me/ai-analysis")?;
        let response: AiAnalysis = self.http_client.json(request).await?;
        Ok(response.analysis)
    }

    /// Builds `/playlist/{id}/{action}`, rejecting ids that would escape
    /// their path segment.
    fn playlist_path(playlist_id: &str, action: &str) -> Result<String> {
        if playlist_id.is_empty() || !playlist_id.chars().all(|chr| chr.is_ascii_alphanumeric()) {
            return Err(Error::invalid_argument(format!(
                "invalid playlist id {playlist_id:?}"
            )));
        }

        Ok(format!("/playlist/{playlist_id}/{action}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_path() {
        assert_eq!(
            Backend::playlist_path("37i9dQZF1DXcBWIGoYBM5M", "tracks").unwrap(),
            "/playlist/37i9dQZF1DXcBWIGoYBM5M/tracks"
        );
        for id in ["", "../me", "a/b", "a?b"] {
            let err = Backend::playlist_path(id, "tracks").unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn login_url() {
        let config = Config::with_base_url("https://example.com".parse().unwrap());
        let backend = Backend::new(&config).unwrap();
        assert_eq!(backend.login_url().unwrap().as_str(), "https://example.com/login");
    }
}
