//! Playlists, tracks and AI-generated playlist metadata.

use serde::{Deserialize, Serialize};

use super::{null_as_default, ExternalUrls, Image, Paging};

/// Owner of a playlist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
    pub id: String,
}

/// Number of tracks in a playlist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackCount {
    pub total: u32,
}

/// Playlist as returned by `GET /playlists` and `GET /playlist/{id}/details`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
    #[serde(default)]
    pub tracks: TrackCount,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl SimplifiedPlaylist {
    /// URL of the largest cover image, if any.
    #[must_use]
    pub fn cover_url(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }
}

/// Artist as embedded in a track.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Album as embedded in a track.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
}

/// A track. Fields missing from field-masked responses default to empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<ArtistRef>,
}

impl Track {
    /// Artist names joined for display.
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether the track has everything needed to be listed. Deleted or
    /// local tracks come back with empty names or without album/artists.
    #[must_use]
    pub fn is_listable(&self) -> bool {
        !self.name.is_empty() && self.album.is_some() && !self.artists.is_empty()
    }
}

/// Entry of a playlist's track list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// `null` for tracks that were removed from the catalogue.
    #[serde(default)]
    pub track: Option<Track>,
}

/// Answer to `GET /playlist/{id}/tracks`.
pub type PlaylistTracks = Paging<PlaylistItem>;

impl PlaylistTracks {
    /// Drops entries that cannot be listed.
    #[must_use]
    pub fn into_listable(self) -> Vec<Track> {
        self.items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(Track::is_listable)
            .collect()
    }
}

/// Answer to `POST /playlist/{id}/ai-description`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AiDescription {
    pub description: String,
}

/// Answer to `POST /playlist/{id}/ai-cover`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AiCover {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

/// Answer to `POST /features/forgotten-gems`.
///
/// When no forgotten gems are found the backend answers with a placeholder
/// name and an empty link.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl NewPlaylist {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.external_urls.spotify.is_empty()
    }
}
