//! Now-playing snapshots.

use serde::{Deserialize, Serialize};

use super::playlist::Track;

/// Answer to `GET /currently-playing`.
///
/// When nothing is playing the backend answers `{"is_playing": false}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NowPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
}

impl NowPlaying {
    /// The track being played, if playback is active.
    #[must_use]
    pub fn track(&self) -> Option<&Track> {
        self.item.as_ref().filter(|_| self.is_playing)
    }
}
