//! Listening statistics: top tracks/artists and the AI analysis.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{playlist::Track, Image};
use crate::error::{Error, Result};

/// Period over which top items are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last four weeks.
    ShortTerm,
    /// Roughly the last six months.
    #[default]
    MediumTerm,
    /// Several years of data.
    LongTerm,
}

impl TimeRange {
    pub const ALL: [Self; 3] = [Self::ShortTerm, Self::MediumTerm, Self::LongTerm];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "invalid time range {s:?}: expected short_term, medium_term or long_term"
                ))
            })
    }
}

/// Artist as returned by `GET /me/top/artists`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Ranked items, best first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopItems<T> {
    pub items: Vec<T>,
}

pub type TopTracks = TopItems<Track>;
pub type TopArtists = TopItems<Artist>;

/// Answer to `GET /me/ai-analysis`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AiAnalysis {
    #[serde(alias = "ai_analysis")]
    pub analysis: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::json;

    #[test]
    fn time_range_parses() {
        assert_eq!("short_term".parse::<TimeRange>().unwrap(), TimeRange::ShortTerm);
        assert_eq!(TimeRange::default().to_string(), "medium_term");
        assert!("forever".parse::<TimeRange>().is_err());
    }

    #[test]
    fn top_artists() {
        let top: TopArtists = json(
            r#"{"items": [{"id": "a1", "name": "Björk", "genres": ["art pop"], "images": []}]}"#,
            "top artists",
        )
        .unwrap();
        assert_eq!(top.items[0].genres, vec!["art pop"]);
    }

    #[test]
    fn ai_analysis_accepts_both_keys() {
        let a: AiAnalysis = json(r#"{"analysis": "You like jazz."}"#, "ai").unwrap();
        let b: AiAnalysis = json(r#"{"ai_analysis": "You like jazz."}"#, "ai").unwrap();
        assert_eq!(a, b);
    }
}
