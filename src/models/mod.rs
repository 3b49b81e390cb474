use serde::{Deserialize, Serialize};

pub mod playlist;
pub mod song;
pub mod user;

pub use playlist::{
    GeneratedPlaylist, NewPlaylist, NewPlaylistItem, PlaylistId, PlaylistSummary, RenamePlaylist,
    SavedPlaylist, SavedPlaylistItem,
};
pub use song::{HasSongId, Song};
pub use user::{AuthToken, LoginRequest, SignupRequest, TokenResponse, UserInfo};

/// Server-assigned song identifier
pub type SongId = i64;

/// Candidate returned by every recommend endpoint, already ranked by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationItem {
    pub id: SongId,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    /// Raw genre codes
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub score: f64,
}

impl HasSongId for RecommendationItem {
    fn song_id(&self) -> SongId {
        self.id
    }
}

/// Song record from the search and sample endpoints
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawSong {
    pub id: SongId,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    /// Either a code list or a delimited string, depending on the endpoint
    #[serde(default)]
    pub genres: Option<serde_json::Value>,
    #[serde(default)]
    pub genre: Option<serde_json::Value>,
}

// ============================================================================
// Recommendation API Types
// ============================================================================

/// Body of `POST /recommend/by-tags`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagRecommendRequest {
    pub tags: Vec<String>,
    pub k: usize,
    pub exclude: Vec<SongId>,
}

/// Body of `POST /recommend/by-dae` and `POST /recommend/by-songs`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedRecommendRequest {
    pub seed_song_ids: Vec<SongId>,
    pub k: usize,
    pub exclude: Vec<SongId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecommendResponse {
    #[serde(default)]
    pub items: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SongsResponse {
    #[serde(default)]
    pub songs: Vec<RawSong>,
}

/// Response of the video lookup proxy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VideoLookupResponse {
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
}
