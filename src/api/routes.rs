//! Backend endpoint paths

use crate::models::PlaylistId;

// Recommendation
pub const RECOMMEND_BY_TAGS: &str = "/recommend/by-tags";
pub const RECOMMEND_BY_DAE: &str = "/recommend/by-dae";
pub const RECOMMEND_BY_SONGS: &str = "/recommend/by-songs";
pub const SONG_SEARCH: &str = "/songs/search";

// Auth
pub const SIGNUP: &str = "/auth/signup";
pub const LOGIN: &str = "/auth/login";
pub const ME: &str = "/auth/me";

// Playlists (bearer token required)
pub const PLAYLISTS: &str = "/playlists";

pub fn playlist(id: PlaylistId) -> String {
    format!("{}/{}", PLAYLISTS, id)
}

pub fn playlist_title(id: PlaylistId) -> String {
    format!("{}/{}/title", PLAYLISTS, id)
}

// Video lookup proxy
pub const VIDEO_SEARCH: &str = "/yt/search";

// Static assets, relative to the assets base URL
pub const TOP_TAGS_CSV: &str = "/top_tags.csv";
pub const TOP_SONGS_CSV: &str = "/top_songs.csv";
pub const GENRE_MAP_JSON: &str = "/genre_map.json";

/// Joins a base URL and a path without doubling the slash
pub fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
