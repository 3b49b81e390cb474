use std::path::PathBuf;

use serde::Deserialize;

/// Client configuration loaded from `MUSICRECO_*` environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Recommendation / auth / playlist backend base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL serving `top_tags.csv`, `top_songs.csv` and `genre_map.json`.
    /// Falls back to `api_url` when unset.
    #[serde(default)]
    pub assets_url: Option<String>,

    /// File backing the persisted local storage (token, favorites)
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Target size of a generated playlist
    #[serde(default = "default_playlist_size")]
    pub playlist_size: usize,

    /// Similar songs fetched per favorite
    #[serde(default = "default_per_song_recommendations")]
    pub per_song_recommendations: usize,

    /// Size of the "for you" list
    #[serde(default = "default_personalized_recommendations")]
    pub personalized_recommendations: usize,

    /// Favorites needed before the "for you" list is computed
    #[serde(default = "default_personalized_threshold")]
    pub personalized_threshold: usize,

    /// Rows kept from each static CSV asset
    #[serde(default = "default_asset_row_cap")]
    pub asset_row_cap: usize,
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("musicreco")
        .join("storage.json")
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_playlist_size() -> usize {
    20
}

fn default_per_song_recommendations() -> usize {
    5
}

fn default_personalized_recommendations() -> usize {
    20
}

fn default_personalized_threshold() -> usize {
    5
}

fn default_asset_row_cap() -> usize {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            assets_url: None,
            storage_path: default_storage_path(),
            request_timeout_secs: default_request_timeout_secs(),
            playlist_size: default_playlist_size(),
            per_song_recommendations: default_per_song_recommendations(),
            personalized_recommendations: default_personalized_recommendations(),
            personalized_threshold: default_personalized_threshold(),
            asset_row_cap: default_asset_row_cap(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed("MUSICRECO_")
            .from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Base URL for static assets
    pub fn assets_base(&self) -> &str {
        self.assets_url.as_deref().unwrap_or(&self.api_url)
    }
}
