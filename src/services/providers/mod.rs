//! Backend collaborator abstraction
//!
//! The recommendation, auth/playlist, video lookup and static asset services
//! are separate seams so each can be mocked or replaced on its own. The HTTP
//! client in `crate::api` implements all of them against one backend.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        AuthToken, LoginRequest, NewPlaylist, PlaylistId, RawSong, RecommendationItem,
        SavedPlaylist, SignupRequest, SongId, UserInfo,
    },
};

/// Trait for the remote ranking services
///
/// Every recommend call takes an exclusion list and a result cap and returns
/// candidates already ordered by the server.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationProvider: Send + Sync {
    /// Tag-based recommendation
    async fn recommend_by_tags(
        &self,
        tags: &[String],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>>;

    /// Behavior (DAE) based recommendation seeded with a set of songs
    async fn recommend_by_dae(
        &self,
        seed_song_ids: &[SongId],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>>;

    /// Per-song similarity recommendation
    async fn recommend_by_songs(
        &self,
        seed_song_ids: &[SongId],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>>;

    /// Free-text song search over titles and artists
    async fn search_songs(&self, query: &str, limit: usize) -> AppResult<Vec<RawSong>>;
}

/// Trait for the auth and playlist endpoints
///
/// The credential is always passed in explicitly; implementations keep no
/// session state of their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountProvider: Send + Sync {
    async fn signup(&self, request: &SignupRequest) -> AppResult<AuthToken>;

    async fn login(&self, request: &LoginRequest) -> AppResult<AuthToken>;

    /// Identity behind a token
    async fn me(&self, token: &AuthToken) -> AppResult<UserInfo>;

    async fn create_playlist(
        &self,
        token: &AuthToken,
        playlist: &NewPlaylist,
    ) -> AppResult<SavedPlaylist>;

    /// Playlists of the token's owner, newest first
    async fn list_playlists(&self, token: &AuthToken) -> AppResult<Vec<SavedPlaylist>>;

    async fn get_playlist(&self, token: &AuthToken, id: PlaylistId) -> AppResult<SavedPlaylist>;

    async fn rename_playlist(
        &self,
        token: &AuthToken,
        id: PlaylistId,
        title: &str,
    ) -> AppResult<SavedPlaylist>;

    async fn delete_playlist(&self, token: &AuthToken, id: PlaylistId) -> AppResult<()>;
}

/// Trait for the video lookup collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VideoProvider: Send + Sync {
    /// Resolves a free-text query to one embeddable video id, `None` if nothing matched
    async fn find_video(&self, query: &str) -> AppResult<Option<String>>;
}

/// Trait for the static asset collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AssetProvider: Send + Sync {
    /// Fetches a plain-text asset by path, e.g. `/top_tags.csv`
    async fn fetch_text(&self, path: &str) -> AppResult<String>;

    /// Fetches the genre code to label table
    async fn fetch_genre_map(&self) -> AppResult<HashMap<String, String>>;
}

/// All backend collaborators a session talks to
#[derive(Clone)]
pub struct Backend {
    pub recommender: Arc<dyn RecommendationProvider>,
    pub accounts: Arc<dyn AccountProvider>,
    pub videos: Arc<dyn VideoProvider>,
    pub assets: Arc<dyn AssetProvider>,
}

impl Backend {
    /// Uses one implementation for every collaborator
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: RecommendationProvider + AccountProvider + VideoProvider + AssetProvider + 'static,
    {
        Self {
            recommender: client.clone(),
            accounts: client.clone(),
            videos: client.clone(),
            assets: client,
        }
    }
}
