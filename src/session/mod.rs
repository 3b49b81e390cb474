//! Session controller
//!
//! A [`Session`] is created once with [`Session::init`] and owns every piece
//! of client state: the credential, dashboard selections, the open playlist,
//! playback position and the favorites with their derived recommendations.
//! Failed user actions return the error and also leave a notice for the
//! front end to show.

pub mod state;

use std::sync::Arc;

pub use state::{Screen, SessionState, SessionStateInner};

use crate::{
    config::Config,
    db::{Storage, StorageExt, StorageKey},
    error::{AppError, AppResult},
    models::{
        AuthToken, GeneratedPlaylist, LoginRequest, NewPlaylist, PlaylistId, PlaylistSummary,
        SignupRequest, Song, SongId, UserInfo,
    },
    services::{
        assets::{self, TopSong},
        AggregatorHandle, AggregatorLimits, Backend, FavoritesCache, GenreDecoder,
        PlaylistGenerator, RecommendationAggregator, Toggled,
    },
};

const TAG_POOL_SIZE: usize = 30;
const SONG_POOL_SIZE: usize = 20;
const TAG_SUGGESTION_LIMIT: usize = 20;
const SEARCH_LIMIT: usize = 20;

const LOGIN_REQUIRED: &str = "Please log in first: this action needs an account.";

pub struct Session {
    config: Config,
    backend: Backend,
    storage: Arc<dyn Storage>,
    decoder: Arc<GenreDecoder>,
    favorites: Arc<FavoritesCache>,
    aggregator: Arc<RecommendationAggregator>,
    generator: PlaylistGenerator,
    listener: Option<AggregatorHandle>,
    state: SessionState,
}

impl Session {
    /// Builds the session and restores the stored credential
    ///
    /// A stored token is checked against the backend. A token the backend
    /// rejects is discarded; any other failure keeps it stored. Either way
    /// the session starts on the login screen.
    pub async fn init(config: Config, backend: Backend, storage: Arc<dyn Storage>) -> Self {
        let decoder = Arc::new(GenreDecoder::new(backend.assets.clone()));
        let favorites = Arc::new(FavoritesCache::load(storage.clone()));

        let limits = AggregatorLimits {
            per_song: config.per_song_recommendations,
            personalized: config.personalized_recommendations,
            personalized_threshold: config.personalized_threshold,
        };
        let aggregator = Arc::new(RecommendationAggregator::new(
            backend.recommender.clone(),
            decoder.clone(),
            favorites.clone(),
            limits,
        ));
        let listener = aggregator.spawn_listener();

        let generator = PlaylistGenerator::new(
            backend.recommender.clone(),
            decoder.clone(),
            config.playlist_size,
        );

        let session = Self {
            config,
            backend,
            storage,
            decoder,
            favorites,
            aggregator,
            generator,
            listener: Some(listener),
            state: SessionState::new(),
        };

        session.restore_identity().await;
        session
    }

    /// Stops background work. The session is unusable afterwards.
    pub async fn teardown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown().await;
        }
        tracing::info!("Session closed");
    }

    async fn restore_identity(&self) {
        let token = match self.storage.get::<AuthToken>(&StorageKey::AuthToken) {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential unreadable, discarding");
                self.forget_token();
                return;
            }
        };

        match self.backend.accounts.me(&token).await {
            Ok(user) => {
                tracing::info!(user = %user.email, "Restored session");
                let mut inner = self.state.inner.write().await;
                inner.token = Some(token);
                inner.user = Some(user);
                inner.screen = Screen::Dashboard;
            }
            Err(AppError::Unauthorized(reason)) => {
                tracing::warn!(reason = %reason, "Stored credential rejected, starting logged out");
                self.forget_token();
            }
            Err(e) => {
                // the credential is kept for the next start
                tracing::warn!(error = %e, "Could not verify stored credential, starting logged out");
            }
        }
    }

    fn forget_token(&self) {
        if let Err(e) = self.storage.remove(&StorageKey::AuthToken) {
            tracing::error!(error = %e, "Failed to remove stored credential");
        }
    }

    /// Records a failed user action as a notice and hands the error back
    async fn report(&self, action: &'static str, error: AppError) -> AppError {
        tracing::error!(action, error = %error, "User action failed");
        self.state.inner.write().await.notice = Some(error.notice());
        error
    }

    /// Current credential, or a redirect to the login screen
    async fn require_token(&self, action: &'static str) -> AppResult<AuthToken> {
        let mut inner = self.state.inner.write().await;
        if let Some(token) = inner.token.clone() {
            return Ok(token);
        }

        tracing::info!(action, "Login required, redirecting");
        inner.screen = Screen::Login;
        inner.notice = Some(LOGIN_REQUIRED.to_string());
        Err(AppError::Unauthorized("login required".to_string()))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn screen(&self) -> Screen {
        self.state.inner.read().await.screen
    }

    pub async fn user(&self) -> Option<UserInfo> {
        self.state.inner.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.inner.read().await.token.is_some()
    }

    pub async fn playlist(&self) -> Option<GeneratedPlaylist> {
        self.state.inner.read().await.playlist.clone()
    }

    pub async fn library(&self) -> Vec<PlaylistSummary> {
        self.state.inner.read().await.library.clone()
    }

    pub async fn tag_pool(&self) -> Vec<String> {
        self.state.inner.read().await.tag_pool.clone()
    }

    pub async fn song_pool(&self) -> Vec<TopSong> {
        self.state.inner.read().await.song_pool.clone()
    }

    pub async fn selected_tags(&self) -> Vec<String> {
        self.state.inner.read().await.selected_tags.clone()
    }

    pub async fn selected_songs(&self) -> Vec<Song> {
        self.state.inner.read().await.selected_songs.clone()
    }

    /// Song under the playback pointer
    pub async fn current_song(&self) -> Option<Song> {
        self.state.inner.read().await.current().cloned()
    }

    pub async fn is_playing(&self) -> bool {
        self.state.inner.read().await.playing
    }

    /// Pending blocking notice, cleared by reading it
    pub async fn take_notice(&self) -> Option<String> {
        self.state.inner.write().await.notice.take()
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserInfo> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if request.email.is_empty() || request.password.is_empty() {
            let e = AppError::InvalidInput("Enter your email and password.".to_string());
            return Err(self.report("login", e).await);
        }

        let token = match self.backend.accounts.login(&request).await {
            Ok(token) => token,
            Err(e) => return Err(self.report("login", e).await),
        };
        match self.establish(token).await {
            Ok(user) => Ok(user),
            Err(e) => Err(self.report("login", e).await),
        }
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> AppResult<UserInfo> {
        let request = SignupRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if request.name.is_empty() || request.email.is_empty() || request.password.is_empty() {
            let e = AppError::InvalidInput("Enter your name, email and password.".to_string());
            return Err(self.report("signup", e).await);
        }

        let token = match self.backend.accounts.signup(&request).await {
            Ok(token) => token,
            Err(e) => return Err(self.report("signup", e).await),
        };
        match self.establish(token).await {
            Ok(user) => Ok(user),
            Err(e) => Err(self.report("signup", e).await),
        }
    }

    /// Fetches the identity behind a fresh token, then persists it
    async fn establish(&self, token: AuthToken) -> AppResult<UserInfo> {
        let user = self.backend.accounts.me(&token).await?;

        if let Err(e) = self.storage.set(&StorageKey::AuthToken, &token) {
            tracing::error!(error = %e, "Failed to persist credential");
        }

        tracing::info!(user = %user.email, "Logged in");

        let mut inner = self.state.inner.write().await;
        inner.token = Some(token);
        inner.user = Some(user.clone());
        inner.screen = Screen::Dashboard;
        Ok(user)
    }

    /// Forgets the credential and everything tied to it; favorites stay
    pub async fn logout(&self) {
        self.forget_token();

        let mut inner = self.state.inner.write().await;
        inner.reset_identity();
        inner.screen = Screen::Login;

        tracing::info!("Logged out");
    }

    pub async fn show_signup(&self) {
        self.state.inner.write().await.screen = Screen::Signup;
    }

    pub async fn show_login(&self) {
        self.state.inner.write().await.screen = Screen::Login;
    }

    // ------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------

    /// Loads the tag and song tables once and deals fresh random pools
    ///
    /// A table that fails to load stays empty; only when both fail is the
    /// action reported as failed.
    pub async fn load_dashboard(&self) -> AppResult<()> {
        let loaded = {
            let inner = self.state.inner.read().await;
            !inner.top_tags.is_empty() && !inner.top_songs.is_empty()
        };

        if !loaded {
            let cap = self.config.asset_row_cap;
            let assets = self.backend.assets.as_ref();
            let (tags, songs) = tokio::join!(
                assets::load_top_tags(assets, cap),
                assets::load_top_songs(assets, cap)
            );

            let (tags, songs) = match (tags, songs) {
                (Err(e), Err(_)) => return Err(self.report("load_dashboard", e).await),
                (tags, songs) => (
                    tags.unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "Top tags unavailable");
                        Vec::new()
                    }),
                    songs.unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "Top songs unavailable");
                        Vec::new()
                    }),
                ),
            };

            let mut inner = self.state.inner.write().await;
            inner.top_tags = tags;
            inner.top_songs = songs;
        }

        let mut inner = self.state.inner.write().await;
        inner.tag_pool = assets::sample_tags(&inner.top_tags, &inner.selected_tags, TAG_POOL_SIZE);
        inner.song_pool = assets::sample(&inner.top_songs, SONG_POOL_SIZE);
        Ok(())
    }

    /// New random tag pool, leaving out selected tags
    pub async fn randomize_tags(&self) -> Vec<String> {
        let mut inner = self.state.inner.write().await;
        inner.tag_pool = assets::sample_tags(&inner.top_tags, &inner.selected_tags, TAG_POOL_SIZE);
        inner.tag_pool.clone()
    }

    /// New random pick of popular songs
    pub async fn randomize_songs(&self) -> Vec<TopSong> {
        let mut inner = self.state.inner.write().await;
        inner.song_pool = assets::sample(&inner.top_songs, SONG_POOL_SIZE);
        inner.song_pool.clone()
    }

    /// Popular song by id from the loaded table
    pub async fn top_song(&self, id: SongId) -> Option<Song> {
        self.state
            .inner
            .read()
            .await
            .top_songs
            .iter()
            .find(|s| s.id == id)
            .map(TopSong::to_song)
    }

    pub async fn suggest_tags(&self, query: &str) -> Vec<String> {
        let inner = self.state.inner.read().await;
        assets::suggest_tags(&inner.top_tags, &inner.selected_tags, query, TAG_SUGGESTION_LIMIT)
    }

    pub async fn select_tag(&self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() {
            return;
        }
        let mut inner = self.state.inner.write().await;
        if !inner.selected_tags.iter().any(|t| t == tag) {
            inner.selected_tags.push(tag.to_string());
        }
    }

    pub async fn unselect_tag(&self, tag: &str) {
        self.state
            .inner
            .write()
            .await
            .selected_tags
            .retain(|t| t != tag);
    }

    /// Returns whether the tag is selected afterwards
    pub async fn toggle_tag(&self, tag: &str) -> bool {
        let mut inner = self.state.inner.write().await;
        match inner.selected_tags.iter().position(|t| t == tag) {
            Some(index) => {
                inner.selected_tags.remove(index);
                false
            }
            None => {
                inner.selected_tags.push(tag.to_string());
                true
            }
        }
    }

    /// Returns whether the song is selected afterwards
    pub async fn toggle_song(&self, song: Song) -> bool {
        let mut inner = self.state.inner.write().await;
        match inner.selected_songs.iter().position(|s| s.id == song.id) {
            Some(index) => {
                inner.selected_songs.remove(index);
                false
            }
            None => {
                inner.selected_songs.push(song);
                true
            }
        }
    }

    pub async fn search_songs(&self, query: &str) -> AppResult<Vec<Song>> {
        let raw = match self.backend.recommender.search_songs(query, SEARCH_LIMIT).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.report("search_songs", e).await),
        };

        let table = self.decoder.table().await;
        let songs: Vec<Song> = raw.iter().map(|r| table.song_from_raw(r)).collect();

        tracing::info!(query, results = songs.len(), "Song search");

        self.state.inner.write().await.search_results = songs.clone();
        Ok(songs)
    }

    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    /// Builds a playlist from the current selections and opens it
    ///
    /// Selections and the playback pointer are kept; only going back to the
    /// dashboard resets them.
    pub async fn generate(&self) -> AppResult<GeneratedPlaylist> {
        let (tags, songs) = {
            let inner = self.state.inner.read().await;
            (inner.selected_tags.clone(), inner.selected_songs.clone())
        };

        let playlist = match self.generator.generate(&tags, &songs).await {
            Ok(playlist) => playlist,
            Err(e) => return Err(self.report("generate", e).await),
        };

        let mut inner = self.state.inner.write().await;
        inner.playlist = Some(playlist.clone());
        inner.screen = Screen::Playlist;
        Ok(playlist)
    }

    pub async fn back_to_dashboard(&self) {
        let mut inner = self.state.inner.write().await;
        inner.reset_selections();
        inner.screen = Screen::Dashboard;
    }

    /// Moves the playback pointer to a song of the open playlist
    pub async fn play_song(&self, id: SongId) -> Option<Song> {
        let mut inner = self.state.inner.write().await;
        let song = inner
            .playlist
            .as_ref()?
            .songs
            .iter()
            .find(|s| s.id == id)
            .cloned()?;
        inner.current_song = Some(id);
        inner.playing = true;
        Some(song)
    }

    /// Flips the playing flag, starting from the first song if none is current
    pub async fn toggle_playback(&self) -> bool {
        let mut inner = self.state.inner.write().await;
        if inner.current_song.is_none() {
            let first = inner
                .playlist
                .as_ref()
                .and_then(|p| p.songs.first())
                .map(|s| s.id);
            match first {
                Some(id) => {
                    inner.current_song = Some(id);
                    inner.playing = true;
                }
                None => inner.playing = false,
            }
            return inner.playing;
        }
        inner.playing = !inner.playing;
        inner.playing
    }

    /// Advances the pointer; stays on the last song at the end
    pub async fn next_song(&self) -> Option<Song> {
        self.step(|index, len| match index {
            None if len > 0 => Some(0),
            Some(i) if i + 1 < len => Some(i + 1),
            _ => None,
        })
        .await
    }

    /// Moves the pointer back; stays on the first song at the start
    pub async fn previous_song(&self) -> Option<Song> {
        self.step(|index, _| match index {
            Some(i) if i > 0 => Some(i - 1),
            _ => None,
        })
        .await
    }

    async fn step(&self, target: impl Fn(Option<usize>, usize) -> Option<usize>) -> Option<Song> {
        let mut inner = self.state.inner.write().await;
        let playlist = inner.playlist.as_ref()?;
        let index = inner.current_song.and_then(|id| playlist.position_of(id));
        let song = playlist.songs.get(target(index, playlist.songs.len())?)?.clone();
        inner.current_song = Some(song.id);
        inner.playing = true;
        Some(song)
    }

    /// Embeddable video for a song, `None` when nothing is found or the lookup fails
    pub async fn resolve_video(&self, song: &Song) -> Option<String> {
        self.find_video(&song.video_query()).await
    }

    pub async fn find_video(&self, query: &str) -> Option<String> {
        match self.backend.videos.find_video(query).await {
            Ok(video) => video,
            Err(e) => {
                tracing::warn!(query, error = %e, "Video lookup failed");
                None
            }
        }
    }

    pub async fn rename_playlist(&self, title: &str) -> AppResult<()> {
        let title = title.trim();
        if title.is_empty() {
            let e = AppError::InvalidInput("A playlist title cannot be empty.".to_string());
            return Err(self.report("rename_playlist", e).await);
        }

        let renamed = {
            let mut inner = self.state.inner.write().await;
            match inner.playlist.as_mut() {
                Some(playlist) => {
                    playlist.rename(title);
                    true
                }
                None => false,
            }
        };

        if !renamed {
            let e = AppError::InvalidInput("No playlist is open.".to_string());
            return Err(self.report("rename_playlist", e).await);
        }
        Ok(())
    }

    /// Persists the open playlist under the current identity
    ///
    /// A playlist saved earlier and renamed since is updated in place rather
    /// than saved a second time.
    pub async fn save_playlist(&self) -> AppResult<PlaylistId> {
        let token = self.require_token("save_playlist").await?;

        let Some(playlist) = self.playlist().await else {
            let e = AppError::InvalidInput("No playlist is open.".to_string());
            return Err(self.report("save_playlist", e).await);
        };

        if let (true, Some(id)) = (playlist.saved, playlist.remote_id) {
            return Ok(id);
        }

        let result = match playlist.remote_id {
            Some(id) => {
                self.backend
                    .accounts
                    .rename_playlist(&token, id, &playlist.title)
                    .await
            }
            None => {
                self.backend
                    .accounts
                    .create_playlist(&token, &NewPlaylist::from(&playlist))
                    .await
            }
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(e) => return Err(self.report("save_playlist", e).await),
        };

        tracing::info!(playlist_id = saved.id, songs = saved.items.len(), "Playlist saved");

        let mut inner = self.state.inner.write().await;
        if let Some(open) = inner.playlist.as_mut() {
            open.saved = true;
            open.remote_id = Some(saved.id);
        }
        Ok(saved.id)
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Lists saved playlists, newest first as the backend returns them
    pub async fn open_library(&self) -> AppResult<Vec<PlaylistSummary>> {
        let token = self.require_token("open_library").await?;

        let playlists = match self.backend.accounts.list_playlists(&token).await {
            Ok(playlists) => playlists,
            Err(e) => return Err(self.report("open_library", e).await),
        };
        let summaries: Vec<PlaylistSummary> = playlists.iter().map(PlaylistSummary::from).collect();

        tracing::info!(count = summaries.len(), "Library loaded");

        let mut inner = self.state.inner.write().await;
        inner.library = summaries.clone();
        inner.screen = Screen::Library;
        Ok(summaries)
    }

    pub async fn open_saved(&self, id: PlaylistId) -> AppResult<GeneratedPlaylist> {
        let token = self.require_token("open_saved").await?;

        let saved = match self.backend.accounts.get_playlist(&token, id).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.report("open_saved", e).await),
        };
        let playlist = saved.to_generated();

        let mut inner = self.state.inner.write().await;
        inner.playlist = Some(playlist.clone());
        inner.current_song = None;
        inner.playing = false;
        inner.screen = Screen::Playlist;
        Ok(playlist)
    }

    /// Deletes a saved playlist and lists the library again
    pub async fn delete_saved(&self, id: PlaylistId) -> AppResult<Vec<PlaylistSummary>> {
        let token = self.require_token("delete_saved").await?;

        if let Err(e) = self.backend.accounts.delete_playlist(&token, id).await {
            return Err(self.report("delete_saved", e).await);
        }

        tracing::info!(playlist_id = id, "Playlist deleted");

        {
            let mut inner = self.state.inner.write().await;
            if let Some(open) = inner.playlist.as_mut().filter(|p| p.remote_id == Some(id)) {
                open.saved = false;
                open.remote_id = None;
            }
        }

        self.open_library().await
    }

    pub async fn rename_saved(&self, id: PlaylistId, title: &str) -> AppResult<()> {
        let token = self.require_token("rename_saved").await?;

        let title = title.trim();
        if title.is_empty() {
            let e = AppError::InvalidInput("A playlist title cannot be empty.".to_string());
            return Err(self.report("rename_saved", e).await);
        }

        let saved = match self.backend.accounts.rename_playlist(&token, id, title).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.report("rename_saved", e).await),
        };

        let mut inner = self.state.inner.write().await;
        if let Some(entry) = inner.library.iter_mut().find(|p| p.id == id) {
            entry.title = saved.title.clone();
        }
        if let Some(open) = inner.playlist.as_mut().filter(|p| p.remote_id == Some(id)) {
            open.title = saved.title;
            open.saved = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    /// Likes or unlikes a song; derived recommendations follow in the background
    pub async fn toggle_favorite(&self, song: Song) -> Toggled {
        self.favorites.toggle(song).await
    }

    pub async fn is_favorite(&self, id: SongId) -> bool {
        self.favorites.contains(id).await
    }

    pub async fn favorites(&self) -> Vec<Song> {
        self.favorites.songs().await
    }

    pub async fn favorite_sample(&self, n: usize) -> Vec<Song> {
        self.favorites.sample(n).await
    }

    /// Similar songs for a favorite, fetching any missing entry first
    pub async fn recommendations_for(&self, id: SongId) -> Option<Vec<Song>> {
        if let Some(songs) = self.aggregator.recommendations_for(id).await {
            return Some(songs);
        }
        if !self.favorites.contains(id).await {
            return None;
        }
        self.aggregator.retry_missing().await;
        self.aggregator.recommendations_for(id).await
    }

    /// "For you" list, requested on first use once enough songs are liked
    pub async fn personalized(&self) -> Vec<Song> {
        let songs = self.aggregator.personalized().await;
        if !songs.is_empty() || self.favorites.len().await < self.config.personalized_threshold {
            return songs;
        }
        self.aggregator.refresh_personalized().await;
        self.aggregator.personalized().await
    }

    /// Drops cached recommendations so the next read fetches them again
    pub async fn clear_recommendations(&self) {
        self.aggregator.clear_cache().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::models::{RecommendationItem, SavedPlaylist};
    use crate::services::providers::{
        MockAccountProvider, MockAssetProvider, MockRecommendationProvider, MockVideoProvider,
    };
    use std::collections::HashMap;

    struct Mocks {
        recommender: MockRecommendationProvider,
        accounts: MockAccountProvider,
        videos: MockVideoProvider,
        assets: MockAssetProvider,
    }

    impl Mocks {
        fn new() -> Self {
            let mut assets = MockAssetProvider::new();
            assets
                .expect_fetch_genre_map()
                .returning(|| Ok(HashMap::from([("GN0101".to_string(), "Ballad".to_string())])));
            Self {
                recommender: MockRecommendationProvider::new(),
                accounts: MockAccountProvider::new(),
                videos: MockVideoProvider::new(),
                assets,
            }
        }

        fn into_backend(self) -> Backend {
            Backend {
                recommender: Arc::new(self.recommender),
                accounts: Arc::new(self.accounts),
                videos: Arc::new(self.videos),
                assets: Arc::new(self.assets),
            }
        }
    }

    fn user() -> UserInfo {
        UserInfo {
            name: "Jiwoo".to_string(),
            email: "jiwoo@example.com".to_string(),
        }
    }

    fn item(id: SongId) -> RecommendationItem {
        RecommendationItem {
            id,
            title: format!("Rec {}", id),
            artists: vec!["IU".to_string()],
            genres: vec!["GN0101".to_string()],
            score: 0.0,
        }
    }

    fn saved_playlist(id: PlaylistId, title: &str) -> SavedPlaylist {
        SavedPlaylist {
            id,
            title: title.to_string(),
            tags: vec!["chill".to_string()],
            items: vec![],
            created_at: None,
        }
    }

    async fn create_test_session(mocks: Mocks, storage: Arc<MemoryStorage>) -> Session {
        Session::init(Config::default(), mocks.into_backend(), storage).await
    }

    async fn create_logged_in_session(mut mocks: Mocks) -> (Arc<MemoryStorage>, Session) {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(&StorageKey::AuthToken, &AuthToken::new("stored"))
            .unwrap();
        mocks.accounts.expect_me().returning(|_| Ok(user()));
        let session = create_test_session(mocks, storage.clone()).await;
        (storage, session)
    }

    #[tokio::test]
    async fn test_init_without_token_starts_on_login() {
        let session = create_test_session(Mocks::new(), Arc::new(MemoryStorage::new())).await;
        assert_eq!(session.screen().await, Screen::Login);
        assert!(!session.is_authenticated().await);
        session.teardown().await;
    }

    #[tokio::test]
    async fn test_init_restores_valid_token() {
        let (_, session) = create_logged_in_session(Mocks::new()).await;
        assert_eq!(session.screen().await, Screen::Dashboard);
        assert_eq!(session.user().await, Some(user()));
        session.teardown().await;
    }

    #[tokio::test]
    async fn test_init_discards_rejected_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(&StorageKey::AuthToken, &AuthToken::new("expired"))
            .unwrap();

        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_me()
            .returning(|_| Err(AppError::Unauthorized("expired".to_string())));

        let session = create_test_session(mocks, storage.clone()).await;
        assert_eq!(session.screen().await, Screen::Login);
        assert_eq!(storage.get_raw(&StorageKey::AuthToken).unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_keeps_token_when_backend_unreachable() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(&StorageKey::AuthToken, &AuthToken::new("stored"))
            .unwrap();

        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_me()
            .returning(|_| Err(AppError::ExternalApi("Backend returned status 503".to_string())));

        let session = create_test_session(mocks, storage.clone()).await;
        assert_eq!(session.screen().await, Screen::Login);
        assert!(!session.is_authenticated().await);

        let stored: Option<AuthToken> = storage.get(&StorageKey::AuthToken).unwrap();
        assert_eq!(stored, Some(AuthToken::new("stored")));
    }

    #[tokio::test]
    async fn test_login_persists_token_and_opens_dashboard() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_login()
            .withf(|request| request.email == "jiwoo@example.com")
            .returning(|_| Ok(AuthToken::new("fresh")));
        mocks
            .accounts
            .expect_me()
            .withf(|token| token.as_str() == "fresh")
            .returning(|_| Ok(user()));

        let storage = Arc::new(MemoryStorage::new());
        let session = create_test_session(mocks, storage.clone()).await;

        let logged_in = session.login(" jiwoo@example.com ", "secret").await.unwrap();
        assert_eq!(logged_in.name, "Jiwoo");
        assert_eq!(session.screen().await, Screen::Dashboard);

        let stored: Option<AuthToken> = storage.get(&StorageKey::AuthToken).unwrap();
        assert_eq!(stored, Some(AuthToken::new("fresh")));
    }

    #[tokio::test]
    async fn test_login_failure_raises_notice_and_stays() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_login()
            .returning(|_| Err(AppError::Unauthorized("bad credentials".to_string())));

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;

        assert!(session.login("a@b.c", "wrong").await.is_err());
        assert_eq!(session.screen().await, Screen::Login);
        assert!(session.take_notice().await.is_some());
        assert!(session.take_notice().await.is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_blank_credentials() {
        let mut mocks = Mocks::new();
        mocks.accounts.expect_login().never();

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;
        let result = session.login("  ", "").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_signup_then_screens() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_signup()
            .withf(|request| request.name == "Jiwoo")
            .returning(|_| Ok(AuthToken::new("new")));
        mocks.accounts.expect_me().returning(|_| Ok(user()));

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;
        session.show_signup().await;
        assert_eq!(session.screen().await, Screen::Signup);
        session.show_login().await;
        assert_eq!(session.screen().await, Screen::Login);

        session
            .signup("Jiwoo", "jiwoo@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(session.screen().await, Screen::Dashboard);
    }

    #[tokio::test]
    async fn test_save_without_token_redirects_to_login() {
        let mut mocks = Mocks::new();
        mocks.accounts.expect_create_playlist().never();

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;
        session.state().inner.write().await.screen = Screen::Playlist;

        let result = session.save_playlist().await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert_eq!(session.screen().await, Screen::Login);
        assert_eq!(session.take_notice().await.as_deref(), Some(LOGIN_REQUIRED));
    }

    #[tokio::test]
    async fn test_generate_requires_selection() {
        let (_, session) = create_logged_in_session(Mocks::new()).await;

        assert!(session.generate().await.is_err());
        assert_eq!(session.screen().await, Screen::Dashboard);
        assert!(session.take_notice().await.is_some());
    }

    #[tokio::test]
    async fn test_generate_keeps_selections_until_back() {
        let mut mocks = Mocks::new();
        mocks
            .recommender
            .expect_recommend_by_tags()
            .returning(|_, _, _| Ok(vec![item(10), item(11), item(12)]));
        mocks
            .recommender
            .expect_recommend_by_dae()
            .returning(|_, _, _| Ok(vec![item(11), item(13), item(14)]));

        let (_, session) = create_logged_in_session(mocks).await;
        session.select_tag("chill").await;
        session.select_tag("chill").await;
        session.toggle_song(Song::new(1, "Seed", "IU")).await;

        let playlist = session.generate().await.unwrap();
        let ids: Vec<SongId> = playlist.songs.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![10, 11, 13, 12, 14]);
        assert_eq!(playlist.songs[0].genre, "Ballad");
        assert_eq!(session.screen().await, Screen::Playlist);
        assert_eq!(session.selected_tags().await, vec!["chill".to_string()]);
        assert_eq!(session.selected_songs().await.len(), 1);

        session.play_song(13).await.unwrap();
        session.back_to_dashboard().await;
        assert_eq!(session.screen().await, Screen::Dashboard);
        assert!(session.selected_tags().await.is_empty());
        assert!(session.selected_songs().await.is_empty());
        assert!(session.current_song().await.is_none());
        assert!(!session.is_playing().await);
    }

    #[tokio::test]
    async fn test_regenerate_keeps_playback() {
        let mut mocks = Mocks::new();
        mocks
            .recommender
            .expect_recommend_by_tags()
            .returning(|_, _, _| Ok(vec![item(10), item(11), item(12)]));

        let (_, session) = create_logged_in_session(mocks).await;
        session.select_tag("chill").await;
        session.generate().await.unwrap();
        session.play_song(11).await.unwrap();

        session.generate().await.unwrap();
        assert_eq!(session.current_song().await.map(|s| s.id), Some(11));
        assert!(session.is_playing().await);
        assert_eq!(session.screen().await, Screen::Playlist);
    }

    #[tokio::test]
    async fn test_playback_pointer() {
        let session = create_test_session(Mocks::new(), Arc::new(MemoryStorage::new())).await;
        session.state().inner.write().await.playlist = Some(GeneratedPlaylist::new(
            vec![],
            vec![Song::new(1, "One", "A"), Song::new(2, "Two", "B"), Song::new(3, "Three", "C")],
        ));

        assert!(session.previous_song().await.is_none());
        assert_eq!(session.next_song().await.map(|s| s.id), Some(1));
        assert_eq!(session.next_song().await.map(|s| s.id), Some(2));
        assert_eq!(session.previous_song().await.map(|s| s.id), Some(1));

        assert!(session.play_song(99).await.is_none());
        assert_eq!(session.play_song(3).await.map(|s| s.id), Some(3));
        assert!(session.next_song().await.is_none());
        assert_eq!(session.current_song().await.map(|s| s.id), Some(3));

        assert!(session.is_playing().await);
        assert!(!session.toggle_playback().await);
        assert!(session.toggle_playback().await);
    }

    #[tokio::test]
    async fn test_toggle_playback_starts_first_song() {
        let session = create_test_session(Mocks::new(), Arc::new(MemoryStorage::new())).await;
        assert!(!session.toggle_playback().await);

        session.state().inner.write().await.playlist = Some(GeneratedPlaylist::new(
            vec![],
            vec![Song::new(4, "Four", "D")],
        ));
        assert!(session.toggle_playback().await);
        assert_eq!(session.current_song().await.map(|s| s.id), Some(4));
    }

    #[tokio::test]
    async fn test_save_playlist_marks_saved() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_create_playlist()
            .times(1)
            .withf(|token, playlist| token.as_str() == "stored" && playlist.title == "Drive")
            .returning(|_, _| Ok(saved_playlist(31, "Drive")));

        let (_, session) = create_logged_in_session(mocks).await;
        session.state().inner.write().await.playlist = Some(GeneratedPlaylist::new(
            vec!["chill".to_string()],
            vec![Song::new(1, "One", "A")],
        ));
        session.rename_playlist("Drive").await.unwrap();

        assert_eq!(session.save_playlist().await.unwrap(), 31);
        // already saved: no second request
        assert_eq!(session.save_playlist().await.unwrap(), 31);

        let playlist = session.playlist().await.unwrap();
        assert!(playlist.saved);
        assert_eq!(playlist.remote_id, Some(31));
    }

    #[tokio::test]
    async fn test_save_after_rename_updates_title_in_place() {
        let mut mocks = Mocks::new();
        mocks.accounts.expect_create_playlist().never();
        mocks
            .accounts
            .expect_rename_playlist()
            .times(1)
            .withf(|_, id, title| *id == 8 && title == "Night")
            .returning(|_, _, _| Ok(saved_playlist(8, "Night")));

        let (_, session) = create_logged_in_session(mocks).await;
        session.state().inner.write().await.playlist =
            Some(saved_playlist(8, "Day").to_generated());

        session.rename_playlist("Night").await.unwrap();
        assert!(!session.playlist().await.unwrap().saved);

        assert_eq!(session.save_playlist().await.unwrap(), 8);
        assert!(session.playlist().await.unwrap().saved);
    }

    #[tokio::test]
    async fn test_library_open_and_delete() {
        let mut mocks = Mocks::new();
        let mut seq = mockall::Sequence::new();
        mocks
            .accounts
            .expect_list_playlists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![saved_playlist(2, "B"), saved_playlist(1, "A")]));
        mocks
            .accounts
            .expect_delete_playlist()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, id| *id == 2)
            .returning(|_, _| Ok(()));
        mocks
            .accounts
            .expect_list_playlists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![saved_playlist(1, "A")]));

        let (_, session) = create_logged_in_session(mocks).await;

        let library = session.open_library().await.unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library[0].id, 2);
        assert_eq!(session.screen().await, Screen::Library);

        let library = session.delete_saved(2).await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(session.library().await[0].title, "A");
    }

    #[tokio::test]
    async fn test_open_saved_playlist() {
        let mut mocks = Mocks::new();
        mocks
            .accounts
            .expect_get_playlist()
            .withf(|_, id| *id == 5)
            .returning(|_, _| Ok(saved_playlist(5, "Morning")));

        let (_, session) = create_logged_in_session(mocks).await;
        let playlist = session.open_saved(5).await.unwrap();

        assert!(playlist.saved);
        assert_eq!(playlist.remote_id, Some(5));
        assert_eq!(session.screen().await, Screen::Playlist);
    }

    #[tokio::test]
    async fn test_logout_keeps_favorites() {
        let mut mocks = Mocks::new();
        mocks
            .recommender
            .expect_recommend_by_songs()
            .returning(|_, _, _| Ok(vec![]));

        let (storage, session) = create_logged_in_session(mocks).await;
        session.toggle_favorite(Song::new(1, "One", "A")).await;

        session.logout().await;

        assert_eq!(session.screen().await, Screen::Login);
        assert!(!session.is_authenticated().await);
        assert_eq!(storage.get_raw(&StorageKey::AuthToken).unwrap(), None);
        assert!(session.is_favorite(1).await);
    }

    #[tokio::test]
    async fn test_personalized_fetched_on_first_read() {
        let mut mocks = Mocks::new();
        mocks
            .recommender
            .expect_recommend_by_dae()
            .returning(|_, _, _| Ok(vec![item(100)]));
        mocks
            .recommender
            .expect_recommend_by_songs()
            .returning(|seed, _, _| Ok(vec![item(seed[0] + 1000)]));

        let storage = Arc::new(MemoryStorage::new());
        let favorites: Vec<Song> = (1..=5).map(|id| Song::new(id, "Fav", "A")).collect();
        storage.set(&StorageKey::Favorites, &favorites).unwrap();

        let session = create_test_session(mocks, storage).await;

        assert_eq!(session.personalized().await.len(), 1);
        let similar = session.recommendations_for(3).await.unwrap();
        assert_eq!(similar[0].id, 1003);
        assert!(session.recommendations_for(42).await.is_none());
        session.teardown().await;
    }

    #[tokio::test]
    async fn test_dashboard_pools_and_suggestions() {
        let mut mocks = Mocks::new();
        mocks.assets.expect_fetch_text().returning(|path| {
            if path == crate::api::routes::TOP_TAGS_CSV {
                let rows: Vec<String> = (0..40).map(|i| format!("tag{},{}", i, 100 - i)).collect();
                Ok(format!("tag,count\n{}", rows.join("\n")))
            } else {
                let rows: Vec<String> = (0..30).map(|i| format!("{},Song {},Artist", i, i)).collect();
                Ok(format!("id,title,artist\n{}", rows.join("\n")))
            }
        });

        let (_, session) = create_logged_in_session(mocks).await;
        session.select_tag("tag1").await;
        session.load_dashboard().await.unwrap();

        let pool = session.tag_pool().await;
        assert_eq!(pool.len(), 30);
        assert!(!pool.contains(&"tag1".to_string()));
        assert_eq!(session.song_pool().await.len(), 20);
        assert_eq!(session.randomize_songs().await.len(), 20);
        assert_eq!(session.top_song(7).await.map(|s| s.title), Some("Song 7".to_string()));

        let suggestions = session.suggest_tags("TAG1").await;
        assert!(suggestions.iter().all(|t| t.starts_with("tag1")));
        assert!(!suggestions.contains(&"tag1".to_string()));
        assert_eq!(suggestions.len(), 10);
    }

    #[tokio::test]
    async fn test_resolve_video_failure_is_none() {
        let mut mocks = Mocks::new();
        mocks
            .videos
            .expect_find_video()
            .withf(|query| query == "Blueming IU")
            .returning(|_| Err(AppError::ExternalApi("quota".to_string())));

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;
        assert_eq!(session.resolve_video(&Song::new(1, "Blueming", "IU")).await, None);
        assert!(session.take_notice().await.is_none());
    }

    #[tokio::test]
    async fn test_search_songs_decodes_genres() {
        let mut mocks = Mocks::new();
        mocks.recommender.expect_search_songs().returning(|_, _| {
            Ok(vec![crate::models::RawSong {
                id: 3,
                title: "Eight".to_string(),
                artist: "IU".to_string(),
                album: None,
                genres: None,
                genre: Some(serde_json::json!("GN0101")),
            }])
        });

        let session = create_test_session(mocks, Arc::new(MemoryStorage::new())).await;
        let songs = session.search_songs("eight").await.unwrap();
        assert_eq!(songs[0].genre, "Ballad");
    }
}
