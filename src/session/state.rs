use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    models::{AuthToken, GeneratedPlaylist, PlaylistSummary, Song, SongId, UserInfo},
    services::assets::TopSong,
};

/// Screen the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Signup,
    Dashboard,
    Playlist,
    Library,
}

/// Shared session state
#[derive(Clone)]
pub struct SessionState {
    pub inner: Arc<RwLock<SessionStateInner>>,
}

/// Inner state that can be modified
#[derive(Debug)]
pub struct SessionStateInner {
    pub screen: Screen,
    pub token: Option<AuthToken>,
    pub user: Option<UserInfo>,

    // Dashboard
    pub top_tags: Vec<String>,
    pub tag_pool: Vec<String>,
    pub top_songs: Vec<TopSong>,
    pub song_pool: Vec<TopSong>,
    pub selected_tags: Vec<String>,
    pub selected_songs: Vec<Song>,
    pub search_results: Vec<Song>,

    // Playlist and playback
    pub playlist: Option<GeneratedPlaylist>,
    pub current_song: Option<SongId>,
    pub playing: bool,

    pub library: Vec<PlaylistSummary>,

    /// Blocking message waiting to be shown
    pub notice: Option<String>,
}

impl SessionStateInner {
    fn new() -> Self {
        Self {
            screen: Screen::Login,
            token: None,
            user: None,
            top_tags: Vec::new(),
            tag_pool: Vec::new(),
            top_songs: Vec::new(),
            song_pool: Vec::new(),
            selected_tags: Vec::new(),
            selected_songs: Vec::new(),
            search_results: Vec::new(),
            playlist: None,
            current_song: None,
            playing: false,
            library: Vec::new(),
            notice: None,
        }
    }

    /// Clears tag and song selections together with the playback pointer
    pub fn reset_selections(&mut self) {
        self.selected_tags.clear();
        self.selected_songs.clear();
        self.current_song = None;
        self.playing = false;
    }

    /// Forgets everything tied to the signed-in identity
    pub fn reset_identity(&mut self) {
        self.token = None;
        self.user = None;
        self.playlist = None;
        self.library.clear();
        self.search_results.clear();
        self.reset_selections();
    }

    /// Song under the playback pointer
    pub fn current(&self) -> Option<&Song> {
        let id = self.current_song?;
        self.playlist.as_ref()?.songs.iter().find(|s| s.id == id)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates a fresh state on the login screen
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionStateInner::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_state_starts_on_login() {
        let state = SessionState::new();
        let inner = state.inner.read().await;
        assert_eq!(inner.screen, Screen::Login);
        assert!(inner.token.is_none());
        assert!(inner.notice.is_none());
    }

    #[tokio::test]
    async fn test_reset_identity_keeps_screen_and_pools() {
        let state = SessionState::new();
        let mut inner = state.inner.write().await;
        inner.screen = Screen::Playlist;
        inner.token = Some(AuthToken::new("t"));
        inner.top_tags = vec!["chill".to_string()];
        inner.selected_tags = vec!["chill".to_string()];
        inner.current_song = Some(3);
        inner.playing = true;

        inner.reset_identity();

        assert!(inner.token.is_none());
        assert!(inner.selected_tags.is_empty());
        assert_eq!(inner.current_song, None);
        assert!(!inner.playing);
        assert_eq!(inner.top_tags.len(), 1);
        assert_eq!(inner.screen, Screen::Playlist);
    }

    #[tokio::test]
    async fn test_current_song_lookup() {
        let state = SessionState::new();
        let mut inner = state.inner.write().await;
        inner.playlist = Some(GeneratedPlaylist::new(
            vec![],
            vec![Song::new(1, "One", "A"), Song::new(2, "Two", "B")],
        ));
        assert!(inner.current().is_none());

        inner.current_song = Some(2);
        assert_eq!(inner.current().map(|s| s.title.as_str()), Some("Two"));
    }
}
