use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{song::join_names, Song, SongId};

/// Tags shown on a playlist card before collapsing into "+N"
pub const DISPLAY_TAG_LIMIT: usize = 6;

/// Identifier of a playlist persisted on the backend
pub type PlaylistId = i64;

/// A playlist produced by "generate" or opened from the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedPlaylist {
    /// User-editable title
    pub title: String,
    pub tags: Vec<String>,
    pub songs: Vec<Song>,
    /// Whether this playlist is persisted under the current identity
    pub saved: bool,
    /// Backend id once saved
    pub remote_id: Option<PlaylistId>,
}

impl GeneratedPlaylist {
    /// Creates an unsaved playlist with a title derived from its tags
    pub fn new(tags: Vec<String>, songs: Vec<Song>) -> Self {
        Self {
            title: default_title(&tags),
            tags,
            songs,
            saved: false,
            remote_id: None,
        }
    }

    /// Tags to display, capped at [`DISPLAY_TAG_LIMIT`]
    pub fn display_tags(&self) -> &[String] {
        &self.tags[..self.tags.len().min(DISPLAY_TAG_LIMIT)]
    }

    /// Number of tags hidden behind the display cap
    pub fn hidden_tag_count(&self) -> usize {
        self.tags.len().saturating_sub(DISPLAY_TAG_LIMIT)
    }

    /// Renaming an already saved playlist leaves the saved copy untouched,
    /// so the local one is marked unsaved until the rename is pushed.
    pub fn rename(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.saved = false;
        }
    }

    /// Position of a song in the playlist
    pub fn position_of(&self, id: SongId) -> Option<usize> {
        self.songs.iter().position(|s| s.id == id)
    }
}

fn default_title(tags: &[String]) -> String {
    if tags.is_empty() {
        "Recommended for you".to_string()
    } else {
        let shown: Vec<String> = tags.iter().take(3).map(|t| format!("#{}", t)).collect();
        format!("{} mix", shown.join(" "))
    }
}

/// Body of `POST /playlists`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlaylist {
    pub title: String,
    pub tags: Vec<String>,
    pub items: Vec<NewPlaylistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlaylistItem {
    pub song_id: SongId,
    pub title: String,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
}

impl From<&GeneratedPlaylist> for NewPlaylist {
    fn from(playlist: &GeneratedPlaylist) -> Self {
        Self {
            title: playlist.title.clone(),
            tags: playlist.tags.clone(),
            items: playlist
                .songs
                .iter()
                .map(|song| NewPlaylistItem {
                    song_id: song.id,
                    title: song.title.clone(),
                    artists: split_joined(&song.artist),
                    genres: split_joined(&song.genre),
                })
                .collect(),
        }
    }
}

fn split_joined(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Body of `PATCH /playlists/{id}/title`
#[derive(Debug, Clone, Serialize)]
pub struct RenamePlaylist {
    pub title: String,
}

/// Playlist as persisted by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedPlaylist {
    pub id: PlaylistId,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub items: Vec<SavedPlaylistItem>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 as well as the naive UTC timestamps some backends emit.
/// Anything unparsable becomes `None` rather than failing the whole playlist.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedPlaylistItem {
    pub id: i64,
    pub position: i64,
    pub song_id: SongId,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl SavedPlaylist {
    /// Reopens a saved playlist for the playlist screen
    pub fn to_generated(&self) -> GeneratedPlaylist {
        let mut items: Vec<&SavedPlaylistItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.position);

        GeneratedPlaylist {
            title: if self.title.is_empty() {
                "Playlist".to_string()
            } else {
                self.title.clone()
            },
            tags: self.tags.clone(),
            songs: items
                .into_iter()
                .map(|item| Song {
                    id: item.song_id,
                    title: item.title.clone(),
                    artist: join_names(&item.artists),
                    album: String::new(),
                    genre: join_names(&item.genres),
                })
                .collect(),
            saved: true,
            remote_id: Some(self.id),
        }
    }
}

/// Library card for a saved playlist
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub title: String,
    pub tags: Vec<String>,
    pub song_count: usize,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&SavedPlaylist> for PlaylistSummary {
    fn from(playlist: &SavedPlaylist) -> Self {
        Self {
            id: playlist.id,
            title: playlist.title.clone(),
            tags: playlist.tags.clone(),
            song_count: playlist.items.len(),
            created_at: playlist.created_at,
        }
    }
}
