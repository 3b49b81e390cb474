use serde::{Deserialize, Serialize};

use super::SongId;

/// Anything carrying a song identity
pub trait HasSongId {
    fn song_id(&self) -> SongId;
}

/// A song as shown to the user
///
/// Built from a server record and never mutated afterwards; a re-fetch
/// replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    /// Server-assigned identifier
    pub id: SongId,
    pub title: String,
    /// Artist names joined with ", "
    pub artist: String,
    /// Album name, may be empty
    #[serde(default)]
    pub album: String,
    /// Decoded genre labels joined with ", "
    #[serde(default)]
    pub genre: String,
}

impl Song {
    /// Creates a song with no album or genre information
    pub fn new(id: SongId, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            genre: String::new(),
        }
    }

    /// Query handed to the video lookup for this song
    pub fn video_query(&self) -> String {
        format!("{} {}", self.title, self.artist).trim().to_string()
    }
}

impl HasSongId for Song {
    fn song_id(&self) -> SongId {
        self.id
    }
}

/// Joins a list of names for display
pub fn join_names(names: &[String]) -> String {
    names.join(", ")
}
