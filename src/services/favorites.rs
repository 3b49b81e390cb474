use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{broadcast, RwLock};

use crate::{
    db::{Storage, StorageExt, StorageKey},
    models::{Song, SongId},
};

const EVENT_CAPACITY: usize = 16;

/// Published after every change to the favorite set
#[derive(Debug, Clone, PartialEq)]
pub struct FavoritesChanged {
    /// Favorite ids after the change, in insertion order
    pub ids: Vec<SongId>,
}

/// Outcome of [`FavoritesCache::toggle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

/// The user's liked songs, persisted locally and written through on change
pub struct FavoritesCache {
    storage: Arc<dyn Storage>,
    songs: RwLock<Vec<Song>>,
    events: broadcast::Sender<FavoritesChanged>,
}

impl FavoritesCache {
    /// Restores the favorite set from storage
    ///
    /// Missing or unreadable data starts an empty set; startup never fails here.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let songs = match storage.get::<Vec<Song>>(&StorageKey::Favorites) {
            Ok(Some(songs)) => dedup_by_id(songs),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored favorites unreadable, starting empty");
                Vec::new()
            }
        };

        tracing::info!(count = songs.len(), "Favorites restored");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            songs: RwLock::new(songs),
            events,
        }
    }

    /// Receiver for [`FavoritesChanged`] events
    pub fn subscribe(&self) -> broadcast::Receiver<FavoritesChanged> {
        self.events.subscribe()
    }

    /// Adds the song if absent, removes it if present
    ///
    /// The new set is persisted before returning. A failed write is logged and
    /// the in-memory change is kept.
    pub async fn toggle(&self, song: Song) -> Toggled {
        let mut songs = self.songs.write().await;

        let outcome = match songs.iter().position(|s| s.id == song.id) {
            Some(index) => {
                songs.remove(index);
                Toggled::Removed
            }
            None => {
                songs.push(song.clone());
                Toggled::Added
            }
        };

        if let Err(e) = self.storage.set(&StorageKey::Favorites, &*songs) {
            tracing::error!(error = %e, song_id = song.id, "Failed to persist favorites");
        }

        let ids: Vec<SongId> = songs.iter().map(|s| s.id).collect();
        let count = ids.len();

        // Published under the write guard so events arrive in mutation order.
        // No subscribers is fine.
        let _ = self.events.send(FavoritesChanged { ids });
        drop(songs);

        tracing::info!(song_id = song.id, outcome = ?outcome, count, "Favorite toggled");

        outcome
    }

    pub async fn contains(&self, id: SongId) -> bool {
        self.songs.read().await.iter().any(|s| s.id == id)
    }

    /// Favorite ids in insertion order
    pub async fn ids(&self) -> Vec<SongId> {
        self.songs.read().await.iter().map(|s| s.id).collect()
    }

    pub async fn songs(&self) -> Vec<Song> {
        self.songs.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.songs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.songs.read().await.is_empty()
    }

    /// Up to `n` favorites in random order, recomputed on every call
    pub async fn sample(&self, n: usize) -> Vec<Song> {
        let mut songs = self.songs().await;
        songs.shuffle(&mut rand::rng());
        songs.truncate(n);
        songs
    }
}

fn dedup_by_id(songs: Vec<Song>) -> Vec<Song> {
    let mut unique: Vec<Song> = Vec::with_capacity(songs.len());
    for song in songs {
        if !unique.iter().any(|s| s.id == song.id) {
            unique.push(song);
        }
    }
    unique
}
