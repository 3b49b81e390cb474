//! Recommendation views derived from the favorite set
//!
//! Two views are kept: a per-song list for every favorite and one
//! personalized list seeded with the whole set. Both are recomputed when a
//! [`FavoritesChanged`] event arrives and each carries a generation counter so
//! a response that was overtaken by a newer pass is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::{
    models::{RecommendationItem, Song, SongId},
    services::{
        favorites::{FavoritesCache, FavoritesChanged},
        genre::GenreDecoder,
        providers::RecommendationProvider,
    },
};

/// Sizes of the derived views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorLimits {
    /// Songs fetched per favorite
    pub per_song: usize,
    /// Songs in the personalized list
    pub personalized: usize,
    /// Favorites needed before the personalized list is requested
    pub personalized_threshold: usize,
}

impl Default for AggregatorLimits {
    fn default() -> Self {
        Self {
            per_song: 5,
            personalized: 20,
            personalized_threshold: 5,
        }
    }
}

/// Per-song and personalized recommendations for the current favorites
pub struct RecommendationAggregator {
    recommender: Arc<dyn RecommendationProvider>,
    decoder: Arc<GenreDecoder>,
    favorites: Arc<FavoritesCache>,
    limits: AggregatorLimits,
    per_song: RwLock<HashMap<SongId, Vec<Song>>>,
    personalized: RwLock<Vec<Song>>,
    per_song_generation: AtomicU64,
    personalized_generation: AtomicU64,
}

/// Handle for stopping the background listener
pub struct AggregatorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl AggregatorHandle {
    /// Signals the listener to stop and waits for it to exit
    ///
    /// A pass already running finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Recommendation listener ended abnormally");
        }
        tracing::info!("Recommendation listener stopped");
    }
}

impl RecommendationAggregator {
    pub fn new(
        recommender: Arc<dyn RecommendationProvider>,
        decoder: Arc<GenreDecoder>,
        favorites: Arc<FavoritesCache>,
        limits: AggregatorLimits,
    ) -> Self {
        Self {
            recommender,
            decoder,
            favorites,
            limits,
            per_song: RwLock::new(HashMap::new()),
            personalized: RwLock::new(Vec::new()),
            per_song_generation: AtomicU64::new(0),
            personalized_generation: AtomicU64::new(0),
        }
    }

    /// Starts a task that refreshes both views on every favorites change
    ///
    /// The subscription is taken before this returns, so no change made after
    /// the call is missed.
    pub fn spawn_listener(self: &Arc<Self>) -> AggregatorHandle {
        let mut events = self.favorites.subscribe();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let aggregator = Arc::clone(self);

        let task = tokio::spawn(async move {
            tracing::info!("Recommendation listener started");

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => aggregator.on_favorites_changed(&event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // older events are superseded by the current set
                            tracing::warn!(skipped, "Recommendation listener lagged, refreshing from current favorites");
                            let ids = aggregator.favorites.ids().await;
                            aggregator.on_favorites_changed(&FavoritesChanged { ids }).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        AggregatorHandle { shutdown_tx, task }
    }

    /// Brings both views in line with a new favorite set
    pub async fn on_favorites_changed(&self, event: &FavoritesChanged) {
        tokio::join!(
            self.per_song_pass(&event.ids),
            self.personalized_pass(&event.ids)
        );
    }

    /// Runs a per-song pass over the current favorites
    ///
    /// Returns the number of entries added.
    pub async fn refresh_per_song(&self) -> usize {
        let ids = self.favorites.ids().await;
        self.per_song_pass(&ids).await
    }

    /// Requests the personalized list again for the current favorites
    pub async fn refresh_personalized(&self) {
        let ids = self.favorites.ids().await;
        self.personalized_pass(&ids).await;
    }

    /// Fetches entries for favorites whose earlier request failed
    pub async fn retry_missing(&self) -> usize {
        self.refresh_per_song().await
    }

    /// Drops every cached view and any response still in flight
    pub async fn clear_cache(&self) {
        self.per_song_generation.fetch_add(1, Ordering::SeqCst);
        self.personalized_generation.fetch_add(1, Ordering::SeqCst);
        self.per_song.write().await.clear();
        self.personalized.write().await.clear();
        tracing::info!("Recommendation cache cleared");
    }

    /// Per-song list for a favorite, `None` while it has not been fetched
    pub async fn recommendations_for(&self, id: SongId) -> Option<Vec<Song>> {
        self.per_song.read().await.get(&id).cloned()
    }

    pub async fn personalized(&self) -> Vec<Song> {
        self.personalized.read().await.clone()
    }

    async fn per_song_pass(&self, favorite_ids: &[SongId]) -> usize {
        let generation = self.per_song_generation.fetch_add(1, Ordering::SeqCst) + 1;

        // 1. Drop entries for songs no longer liked
        let missing: Vec<SongId> = {
            let mut cache = self.per_song.write().await;
            cache.retain(|id, _| favorite_ids.contains(id));
            favorite_ids
                .iter()
                .copied()
                .filter(|id| !cache.contains_key(id))
                .collect()
        };

        if missing.is_empty() {
            tracing::debug!(favorites = favorite_ids.len(), "Per-song recommendations up to date");
            return 0;
        }

        tracing::info!(missing = missing.len(), "Fetching per-song recommendations");

        // 2. One request per missing id, all in flight at once
        let mut tasks = Vec::with_capacity(missing.len());
        for id in missing {
            let recommender = Arc::clone(&self.recommender);
            let exclude = favorite_ids.to_vec();
            let k = self.limits.per_song;
            let task = tokio::spawn(async move {
                let result = recommender.recommend_by_songs(&[id], k, &exclude).await;
                (id, result)
            });
            tasks.push(task);
        }

        // 3. Await the whole batch; failures stay unset and are retried next pass
        let mut fetched: Vec<(SongId, Vec<RecommendationItem>)> = Vec::new();
        let mut failures = 0;
        for task in tasks {
            match task.await {
                Ok((id, Ok(items))) => fetched.push((id, items)),
                Ok((id, Err(e))) => {
                    failures += 1;
                    tracing::warn!(song_id = id, error = %e, "Per-song recommendation failed");
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(error = %e, "Per-song recommendation task failed");
                }
            }
        }

        let table = self.decoder.table().await;
        let decoded: Vec<(SongId, Vec<Song>)> = fetched
            .into_iter()
            .map(|(id, items)| (id, items.iter().map(|item| table.song_from_item(item)).collect()))
            .collect();

        // 4. Apply atomically unless a newer pass started meanwhile
        let mut cache = self.per_song.write().await;
        if self.per_song_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Discarding stale per-song recommendations");
            return 0;
        }

        let applied = decoded.len();
        cache.extend(decoded);

        tracing::info!(applied, failures, "Per-song recommendations updated");
        applied
    }

    async fn personalized_pass(&self, favorite_ids: &[SongId]) {
        let generation = self.personalized_generation.fetch_add(1, Ordering::SeqCst) + 1;

        if favorite_ids.len() < self.limits.personalized_threshold {
            self.personalized.write().await.clear();
            tracing::debug!(
                favorites = favorite_ids.len(),
                threshold = self.limits.personalized_threshold,
                "Too few favorites for personalized recommendations"
            );
            return;
        }

        let result = self
            .recommender
            .recommend_by_dae(favorite_ids, self.limits.personalized, favorite_ids)
            .await;

        let items = match result {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Personalized recommendation failed, keeping previous list");
                return;
            }
        };

        let table = self.decoder.table().await;
        let songs: Vec<Song> = items.iter().map(|item| table.song_from_item(item)).collect();
        self.apply_personalized(generation, songs).await;
    }

    async fn apply_personalized(&self, generation: u64, songs: Vec<Song>) -> bool {
        let mut current = self.personalized.write().await;
        if self.personalized_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Discarding stale personalized recommendations");
            return false;
        }

        tracing::info!(count = songs.len(), "Personalized recommendations updated");
        *current = songs;
        true
    }
}
