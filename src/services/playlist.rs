use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{GeneratedPlaylist, RecommendationItem, Song, SongId},
    services::{genre::GenreDecoder, merge::interleave_dedup, providers::RecommendationProvider},
};

/// Builds playlists from selected tags and songs
///
/// Tag and behavior recommendations are requested concurrently and merged
/// by alternating between the two ranked lists.
pub struct PlaylistGenerator {
    recommender: Arc<dyn RecommendationProvider>,
    decoder: Arc<GenreDecoder>,
    size: usize,
}

impl PlaylistGenerator {
    pub fn new(
        recommender: Arc<dyn RecommendationProvider>,
        decoder: Arc<GenreDecoder>,
        size: usize,
    ) -> Self {
        Self {
            recommender,
            decoder,
            size,
        }
    }

    /// Generates an unsaved playlist titled after the selected tags
    ///
    /// A source with no input is skipped. A failing source counts as empty
    /// as long as another source answered; if none did, the first error is
    /// returned.
    pub async fn generate(&self, tags: &[String], songs: &[Song]) -> AppResult<GeneratedPlaylist> {
        if tags.is_empty() && songs.is_empty() {
            return Err(AppError::InvalidInput(
                "Pick at least one tag or song to generate a playlist.".to_string(),
            ));
        }

        let seed_ids: Vec<SongId> = songs.iter().map(|s| s.id).collect();

        tracing::info!(tags = tags.len(), seeds = seed_ids.len(), "Generating playlist");

        // 1. Both sources in flight together
        let (by_tags, by_dae) = tokio::join!(
            self.fetch_by_tags(tags, &seed_ids),
            self.fetch_by_dae(&seed_ids)
        );

        // 2. Degrade a failed source to empty unless nothing answered
        let mut first_error = None;
        let mut answered = false;
        let mut ranked = [Vec::new(), Vec::new()];
        for (slot, (source, result)) in [("tags", by_tags), ("dae", by_dae)].into_iter().enumerate() {
            match result {
                Some(Ok(items)) => {
                    answered = true;
                    ranked[slot] = items;
                }
                Some(Err(e)) => {
                    tracing::warn!(source, error = %e, "Recommendation source failed, treating as empty");
                    first_error.get_or_insert(e);
                }
                None => {}
            }
        }

        if !answered {
            if let Some(e) = first_error {
                tracing::error!(error = %e, "Playlist generation failed");
                return Err(e);
            }
        }

        // 3. Merge, then decode into displayable songs
        let [tag_items, dae_items] = ranked;
        let merged = interleave_dedup(&tag_items, &dae_items, self.size);
        let table = self.decoder.table().await;
        let songs: Vec<Song> = merged.iter().map(|item| table.song_from_item(item)).collect();

        tracing::info!(songs = songs.len(), "Playlist generated");

        Ok(GeneratedPlaylist::new(tags.to_vec(), songs))
    }

    async fn fetch_by_tags(
        &self,
        tags: &[String],
        exclude: &[SongId],
    ) -> Option<AppResult<Vec<RecommendationItem>>> {
        if tags.is_empty() {
            return None;
        }
        Some(self.recommender.recommend_by_tags(tags, self.size, exclude).await)
    }

    async fn fetch_by_dae(&self, seeds: &[SongId]) -> Option<AppResult<Vec<RecommendationItem>>> {
        if seeds.is_empty() {
            return None;
        }
        Some(self.recommender.recommend_by_dae(seeds, self.size, seeds).await)
    }
}
