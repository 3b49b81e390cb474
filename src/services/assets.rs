//! Static catalog assets used to seed the dashboard
//!
//! `top_tags.csv` has `tag,count` rows and `top_songs.csv` has
//! `id,title,artist` rows, both with a header line.

use csv::{ReaderBuilder, StringRecord, Trim};
use rand::seq::SliceRandom;

use crate::{
    api::routes,
    error::AppResult,
    models::{Song, SongId},
    services::providers::AssetProvider,
};

/// Popular song row from `top_songs.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct TopSong {
    pub id: SongId,
    pub title: String,
    pub artist: String,
}

impl TopSong {
    /// Dashboard songs carry no album or genre information
    pub fn to_song(&self) -> Song {
        Song::new(self.id, self.title.clone(), self.artist.clone())
    }
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.trim().as_bytes())
}

fn field<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or_default()
}

/// Parses the tag table, most used first, capped at `cap` entries
///
/// Rows with an empty tag are dropped. Counts may be fractional or in
/// exponent form; a missing or non-numeric count sorts as zero.
pub fn parse_top_tags(text: &str, cap: usize) -> AppResult<Vec<String>> {
    let mut rows: Vec<(String, f64)> = Vec::new();

    for record in reader(text).records() {
        let record = record?;
        let tag = field(&record, 0);
        if tag.is_empty() {
            continue;
        }
        let count = field(&record, 1)
            .parse::<f64>()
            .ok()
            .filter(|count| !count.is_nan())
            .unwrap_or(0.0);
        rows.push((tag.to_string(), count));
    }

    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    rows.truncate(cap);

    Ok(rows.into_iter().map(|(tag, _)| tag).collect())
}

/// Parses the popular song table in file order, capped at `cap` entries
///
/// Rows whose id is not an integer are skipped.
pub fn parse_top_songs(text: &str, cap: usize) -> AppResult<Vec<TopSong>> {
    let mut songs = Vec::new();

    for record in reader(text).records() {
        let record = record?;
        let Ok(id) = field(&record, 0).parse::<SongId>() else {
            tracing::debug!(row = ?record, "Skipping top song row without a valid id");
            continue;
        };
        songs.push(TopSong {
            id,
            title: field(&record, 1).to_string(),
            artist: field(&record, 2).to_string(),
        });
        if songs.len() >= cap {
            break;
        }
    }

    Ok(songs)
}

/// Fetches and parses the tag table
pub async fn load_top_tags(assets: &dyn AssetProvider, cap: usize) -> AppResult<Vec<String>> {
    let text = assets.fetch_text(routes::TOP_TAGS_CSV).await?;
    let tags = parse_top_tags(&text, cap)?;
    tracing::info!(count = tags.len(), "Loaded top tags");
    Ok(tags)
}

/// Fetches and parses the popular song table
pub async fn load_top_songs(assets: &dyn AssetProvider, cap: usize) -> AppResult<Vec<TopSong>> {
    let text = assets.fetch_text(routes::TOP_SONGS_CSV).await?;
    let songs = parse_top_songs(&text, cap)?;
    tracing::info!(count = songs.len(), "Loaded top songs");
    Ok(songs)
}

/// Uniform random subset of at most `n` items
pub fn sample<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let mut pool = items.to_vec();
    pool.shuffle(&mut rand::rng());
    pool.truncate(n);
    pool
}

/// Random tag pool that leaves out tags already selected
pub fn sample_tags(tags: &[String], selected: &[String], n: usize) -> Vec<String> {
    let available: Vec<String> = tags
        .iter()
        .filter(|tag| !selected.contains(tag))
        .cloned()
        .collect();
    sample(&available, n)
}

/// Case-insensitive substring matches over the tag table
///
/// A blank query suggests nothing.
pub fn suggest_tags(tags: &[String], selected: &[String], query: &str, limit: usize) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    tags.iter()
        .filter(|tag| !selected.contains(tag))
        .filter(|tag| tag.to_lowercase().contains(&query))
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockAssetProvider;
    use std::collections::HashSet;

    const TAGS_CSV: &str = "tag,count\n\
        chill,12\n\
        ,40\n\
        dance,30\n\
        ballad,notanumber\n\
        rainy day,25\n";

    const SONGS_CSV: &str = "id,title,artist\n\
        101,Blueming,IU\n\
        abc,Broken,Nobody\n\
        102,\"Love, poem\",IU\n\
        103,Hype Boy\n";

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_top_tags_sorts_by_count_and_skips_empty() {
        let parsed = parse_top_tags(TAGS_CSV, 500).unwrap();
        assert_eq!(parsed, tags(&["dance", "rainy day", "chill", "ballad"]));
    }

    #[test]
    fn test_parse_top_tags_accepts_fractional_and_exponent_counts() {
        let csv = "tag,count\n\
            chill,12\n\
            lofi,12.5\n\
            dance,1e3\n\
            broken,NaN\n\
            ballad,3\n";
        let parsed = parse_top_tags(csv, 500).unwrap();
        assert_eq!(parsed, tags(&["dance", "lofi", "chill", "ballad", "broken"]));
    }

    #[test]
    fn test_parse_top_tags_caps_rows() {
        let parsed = parse_top_tags(TAGS_CSV, 2).unwrap();
        assert_eq!(parsed, tags(&["dance", "rainy day"]));
    }

    #[test]
    fn test_parse_top_tags_header_only() {
        assert!(parse_top_tags("tag,count\n", 500).unwrap().is_empty());
        assert!(parse_top_tags("", 500).unwrap().is_empty());
    }

    #[test]
    fn test_parse_top_songs_skips_invalid_ids() {
        let songs = parse_top_songs(SONGS_CSV, 500).unwrap();
        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].title, "Blueming");
        assert_eq!(songs[1].title, "Love, poem");
        assert_eq!(songs[2].artist, "");
    }

    #[test]
    fn test_parse_top_songs_caps_rows() {
        let songs = parse_top_songs(SONGS_CSV, 1).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, 101);
    }

    #[test]
    fn test_top_song_to_song() {
        let song = TopSong {
            id: 5,
            title: "Ditto".to_string(),
            artist: "NewJeans".to_string(),
        }
        .to_song();
        assert_eq!(song.id, 5);
        assert_eq!(song.album, "");
        assert_eq!(song.genre, "");
    }

    #[test]
    fn test_sample_is_a_subset_without_repeats() {
        let items: Vec<u32> = (0..50).collect();
        let picked = sample(&items, 20);
        assert_eq!(picked.len(), 20);
        let unique: HashSet<u32> = picked.iter().copied().collect();
        assert_eq!(unique.len(), 20);
        assert!(picked.iter().all(|i| items.contains(i)));

        assert_eq!(sample(&items[..3], 20).len(), 3);
    }

    #[test]
    fn test_sample_tags_excludes_selected() {
        let all = tags(&["a", "b", "c", "d"]);
        let pool = sample_tags(&all, &tags(&["b", "d"]), 30);
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&"b".to_string()));
        assert!(!pool.contains(&"d".to_string()));
    }

    #[test]
    fn test_suggest_tags() {
        let all = tags(&["Rainy Day", "rain", "summer", "brain dance"]);
        assert_eq!(
            suggest_tags(&all, &tags(&["rain"]), " RAIN ", 20),
            tags(&["Rainy Day", "brain dance"])
        );
        assert_eq!(suggest_tags(&all, &[], "rain", 1), tags(&["Rainy Day"]));
        assert!(suggest_tags(&all, &[], "   ", 20).is_empty());
    }

    #[tokio::test]
    async fn test_load_top_tags_fetches_asset_path() {
        let mut assets = MockAssetProvider::new();
        assets
            .expect_fetch_text()
            .withf(|path| path == routes::TOP_TAGS_CSV)
            .times(1)
            .returning(|_| Ok(TAGS_CSV.to_string()));

        let loaded = load_top_tags(&assets, 500).await.unwrap();
        assert_eq!(loaded[0], "dance");
    }
}
