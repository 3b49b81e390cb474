use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
    models::{song::join_names, RawSong, RecommendationItem, Song},
    services::providers::AssetProvider,
};

static GENRE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GN\d{4}").expect("genre code pattern is valid"));

static GENRE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s/]+").expect("genre delimiter pattern is valid"));

/// Raw genre representation as it arrives from the backend
#[derive(Debug, Clone, PartialEq)]
pub enum GenreInput {
    /// A list of codes
    Codes(Vec<String>),
    /// Either embedded `GNxxxx` tokens or a free-form delimited string
    Text(String),
    /// Any other shape, decodes to nothing
    Unsupported,
}

impl From<&Value> for GenreInput {
    fn from(value: &Value) -> Self {
        match value {
            Value::Array(items) => GenreInput::Codes(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::String(s) => GenreInput::Text(s.clone()),
            _ => GenreInput::Unsupported,
        }
    }
}

impl From<&[String]> for GenreInput {
    fn from(codes: &[String]) -> Self {
        GenreInput::Codes(codes.to_vec())
    }
}

impl From<&str> for GenreInput {
    fn from(text: &str) -> Self {
        GenreInput::Text(text.to_string())
    }
}

/// Genre code to display label lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenreTable {
    labels: HashMap<String, String>,
}

impl GenreTable {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a code, or the code itself when the table has no entry
    pub fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map(String::as_str).unwrap_or(code)
    }

    /// Decodes any accepted input shape into labels, preserving order and duplicates
    pub fn decode(&self, input: &GenreInput) -> Vec<String> {
        let codes: Vec<&str> = match input {
            GenreInput::Codes(codes) => codes.iter().map(String::as_str).collect(),
            GenreInput::Text(text) => {
                let embedded: Vec<&str> = GENRE_CODE.find_iter(text).map(|m| m.as_str()).collect();
                if embedded.is_empty() {
                    GENRE_DELIMITER
                        .split(text)
                        .filter(|piece| !piece.is_empty())
                        .collect()
                } else {
                    embedded
                }
            }
            GenreInput::Unsupported => Vec::new(),
        };

        codes
            .into_iter()
            .map(|code| self.label(code).to_string())
            .collect()
    }

    /// Decodes a raw JSON value
    pub fn decode_value(&self, value: &Value) -> Vec<String> {
        self.decode(&GenreInput::from(value))
    }

    /// Labels joined for display
    pub fn display(&self, input: &GenreInput) -> String {
        join_names(&self.decode(input))
    }

    /// Converts a ranked candidate into a displayable song
    pub fn song_from_item(&self, item: &RecommendationItem) -> Song {
        Song {
            id: item.id,
            title: item.title.clone(),
            artist: join_names(&item.artists),
            album: String::new(),
            genre: self.display(&GenreInput::from(item.genres.as_slice())),
        }
    }

    /// Converts a search or sample record into a displayable song
    pub fn song_from_raw(&self, raw: &RawSong) -> Song {
        let genre = raw
            .genres
            .as_ref()
            .or(raw.genre.as_ref())
            .map(|value| join_names(&self.decode_value(value)))
            .unwrap_or_default();

        Song {
            id: raw.id,
            title: raw.title.clone(),
            artist: raw.artist.clone(),
            album: raw.album.clone().unwrap_or_default(),
            genre,
        }
    }
}

/// Lazily fetched, process-wide genre table
///
/// The table is fetched on first use. A failed fetch degrades to pass-through
/// decoding and is retried on the next call; once a fetch succeeds the table
/// is never fetched again.
pub struct GenreDecoder {
    assets: Option<Arc<dyn AssetProvider>>,
    table: OnceCell<Arc<GenreTable>>,
}

impl GenreDecoder {
    pub fn new(assets: Arc<dyn AssetProvider>) -> Self {
        Self {
            assets: Some(assets),
            table: OnceCell::new(),
        }
    }

    /// Decoder with a fixed table and no remote source
    pub fn with_table(table: GenreTable) -> Self {
        Self {
            assets: None,
            table: OnceCell::new_with(Some(Arc::new(table))),
        }
    }

    /// Current table, fetching it if this is the first successful use
    pub async fn table(&self) -> Arc<GenreTable> {
        let Some(assets) = &self.assets else {
            return self.table.get().cloned().unwrap_or_default();
        };

        let result = self
            .table
            .get_or_try_init(|| async {
                let labels = assets.fetch_genre_map().await?;
                tracing::info!(codes = labels.len(), "Genre table loaded");
                Ok::<_, crate::error::AppError>(Arc::new(GenreTable::new(labels)))
            })
            .await;

        match result {
            Ok(table) => table.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Genre table load failed, passing codes through");
                Arc::new(GenreTable::default())
            }
        }
    }

    pub async fn decode(&self, input: &GenreInput) -> Vec<String> {
        self.table().await.decode(input)
    }
}
