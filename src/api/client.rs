//! MusicReco backend HTTP client
//!
//! One client serves every collaborator seam: recommendation, auth and
//! playlists, the video lookup proxy and the static assets. Each call carries
//! a fresh `x-request-id` and runs inside a tracing span tagged with it.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::{
    api::{
        request_id::{make_span_with_request_id, RequestId, REQUEST_ID_HEADER},
        routes,
    },
    config::Config,
    error::{AppError, AppResult},
    models::{
        AuthToken, LoginRequest, NewPlaylist, PlaylistId, RawSong, RecommendResponse,
        RecommendationItem, RenamePlaylist, SavedPlaylist, SeedRecommendRequest, SignupRequest,
        SongId, SongsResponse, TagRecommendRequest, TokenResponse, UserInfo, VideoLookupResponse,
    },
    services::providers::{
        AccountProvider, AssetProvider, RecommendationProvider, VideoProvider,
    },
};

#[derive(Clone)]
pub struct MusicRecoClient {
    http_client: HttpClient,
    api_url: String,
    assets_url: String,
}

impl MusicRecoClient {
    /// Creates a client from configuration
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            assets_url: config.assets_base().to_string(),
        })
    }

    /// Creates a client with default HTTP settings
    pub fn with_urls(api_url: impl Into<String>, assets_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.into(),
            assets_url: assets_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(
        &self,
        method: Method,
        base: &str,
        path: &str,
        token: Option<&AuthToken>,
        request_id: &RequestId,
    ) -> RequestBuilder {
        let mut builder = self
            .http_client
            .request(method, routes::join(base, path))
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(token) = token {
            builder = builder.header(reqwest::header::AUTHORIZATION, token.bearer());
        }
        builder
    }

    /// Sends a request and decodes a JSON response body
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&AuthToken>,
        configure: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> AppResult<T> {
        let request_id = RequestId::new();
        let span = make_span_with_request_id(&method, path, &request_id);

        async move {
            let builder = configure(self.request(method, &self.api_url, path, token, &request_id));
            let response = Self::check(builder.send().await?, path).await?;

            let text = response.text().await?;
            tracing::debug!(bytes = text.len(), "Backend response received");

            serde_json::from_str(&text).map_err(|e| {
                tracing::error!(error = %e, response = %text, "Failed to deserialize backend response");
                AppError::ExternalApi(format!("Failed to parse backend response: {}", e))
            })
        }
        .instrument(span)
        .await
    }

    /// Maps non-success statuses onto the error taxonomy
    async fn check(response: Response, path: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, path = %path, "Backend request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(body),
            StatusCode::NOT_FOUND => AppError::NotFound(path.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::InvalidInput(extract_detail(&body))
            }
            _ => AppError::ExternalApi(format!("Backend returned status {}: {}", status, body)),
        })
    }
}

/// Pulls the `detail` message out of an error body, falling back to the raw text
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait::async_trait]
impl RecommendationProvider for MusicRecoClient {
    async fn recommend_by_tags(
        &self,
        tags: &[String],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let body = TagRecommendRequest {
            tags: tags.to_vec(),
            k,
            exclude: exclude.to_vec(),
        };
        let response: RecommendResponse = self
            .send_json(Method::POST, routes::RECOMMEND_BY_TAGS, None, |b| b.json(&body))
            .await?;

        tracing::info!(tags = tags.len(), results = response.items.len(), "Tag recommendation completed");
        Ok(response.items)
    }

    async fn recommend_by_dae(
        &self,
        seed_song_ids: &[SongId],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>> {
        if seed_song_ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = SeedRecommendRequest {
            seed_song_ids: seed_song_ids.to_vec(),
            k,
            exclude: exclude.to_vec(),
        };
        let response: RecommendResponse = self
            .send_json(Method::POST, routes::RECOMMEND_BY_DAE, None, |b| b.json(&body))
            .await?;

        tracing::info!(
            seeds = seed_song_ids.len(),
            results = response.items.len(),
            "DAE recommendation completed"
        );
        Ok(response.items)
    }

    async fn recommend_by_songs(
        &self,
        seed_song_ids: &[SongId],
        k: usize,
        exclude: &[SongId],
    ) -> AppResult<Vec<RecommendationItem>> {
        if seed_song_ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = SeedRecommendRequest {
            seed_song_ids: seed_song_ids.to_vec(),
            k,
            exclude: exclude.to_vec(),
        };
        let response: RecommendResponse = self
            .send_json(Method::POST, routes::RECOMMEND_BY_SONGS, None, |b| b.json(&body))
            .await?;

        tracing::debug!(
            seeds = seed_song_ids.len(),
            results = response.items.len(),
            "Song similarity recommendation completed"
        );
        Ok(response.items)
    }

    async fn search_songs(&self, query: &str, limit: usize) -> AppResult<Vec<RawSong>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit.to_string();
        let response: SongsResponse = self
            .send_json(Method::GET, routes::SONG_SEARCH, None, |b| {
                b.query(&[("q", query), ("limit", limit.as_str())])
            })
            .await?;

        tracing::info!(query = %query, results = response.songs.len(), "Song search completed");
        Ok(response.songs)
    }
}

#[async_trait::async_trait]
impl AccountProvider for MusicRecoClient {
    async fn signup(&self, request: &SignupRequest) -> AppResult<AuthToken> {
        let response: TokenResponse = self
            .send_json(Method::POST, routes::SIGNUP, None, |b| b.json(request))
            .await?;
        Ok(response.into())
    }

    async fn login(&self, request: &LoginRequest) -> AppResult<AuthToken> {
        let response: TokenResponse = self
            .send_json(Method::POST, routes::LOGIN, None, |b| b.json(request))
            .await?;
        Ok(response.into())
    }

    async fn me(&self, token: &AuthToken) -> AppResult<UserInfo> {
        self.send_json(Method::GET, routes::ME, Some(token), |b| b)
            .await
    }

    async fn create_playlist(
        &self,
        token: &AuthToken,
        playlist: &NewPlaylist,
    ) -> AppResult<SavedPlaylist> {
        let saved: SavedPlaylist = self
            .send_json(Method::POST, routes::PLAYLISTS, Some(token), |b| b.json(playlist))
            .await?;

        tracing::debug!(playlist_id = saved.id, "Playlist created");
        Ok(saved)
    }

    async fn list_playlists(&self, token: &AuthToken) -> AppResult<Vec<SavedPlaylist>> {
        self.send_json(Method::GET, routes::PLAYLISTS, Some(token), |b| b)
            .await
    }

    async fn get_playlist(&self, token: &AuthToken, id: PlaylistId) -> AppResult<SavedPlaylist> {
        self.send_json(Method::GET, &routes::playlist(id), Some(token), |b| b)
            .await
    }

    async fn rename_playlist(
        &self,
        token: &AuthToken,
        id: PlaylistId,
        title: &str,
    ) -> AppResult<SavedPlaylist> {
        let body = RenamePlaylist {
            title: title.to_string(),
        };
        self.send_json(Method::PATCH, &routes::playlist_title(id), Some(token), |b| {
            b.json(&body)
        })
        .await
    }

    async fn delete_playlist(&self, token: &AuthToken, id: PlaylistId) -> AppResult<()> {
        let _: serde_json::Value = self
            .send_json(Method::DELETE, &routes::playlist(id), Some(token), |b| b)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl VideoProvider for MusicRecoClient {
    async fn find_video(&self, query: &str) -> AppResult<Option<String>> {
        let response: VideoLookupResponse = self
            .send_json(Method::GET, routes::VIDEO_SEARCH, None, |b| {
                b.query(&[("q", query)])
            })
            .await?;
        Ok(response.video_id.filter(|id| !id.is_empty()))
    }
}

#[async_trait::async_trait]
impl AssetProvider for MusicRecoClient {
    async fn fetch_text(&self, path: &str) -> AppResult<String> {
        let request_id = RequestId::new();
        let span = make_span_with_request_id(&Method::GET, path, &request_id);

        async move {
            let response = self
                .request(Method::GET, &self.assets_url, path, None, &request_id)
                .send()
                .await?;
            let text = Self::check(response, path).await?.text().await?;
            tracing::debug!(bytes = text.len(), "Asset fetched");
            Ok(text)
        }
        .instrument(span)
        .await
    }

    async fn fetch_genre_map(&self) -> AppResult<HashMap<String, String>> {
        let text = self.fetch_text(routes::GENRE_MAP_JSON).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> MusicRecoClient {
        // Nothing listens here; the tests below never reach the network
        MusicRecoClient::with_urls("http://127.0.0.1:9", "http://127.0.0.1:9")
    }

    #[test]
    fn test_extract_detail_from_json_body() {
        assert_eq!(
            extract_detail(r#"{"detail": "Email already registered"}"#),
            "Email already registered"
        );
    }

    #[test]
    fn test_extract_detail_falls_back_to_raw_body() {
        assert_eq!(extract_detail("plain failure"), "plain failure");
    }

    #[test]
    fn test_new_uses_assets_fallback() {
        let config = Config {
            api_url: "http://api.test".to_string(),
            ..Config::default()
        };
        let client = MusicRecoClient::new(&config).unwrap();
        assert_eq!(client.api_url(), "http://api.test");
        assert_eq!(client.assets_url, "http://api.test");
    }

    #[tokio::test]
    async fn test_empty_tags_short_circuit() {
        let client = create_test_client();
        let items = client.recommend_by_tags(&[], 20, &[]).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_empty_seeds_short_circuit() {
        let client = create_test_client();
        assert!(client.recommend_by_dae(&[], 20, &[1]).await.unwrap().is_empty());
        assert!(client.recommend_by_songs(&[], 5, &[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_search_short_circuit() {
        let client = create_test_client();
        assert!(client.search_songs("   ", 20).await.unwrap().is_empty());
    }
}
