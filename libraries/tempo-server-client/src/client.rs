//! Main Tempo API client.

use crate::error::{Result, ServerClientError};
use crate::types::{FavoriteRequest, MessageResponse, ServerConfig, TrackResponse};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{Track, TrackId, TrackProvider};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Client for a Tempo server.
///
/// Cloning is cheap and shares the HTTP connection pool and the token.
///
/// # Example
///
/// ```ignore
/// use tempo_server_client::{ServerConfig, TempoServerClient};
///
/// let client = TempoServerClient::new(ServerConfig::with_token("http://localhost:8000/api", "token"))?;
/// let tracks = client.get_tracks().await?;
/// println!("Found {} tracks", tracks.len());
/// ```
#[derive(Clone)]
pub struct TempoServerClient {
    http: Client,
    base: Url,
    config: Arc<ServerConfig>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl TempoServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base = Url::parse(config.url.trim())
            .map_err(|e| ServerClientError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(format!("Tempo/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let access_token = config.access_token.clone();
        Ok(Self {
            http,
            base,
            config: Arc::new(config),
            access_token: Arc::new(RwLock::new(access_token)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Replace the bearer token (`None` to log out).
    pub async fn set_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Build an endpoint URL under the base.
    ///
    /// Each `/`-separated part of `path` becomes a percent-encoded segment;
    /// `{key}` inside a part is replaced by `key`.
    pub fn endpoint(&self, path: &str, key: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ServerClientError::InvalidUrl(self.base.to_string()))?;
            segments.pop_if_empty();
            for part in path.split('/').filter(|part| !part.is_empty()) {
                match key {
                    Some(key) => segments.push(&part.replace("{key}", key)),
                    None => segments.push(part),
                };
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.access_token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and turn non-2xx statuses into errors.
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ServerClientError::ServerUnreachable(e.to_string())
            } else {
                ServerClientError::Request(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if matches!(status.as_u16(), 401 | 403) {
            warn!(status = status.as_u16(), "Server rejected credentials");
            return Err(ServerClientError::AuthRequired);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageResponse>(&error_text)
            .map(|body| body.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or(error_text);
        Err(ServerClientError::ServerError {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_track_list(&self, path: &str) -> Result<Vec<Track>> {
        let url = self.endpoint(path, None)?;
        debug!(url = %url, "Fetching track list");

        let response = self.send(self.request(Method::GET, url).await).await?;
        let tracks: Vec<TrackResponse> = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse {} response: {}", path, e))
        })?;

        debug!(path, count = tracks.len(), "Fetched track list");
        Ok(tracks.into_iter().map(Track::from).collect())
    }

    /// `GET /tracks`
    pub async fn get_tracks(&self) -> Result<Vec<Track>> {
        self.fetch_track_list("tracks").await
    }

    /// `GET /favorites`
    pub async fn get_favorites(&self) -> Result<Vec<Track>> {
        self.fetch_track_list("favorites").await
    }

    async fn change_favorite(&self, method: Method, id: &TrackId) -> Result<MessageResponse> {
        let url = self.endpoint("favorites", None)?;
        let request = self
            .request(method.clone(), url)
            .await
            .json(&FavoriteRequest::new(id));
        let response = self.send(request).await?;

        let reply = response.json::<MessageResponse>().await.unwrap_or_default();
        info!(track_id = %id, %method, message = %reply.message, "Favorites updated");
        Ok(reply)
    }

    /// `POST /favorites`
    pub async fn add_favorite(&self, id: &TrackId) -> Result<MessageResponse> {
        self.change_favorite(Method::POST, id).await
    }

    /// `DELETE /favorites`
    pub async fn remove_favorite(&self, id: &TrackId) -> Result<MessageResponse> {
        self.change_favorite(Method::DELETE, id).await
    }

    /// Add or remove depending on the current flag
    pub async fn toggle_favorite(&self, id: &TrackId, is_favorite: bool) -> Result<MessageResponse> {
        if is_favorite {
            self.remove_favorite(id).await
        } else {
            self.add_favorite(id).await
        }
    }

    /// Download a resource as raw bytes.
    pub async fn fetch_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let response = self.send(self.request(Method::GET, url).await).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download a resource as text.
    pub async fn fetch_text(&self, url: Url) -> Result<String> {
        let response = self.send(self.request(Method::GET, url).await).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl TrackProvider for TempoServerClient {
    async fn get_tracks(&self) -> tempo_core::Result<Vec<Track>> {
        Ok(TempoServerClient::get_tracks(self).await?)
    }

    async fn get_favorites(&self) -> tempo_core::Result<Vec<Track>> {
        Ok(TempoServerClient::get_favorites(self).await?)
    }
}
