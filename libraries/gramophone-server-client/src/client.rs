//! Playback reporting client.

use crate::error::{Result, ServerClientError};
use crate::types::ServerConfig;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gramophone_core::types::{PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo};
use gramophone_core::{PlaybackReporter, TrackId};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "X-Emby-Token";

/// Client for the playback session endpoints of a media server.
///
/// Reports are plain JSON posts; the server answers `204 No Content`.
///
/// # Example
///
/// ```ignore
/// use gramophone_server_client::{MediaServerClient, ServerConfig};
///
/// let config = ServerConfig::with_credentials("https://media.example.com", "token", "user-id");
/// let client = MediaServerClient::new(config)?;
/// client.mark_item_played(&"item".into(), chrono::Utc::now()).await?;
/// ```
pub struct MediaServerClient {
    http: Client,
    base: Url,
    config: ServerConfig,
}

impl MediaServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base =
            Url::parse(&config.url).map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        if base.cannot_be_a_base() {
            return Err(ServerClientError::InvalidUrl(config.url.clone()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!(
                "Gramophone/{} ({})",
                env!("CARGO_PKG_VERSION"),
                config.device_name
            ))
            .build()?;

        Ok(Self { http, base, config })
    }

    /// Get the server URL.
    pub fn url(&self) -> &str {
        self.base.as_str()
    }

    /// Check if the client has an access token.
    pub fn is_authenticated(&self) -> bool {
        self.config.access_token.is_some()
    }

    /// Report that an item started playing.
    pub async fn report_start(&self, info: &PlaybackStartInfo) -> Result<()> {
        let url = self.endpoint(&["Sessions", "Playing"])?;
        self.post(url, Some(info)).await
    }

    /// Report the position of the playing item.
    pub async fn report_progress(&self, info: &PlaybackProgressInfo) -> Result<()> {
        let url = self.endpoint(&["Sessions", "Playing", "Progress"])?;
        self.post(url, Some(info)).await
    }

    /// Report that the item stopped.
    pub async fn report_stopped(&self, info: &PlaybackStopInfo) -> Result<()> {
        let url = self.endpoint(&["Sessions", "Playing", "Stopped"])?;
        self.post(url, Some(info)).await
    }

    /// Mark an item as played by the configured user.
    pub async fn mark_item_played(&self, item: &TrackId, played_at: DateTime<Utc>) -> Result<()> {
        let user = self
            .config
            .user_id
            .as_deref()
            .ok_or(ServerClientError::AuthRequired)?;
        self.mark_played_for(item, user, played_at).await
    }

    async fn mark_played_for(
        &self,
        item: &TrackId,
        user: &str,
        played_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut url = self.endpoint(&["Users", user, "PlayedItems", item.as_str()])?;
        url.query_pairs_mut().append_pair(
            "DatePlayed",
            &played_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.post::<()>(url, None).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl(self.config.url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: Url, body: Option<&T>) -> Result<()> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or(ServerClientError::AuthRequired)?;

        debug!(url = %url, "Posting playback report");

        let mut request = self.http.post(url).header(TOKEN_HEADER, token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ServerClientError::ServerUnreachable(e.to_string())
            } else {
                ServerClientError::Request(e)
            }
        })?;

        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        Ok(())
    } else if status == reqwest::StatusCode::UNAUTHORIZED {
        Err(ServerClientError::AuthRequired)
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ServerClientError::ServerError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PlaybackReporter for MediaServerClient {
    fn user_id(&self) -> Option<String> {
        self.config.user_id.clone()
    }

    async fn report_playback_start(&self, info: &PlaybackStartInfo) -> gramophone_core::Result<()> {
        Ok(self.report_start(info).await?)
    }

    async fn report_playback_progress(
        &self,
        info: &PlaybackProgressInfo,
    ) -> gramophone_core::Result<()> {
        Ok(self.report_progress(info).await?)
    }

    async fn report_playback_stopped(
        &self,
        info: &PlaybackStopInfo,
    ) -> gramophone_core::Result<()> {
        Ok(self.report_stopped(info).await?)
    }

    async fn mark_played(
        &self,
        track_id: &TrackId,
        user_id: &str,
        played_at: DateTime<Utc>,
    ) -> gramophone_core::Result<()> {
        Ok(self.mark_played_for(track_id, user_id, played_at).await?)
    }
}
