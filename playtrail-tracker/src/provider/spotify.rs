//! Spotify Web API client
//!
//! Authenticates with the refresh-token grant: the listener completes the
//! authorization-code flow once, and the resulting refresh token is configured
//! here. Access tokens are cached until shortly before they expire.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{PlaybackProvider, RawPlayback};
use crate::error::ProviderError;

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const USER_AGENT: &str = concat!("playtrail/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the provider-reported expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Spotify application credentials plus the listener's refresh token
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    /// Spotify may rotate the refresh token
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    queue: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
struct QueueItem {
    #[serde(default)]
    id: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

struct TokenState {
    refresh_token: String,
    access: Option<AccessToken>,
}

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    token: Mutex<TokenState>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Result<Self, ProviderError> {
        Self::with_endpoints(credentials, API_BASE_URL, TOKEN_URL)
    }

    /// Client against non-default endpoints
    pub fn with_endpoints(
        credentials: SpotifyCredentials,
        api_base: &str,
        token_url: &str,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(Self {
            http_client,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            api_base: api_base.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            token: Mutex::new(TokenState {
                refresh_token: credentials.refresh_token,
                access: None,
            }),
        })
    }

    /// Valid access token, refreshing it if needed
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut state = self.token.lock().await;

        if let Some(token) = &state.access {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Refreshing Spotify access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                Some(status.as_u16()),
                format!("token refresh failed: {}", body),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("invalid token response: {}", e)))?;

        if let Some(rotated) = token.refresh_token {
            tracing::info!("Spotify rotated the refresh token");
            state.refresh_token = rotated;
        }

        let value = token.access_token.clone();
        state.access = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(value)
    }

    /// Drop a token the API rejected so the next call refreshes it
    async fn invalidate_token(&self) {
        self.token.lock().await.access = None;
    }

    /// Turn a non-success response into a [`ProviderError`]
    async fn error_from(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let body = response.text().await.unwrap_or_default();
        ProviderError::new(Some(status.as_u16()), body)
    }
}

/// Spotify URI for a bare track id
pub fn track_uri(track_id: &str) -> String {
    if track_id.starts_with("spotify:") {
        track_id.to_string()
    } else {
        format!("spotify:track:{}", track_id)
    }
}

#[async_trait]
impl PlaybackProvider for SpotifyClient {
    async fn current_playback(&self) -> Result<Option<RawPlayback>, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/me/player/currently-playing", self.api_base);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        // No active device or session
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let playback: RawPlayback = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("invalid playback response: {}", e)))?;

        Ok(Some(playback))
    }

    async fn upcoming_queue(&self) -> Result<Vec<String>, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/me/player/queue", self.api_base);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let queue: QueueResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("invalid queue response: {}", e)))?;

        Ok(queue.queue.into_iter().filter_map(|item| item.id).collect())
    }

    async fn enqueue(&self, track_id: &str) -> Result<(), ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/me/player/queue", self.api_base);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .query(&[("uri", track_uri(track_id))])
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        tracing::info!(track_id = %track_id, "Requested enqueue");
        Ok(())
    }
}
