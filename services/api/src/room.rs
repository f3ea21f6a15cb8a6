//! Room Service Client
//!
//! Creates the real-time rooms that practice sessions take place in and issues the
//! access tokens workers use to join them. The concrete service is Daily's REST API;
//! everything else in the crate depends only on the [`RoomService`] trait.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

/// Failures while acquiring a room or its credential.
#[derive(Debug, thiserror::Error)]
pub enum RoomServiceError {
    #[error("Room service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Room service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Room service returned an empty room URL")]
    EmptyRoomUrl,
    #[error("Room service returned an empty token for room: {0}")]
    EmptyToken(String),
}

/// Defines the contract for any service that can provision rooms.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Creates a new room and returns its address.
    async fn create_room(&self) -> Result<String, RoomServiceError>;

    /// Issues an access token for the room at `room_url`.
    async fn get_token(&self, room_url: &str) -> Result<String, RoomServiceError>;
}

/// Creates a room and a token for it, rejecting empty values from either call.
pub async fn create_room_and_token(
    rooms: &dyn RoomService,
) -> Result<(String, String), RoomServiceError> {
    let room_url = rooms.create_room().await?;
    if room_url.is_empty() {
        return Err(RoomServiceError::EmptyRoomUrl);
    }

    let token = rooms.get_token(&room_url).await?;
    if token.is_empty() {
        return Err(RoomServiceError::EmptyToken(room_url));
    }

    Ok((room_url, token))
}

#[derive(Deserialize)]
struct RoomResponse {
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

/// A [`RoomService`] backed by the Daily REST API.
pub struct DailyRoomService {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    expiry_secs: u64,
}

impl DailyRoomService {
    /// Creates a new Daily client.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the REST API, without a trailing slash.
    /// * `api_key` - Bearer credential for the account.
    /// * `expiry_secs` - Lifetime of created rooms and issued tokens.
    pub fn new(api_url: String, api_key: String, expiry_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            expiry_secs,
        }
    }

    fn expires_at(&self) -> i64 {
        Utc::now().timestamp() + self.expiry_secs as i64
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, RoomServiceError> {
        let response = self
            .client
            .post(format!("{}/{}", self.api_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoomServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Extracts the room name Daily expects from a room URL.
pub fn room_name(room_url: &str) -> &str {
    room_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(room_url)
}

#[async_trait]
impl RoomService for DailyRoomService {
    #[instrument(skip(self))]
    async fn create_room(&self) -> Result<String, RoomServiceError> {
        let body = json!({
            "properties": {
                "exp": self.expires_at(),
                "eject_at_room_exp": true,
            }
        });
        let room: RoomResponse = self.post("rooms", body).await?;
        debug!(room_url = %room.url, "Room created");
        Ok(room.url)
    }

    #[instrument(skip(self))]
    async fn get_token(&self, room_url: &str) -> Result<String, RoomServiceError> {
        let body = json!({
            "properties": {
                "room_name": room_name(room_url),
                "is_owner": true,
                "exp": self.expires_at(),
            }
        });
        let token: TokenResponse = self.post("meeting-tokens", body).await?;
        Ok(token.token)
    }
}
