//! Wire types for the service endpoints (field names match the service).

use dvxr_common::models::AccessToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /desktop-vision-auth?code=...`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: AccessToken,
}

/// Body sent to `POST /api/connect`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest<'a> {
    pub channel_name: &'a str,
}

/// Reply from `POST /api/connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    #[serde(rename = "roomOptions")]
    pub room_options: RoomOptions,
}

/// Transport parameters for one room. Opaque to the client; handed to the
/// streaming transport unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomOptions(pub Value);

impl RoomOptions {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
