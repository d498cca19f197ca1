//! Authentication state: authorization code, access token, and the computer
//! picked during the login handshake.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::string_or_number;

/// Access token returned by the first-party exchange endpoint.
///
/// Only `uid` and `access_token` are interpreted; anything else the backend
/// sends is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Subject the token was issued for; used in directory paths.
    #[serde(deserialize_with = "string_or_number")]
    pub uid: String,
    pub access_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessToken {
    pub fn new(uid: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            access_token: access_token.into(),
            extra: Map::new(),
        }
    }
}

/// Result of one completed login handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub computer_id: Option<String>,
}

/// Everything the client knows about the user's credentials.
///
/// `selected_computer_id` may be set before a token exists (deep link);
/// connecting needs both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub authorization_code: Option<String>,
    pub access_token: Option<AccessToken>,
    pub selected_computer_id: Option<String>,
}

impl AuthState {
    /// A code is waiting to be exchanged.
    pub fn has_code(&self) -> bool {
        self.authorization_code.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Token and target computer are both known.
    pub fn ready_to_connect(&self) -> bool {
        self.has_token() && self.selected_computer_id.is_some()
    }

    /// Store a completed handshake. Overwrites any code or selection that
    /// came in through the URL.
    pub fn apply_grant(&mut self, grant: AuthorizationGrant) {
        self.authorization_code = Some(grant.code);
        if grant.computer_id.is_some() {
            self.selected_computer_id = grant.computer_id;
        }
    }
}
