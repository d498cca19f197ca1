//! UI state projection: which actions are currently possible.

use dvxr_common::error::DvError;
use dvxr_common::models::AuthState;
use serde::Serialize;

/// Enabled flags for the action buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ButtonState {
    pub request_code: bool,
    pub exchange_token: bool,
    pub fetch_computers: bool,
    pub connect_selected: bool,
}

impl ButtonState {
    pub fn project(auth: &AuthState) -> Self {
        Self {
            request_code: !auth.has_code(),
            exchange_token: auth.has_code(),
            fetch_computers: auth.has_token(),
            connect_selected: auth.ready_to_connect(),
        }
    }
}

/// One selectable entry in the computer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affordance {
    pub computer_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// A status line message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: String,
    pub message: String,
}

impl Notice {
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, code: code.to_owned(), message: message.into() }
    }

    pub fn from_error(err: &DvError) -> Self {
        let hint = if err.is_retryable() { " Please try again." } else { "" };
        Self {
            level: NoticeLevel::Warning,
            code: err.error_code().to_owned(),
            message: format!("{err}.{hint}"),
        }
    }
}
