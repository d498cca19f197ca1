//! HTTP client for the remote-desktop streaming service.
//!
//! Covers the four endpoints the client talks to: the login page URL, the
//! first-party token exchange, the computer directory, and connect.

pub mod rest;
pub mod types;

pub use rest::ServiceClient;
pub use types::{ConnectRequest, ConnectResponse, RoomOptions, TokenResponse};
