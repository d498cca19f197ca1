//! Completions of async work, applied to orchestrator state on its owner's thread.

use dvxr_common::error::DvResult;
use dvxr_common::models::{AccessToken, AuthorizationGrant};

use crate::connection::SessionEvent;
use crate::directory::ComputerListing;
use crate::platform::XrSession;

/// Everything a spawned task can report back.
pub enum OrchestratorEvent {
    /// A popup handshake finished, or was superseded.
    GrantReceived(DvResult<AuthorizationGrant>),
    TokenExchanged(DvResult<AccessToken>),
    ComputersListed {
        /// Id from [`ListingTracker::begin`](crate::directory::ListingTracker::begin).
        request: u64,
        listing: ComputerListing,
    },
    Session(SessionEvent),
    XrSessionStarted(DvResult<XrSession>),
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GrantReceived(_) => "grant_received",
            Self::TokenExchanged(_) => "token_exchanged",
            Self::ComputersListed { .. } => "computers_listed",
            Self::Session(_) => "session",
            Self::XrSessionStarted(_) => "xr_session_started",
        }
    }
}
