//! User actions, as raised by the page's controls.

use dvxr_common::error::DvResult;
use dvxr_session::Orchestrator;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RequestCode,
    ExchangeToken,
    FetchComputers,
    ConnectSelected,
    /// A computer affordance in the directory panel was picked.
    Connect { computer_id: String },
    EnterXr,
    ShowTestSurface,
    RemoveSurface,
    Disconnect,
}

impl Action {
    /// Map a button element id to its action.
    pub fn from_element_id(id: &str) -> Option<Self> {
        Some(match id {
            "dv-auth-code" => Self::RequestCode,
            "dv-auth-token" => Self::ExchangeToken,
            "dv-fetch-computers" => Self::FetchComputers,
            "dv-connect-computer" => Self::ConnectSelected,
            "enter-scene-button" => Self::EnterXr,
            "computer-test-button" => Self::ShowTestSurface,
            "computer-remove-button" => Self::RemoveSurface,
            _ => return None,
        })
    }

    pub fn apply(self, orchestrator: &mut Orchestrator) -> DvResult<()> {
        match self {
            Self::RequestCode => orchestrator.request_authorization_code(),
            Self::ExchangeToken => orchestrator.exchange_token(),
            Self::FetchComputers => orchestrator.fetch_computers(),
            Self::ConnectSelected => orchestrator.connect_selected(),
            Self::Connect { computer_id } => orchestrator.connect(&computer_id).map(|_| ()),
            Self::EnterXr => {
                orchestrator.enter_xr();
                Ok(())
            }
            Self::ShowTestSurface => {
                orchestrator.show_test_surface();
                Ok(())
            }
            Self::RemoveSurface => {
                orchestrator.remove_surface();
                Ok(())
            }
            Self::Disconnect => {
                orchestrator.disconnect();
                Ok(())
            }
        }
    }
}
