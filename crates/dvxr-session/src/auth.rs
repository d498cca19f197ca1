//! Authorization code handshake and token exchange.
//!
//! Two ways in:
//! - **Popup**: the login page runs in a new context and posts
//!   `{ code, computerId }` back. Each attempt is a one-shot [`PendingGrant`]
//!   that resolves exactly once; starting a new attempt closes the old popup
//!   and resolves the old grant with [`DvError::Superseded`].
//! - **Redirect**: the page navigates away and comes back with `code` and
//!   `computer_id` in the query string, picked up by [`resume_from_url`].
//!
//! After every exchange attempt the code is cleared and scrubbed from the
//! address bar, whether the exchange worked or not.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use dvxr_api::ServiceClient;
use dvxr_common::config::{AuthConfig, AuthMethod};
use dvxr_common::error::{DvError, DvResult};
use dvxr_common::models::ids::opt_string_or_number;
use dvxr_common::models::{AccessToken, AuthState, AuthorizationGrant};
use serde::Deserialize;
use tokio::sync::oneshot;
use url::Url;

use crate::platform::{AuthLauncher, AuthWindow, Location};

/// Query parameters that carry handshake state and must not outlive it.
pub const HANDSHAKE_PARAMS: [&str; 3] = ["oauth", "code", "computer_id"];

/// Read a resumed handshake out of the page URL.
pub fn resume_from_url(url: &Url) -> AuthState {
    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };
    AuthState {
        authorization_code: param("code"),
        access_token: None,
        selected_computer_id: param("computer_id"),
    }
}

/// `url` without any handshake parameters. Other parameters keep their order.
pub fn scrub_url(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !HANDSHAKE_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut scrubbed = url.clone();
    if kept.is_empty() {
        scrubbed.set_query(None);
    } else {
        scrubbed.query_pairs_mut().clear().extend_pairs(kept);
    }
    scrubbed
}

/// Message posted back by the login popup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupMessage {
    pub code: Option<String>,
    /// Same id space as the directory, so numbers are accepted too.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub computer_id: Option<String>,
}

struct PendingHandshake {
    attempt: u64,
    window: Box<dyn AuthWindow>,
    reply: oneshot::Sender<AuthorizationGrant>,
}

/// Where popup messages are delivered. Cloned into the host's message listener.
#[derive(Clone, Default)]
pub struct HandshakeSlot {
    inner: Arc<Mutex<Option<PendingHandshake>>>,
}

impl HandshakeSlot {
    fn lock(&self) -> MutexGuard<'_, Option<PendingHandshake>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, pending: PendingHandshake) -> Option<PendingHandshake> {
        self.lock().replace(pending)
    }

    fn cancel(&self) {
        if let Some(mut pending) = self.lock().take() {
            pending.window.close();
            tracing::debug!(attempt = pending.attempt, "Authorization handshake cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Complete the pending handshake if `message` carries both a code and
    /// a computer id. Returns whether it did.
    pub fn deliver(&self, message: &PopupMessage) -> bool {
        let (Some(code), Some(computer_id)) = (&message.code, &message.computer_id) else {
            tracing::debug!("Ignoring incomplete popup message");
            return false;
        };
        let Some(mut pending) = self.lock().take() else {
            tracing::debug!("Popup message without a pending handshake");
            return false;
        };

        pending.window.close();
        let grant = AuthorizationGrant {
            code: code.clone(),
            computer_id: Some(computer_id.clone()),
        };
        if pending.reply.send(grant).is_err() {
            tracing::warn!(attempt = pending.attempt, "Authorization grant arrived after its waiter left");
        } else {
            tracing::info!(attempt = pending.attempt, "Authorization handshake completed");
        }
        true
    }

    /// [`HandshakeSlot::deliver`] for a raw message payload.
    pub fn deliver_json(&self, data: &serde_json::Value) -> bool {
        match serde_json::from_value::<PopupMessage>(data.clone()) {
            Ok(message) => self.deliver(&message),
            Err(e) => {
                tracing::debug!("Ignoring foreign window message: {e}");
                false
            }
        }
    }
}

/// One popup authorization attempt, resolved exactly once.
pub struct PendingGrant {
    attempt: u64,
    rx: oneshot::Receiver<AuthorizationGrant>,
}

impl PendingGrant {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

impl Future for PendingGrant {
    type Output = DvResult<AuthorizationGrant>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| DvError::Superseded))
    }
}

pub enum AuthorizationRequest {
    Popup(PendingGrant),
    /// The page is navigating away; the code comes back on the next load.
    Redirect,
}

pub struct AuthController {
    config: AuthConfig,
    attempts: u64,
    handshake: HandshakeSlot,
}

impl AuthController {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            attempts: 0,
            handshake: HandshakeSlot::default(),
        }
    }

    pub fn handshake(&self) -> HandshakeSlot {
        self.handshake.clone()
    }

    /// Send the user to the login page.
    pub fn request_authorization_code(
        &mut self,
        api: &ServiceClient,
        launcher: &mut dyn AuthLauncher,
        current: &Url,
    ) -> DvResult<AuthorizationRequest> {
        let url = api.authorization_url(&self.config, &scrub_url(current))?;

        match self.config.method {
            AuthMethod::Popup => {
                let window = launcher.open_popup(&url)?;
                self.attempts += 1;
                let attempt = self.attempts;
                let (reply, rx) = oneshot::channel();

                if let Some(mut previous) =
                    self.handshake.install(PendingHandshake { attempt, window, reply })
                {
                    previous.window.close();
                    tracing::debug!(previous = previous.attempt, attempt, "Authorization attempt superseded");
                }
                tracing::info!(attempt, "Authorization popup opened");
                Ok(AuthorizationRequest::Popup(PendingGrant { attempt, rx }))
            }
            AuthMethod::Redirect => {
                self.handshake.cancel();
                tracing::info!("Redirecting to authorization page");
                launcher.navigate(&url);
                Ok(AuthorizationRequest::Redirect)
            }
        }
    }

    /// Record the outcome of an exchange attempt.
    ///
    /// Clears the code and scrubs the URL in every case; the token is only
    /// touched on success.
    pub fn finish_exchange(
        state: &mut AuthState,
        location: &mut dyn Location,
        outcome: DvResult<AccessToken>,
    ) -> DvResult<()> {
        let result = match outcome {
            Ok(token) => {
                tracing::info!(uid = %token.uid, "Access token acquired");
                state.access_token = Some(token);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(code = e.error_code(), "Token exchange failed: {e}");
                Err(e)
            }
        };

        state.authorization_code = None;
        location.replace_state(scrub_url(&location.href()));
        result
    }
}

/// Trade `code` for an access token.
pub async fn exchange_code_for_token(api: &ServiceClient, code: &str) -> DvResult<AccessToken> {
    api.exchange_code(code).await.map_err(DvError::auth)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{FakeLauncher, FakeLocation, PlatformLog};

    fn api() -> ServiceClient {
        ServiceClient::new("https://desktop.vision", "http://localhost:3000", Duration::from_secs(1)).unwrap()
    }

    fn page() -> Url {
        Url::parse("https://app.example/xr?theme=dark").unwrap()
    }

    #[test]
    fn resume_reads_code_and_computer() {
        let url = Url::parse("https://app.example/?oauth=desktopvision&code=abc&computer_id=42").unwrap();
        let state = resume_from_url(&url);
        assert_eq!(state.authorization_code.as_deref(), Some("abc"));
        assert_eq!(state.selected_computer_id.as_deref(), Some("42"));
        assert!(state.access_token.is_none());
    }

    #[test]
    fn scrub_keeps_unrelated_parameters() {
        let url = Url::parse("https://app.example/xr?theme=dark&code=abc&oauth=dv&computer_id=42&lang=en").unwrap();
        assert_eq!(scrub_url(&url).as_str(), "https://app.example/xr?theme=dark&lang=en");

        let only = Url::parse("https://app.example/xr?code=abc").unwrap();
        assert_eq!(scrub_url(&only).as_str(), "https://app.example/xr");
    }

    #[tokio::test]
    async fn popup_message_resolves_grant_and_closes_window() {
        let log = PlatformLog::default();
        let mut launcher = FakeLauncher::new(log.clone());
        let mut auth = AuthController::new(AuthConfig::default());
        let slot = auth.handshake();

        let AuthorizationRequest::Popup(grant) =
            auth.request_authorization_code(&api(), &mut launcher, &page()).unwrap()
        else {
            panic!("expected popup");
        };

        assert!(!slot.deliver(&PopupMessage { code: Some("abc".into()), computer_id: None }));
        assert!(slot.is_pending());
        assert!(slot.deliver_json(&serde_json::json!({ "code": "abc", "computerId": "42" })));

        let grant = grant.await.unwrap();
        assert_eq!(grant, AuthorizationGrant { code: "abc".into(), computer_id: Some("42".into()) });
        assert_eq!(log.closed_windows(), vec![true]);
        assert!(!slot.is_pending());
    }

    #[tokio::test]
    async fn numeric_computer_id_completes_the_handshake() {
        let log = PlatformLog::default();
        let mut launcher = FakeLauncher::new(log.clone());
        let mut auth = AuthController::new(AuthConfig::default());
        let slot = auth.handshake();

        let AuthorizationRequest::Popup(grant) =
            auth.request_authorization_code(&api(), &mut launcher, &page()).unwrap()
        else {
            panic!("expected popup");
        };

        assert!(slot.deliver_json(&serde_json::json!({ "code": "abc", "computerId": 42 })));

        let grant = grant.await.unwrap();
        assert_eq!(grant.computer_id.as_deref(), Some("42"));
        assert_eq!(log.closed_windows(), vec![true]);
        assert!(!slot.is_pending());
    }

    #[tokio::test]
    async fn new_attempt_supersedes_the_previous_one() {
        let log = PlatformLog::default();
        let mut launcher = FakeLauncher::new(log.clone());
        let mut auth = AuthController::new(AuthConfig::default());

        let AuthorizationRequest::Popup(first) =
            auth.request_authorization_code(&api(), &mut launcher, &page()).unwrap()
        else {
            panic!("expected popup");
        };
        let AuthorizationRequest::Popup(second) =
            auth.request_authorization_code(&api(), &mut launcher, &page()).unwrap()
        else {
            panic!("expected popup");
        };

        assert!(matches!(first.await, Err(DvError::Superseded)));
        assert_eq!(second.attempt(), 2);
        assert_eq!(log.closed_windows(), vec![true, false]);

        auth.handshake()
            .deliver(&PopupMessage { code: Some("xyz".into()), computer_id: Some("7".into()) });
        assert_eq!(second.await.unwrap().code, "xyz");
    }

    #[test]
    fn redirect_mode_navigates_with_scrubbed_return_address() {
        let log = PlatformLog::default();
        let mut launcher = FakeLauncher::new(log.clone());
        let config = AuthConfig { method: AuthMethod::Redirect, ..AuthConfig::default() };
        let mut auth = AuthController::new(config);
        let current = Url::parse("https://app.example/xr?code=old&oauth=desktopvision").unwrap();

        let request = auth.request_authorization_code(&api(), &mut launcher, &current).unwrap();

        assert!(matches!(request, AuthorizationRequest::Redirect));
        let navigated = log.navigations();
        assert_eq!(navigated.len(), 1);
        let redirect_uri = navigated[0]
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned());
        assert_eq!(redirect_uri.as_deref(), Some("https://app.example/xr?oauth=desktopvision"));
    }

    #[test]
    fn failed_exchange_still_clears_and_scrubs() {
        let log = PlatformLog::default();
        let mut location =
            FakeLocation::new(log.clone(), "https://app.example/?code=abc&computer_id=42&oauth=desktopvision");
        let mut state = resume_from_url(&location.href());

        let result = AuthController::finish_exchange(
            &mut state,
            &mut location,
            Err(DvError::auth("invalid_grant")),
        );

        assert!(result.is_err());
        assert!(state.authorization_code.is_none());
        assert!(state.access_token.is_none());
        assert_eq!(state.selected_computer_id.as_deref(), Some("42"));
        assert_eq!(location.href().as_str(), "https://app.example/");
    }

    #[test]
    fn successful_exchange_stores_token() {
        let log = PlatformLog::default();
        let mut location = FakeLocation::new(log.clone(), "https://app.example/?code=abc");
        let mut state = resume_from_url(&location.href());

        AuthController::finish_exchange(&mut state, &mut location, Ok(AccessToken::new("u1", "tok")))
            .unwrap();

        assert_eq!(state.access_token, Some(AccessToken::new("u1", "tok")));
        assert!(!state.has_code());
        assert_eq!(location.href().as_str(), "https://app.example/");
    }
}
