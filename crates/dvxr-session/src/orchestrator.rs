//! The orchestrator: single owner of session state.
//!
//! User actions are methods on [`Orchestrator`]. Anything that has to wait
//! (token exchange, directory listing, room negotiation, XR session request)
//! is spawned and reports back as an [`OrchestratorEvent`]; events are
//! applied in arrival order by [`Orchestrator::pump`] (once per frame) or
//! [`Orchestrator::next_event`]. Nothing else mutates state.

use std::time::Duration;

use dvxr_api::ServiceClient;
use dvxr_common::config::AppConfig;
use dvxr_common::error::{DvError, DvResult};
use dvxr_common::models::{AuthState, AuthorizationGrant, ComputerDescriptor};
use tokio::sync::mpsc;

use crate::auth::{self, AuthController, AuthorizationRequest, HandshakeSlot};
use crate::connection::{ActiveConnection, ConnectionSession, SessionEvent, SessionId, SessionTracker};
use crate::directory::{self, ComputerListing, ListingTracker};
use crate::event::OrchestratorEvent;
use crate::platform::{Camera, Platform, SceneDecoration, VideoSource, XrSession, XrSessionRequest};
use crate::render::{FrameTime, RenderLoop};
use crate::surface::{DesktopSurfaceManager, SurfaceRequest, SurfaceStatus};
use crate::ui::{ButtonState, Notice};

/// Everything the client knows. Only the orchestrator mutates it.
#[derive(Default)]
pub struct OrchestratorState {
    pub auth: AuthState,
    /// Last directory listing, server order.
    pub computers: Vec<ComputerDescriptor>,
    pub sessions: SessionTracker,
    pub listings: ListingTracker,
    /// The most recently requested connection, until it fails or is dropped.
    pub current: Option<ConnectionSession>,
    /// Transport backing the live surface.
    pub connection: Option<ActiveConnection>,
    pub surfaces: DesktopSurfaceManager,
    pub xr_session: Option<XrSession>,
}

/// What applying one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Authorized,
    /// A popup attempt was replaced by a newer one.
    GrantSuperseded,
    Authenticated,
    AuthFailed,
    Listed {
        count: usize,
        connecting: Option<SessionId>,
    },
    SurfaceBuilt(SurfaceStatus),
    ConnectFailed {
        session: SessionId,
    },
    StaleDiscarded {
        session: SessionId,
    },
    /// A newer directory request was issued before this reply arrived.
    StaleListing {
        request: u64,
    },
    XrPresenting,
    XrUnavailable,
}

pub struct Orchestrator {
    config: AppConfig,
    api: ServiceClient,
    platform: Platform,
    auth: AuthController,
    state: OrchestratorState,
    render: RenderLoop,
    events_tx: mpsc::UnboundedSender<OrchestratorEvent>,
    events_rx: mpsc::UnboundedReceiver<OrchestratorEvent>,
}

impl Orchestrator {
    /// Set up against `platform`, resuming any handshake found in the page URL.
    pub fn new(config: AppConfig, platform: Platform) -> DvResult<Self> {
        let api = ServiceClient::from_config(&config)?;
        let state = OrchestratorState {
            auth: auth::resume_from_url(&platform.location.href()),
            ..OrchestratorState::default()
        };
        if state.auth.has_code() {
            tracing::info!(
                computer = ?state.auth.selected_computer_id,
                "Resuming authorization from page URL"
            );
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut orchestrator = Self {
            auth: AuthController::new(config.auth.clone()),
            render: RenderLoop::new(Camera::at_height(config.render.camera_height)),
            config,
            api,
            platform,
            state,
            events_tx,
            events_rx,
        };
        orchestrator.refresh_buttons();
        Ok(orchestrator)
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render
    }

    /// Delivery point for popup messages.
    pub fn handshake(&self) -> HandshakeSlot {
        self.auth.handshake()
    }

    pub fn add_decoration(&mut self, decoration: Box<dyn SceneDecoration>) {
        self.render.add_decoration(decoration);
    }

    // ── UI ────────────────────────────────────────────────────────────────────

    fn refresh_buttons(&mut self) {
        let buttons = ButtonState::project(&self.state.auth);
        self.platform.controls.apply(&buttons);
    }

    fn report(&mut self, err: &DvError) {
        self.platform.controls.notify(&Notice::from_error(err));
    }

    /// Report a precondition failure and hand it back to the caller.
    fn reject<T>(&mut self, err: DvError) -> DvResult<T> {
        tracing::debug!(code = err.error_code(), "Action rejected: {err}");
        self.report(&err);
        Err(err)
    }

    // ── Authentication ────────────────────────────────────────────────────────

    /// Open the login page (popup or redirect, per config).
    pub fn request_authorization_code(&mut self) -> DvResult<()> {
        let href = self.platform.location.href();
        let request = match self.auth.request_authorization_code(
            &self.api,
            self.platform.launcher.as_mut(),
            &href,
        ) {
            Ok(request) => request,
            Err(e) => return self.reject(e),
        };

        if let AuthorizationRequest::Popup(grant) = request {
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                let _ = events.send(OrchestratorEvent::GrantReceived(grant.await));
            });
        }
        Ok(())
    }

    /// Store a completed handshake, overriding anything from the URL.
    pub fn apply_grant(&mut self, grant: AuthorizationGrant) {
        tracing::info!(computer = ?grant.computer_id, "Authorization code received");
        self.state.auth.apply_grant(grant);
        self.refresh_buttons();
    }

    /// Exchange the pending authorization code for an access token.
    pub fn exchange_token(&mut self) -> DvResult<()> {
        let Some(code) = self.state.auth.authorization_code.clone() else {
            return self.reject(DvError::auth("no authorization code to exchange"));
        };

        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = auth::exchange_code_for_token(&api, &code).await;
            let _ = events.send(OrchestratorEvent::TokenExchanged(outcome));
        });
        Ok(())
    }

    // ── Directory ─────────────────────────────────────────────────────────────

    /// Refresh the computer list.
    pub fn fetch_computers(&mut self) -> DvResult<()> {
        self.spawn_listing(None)
    }

    /// Refresh the computer list, then connect to the selected computer.
    pub fn connect_selected(&mut self) -> DvResult<()> {
        let Some(id) = self.state.auth.selected_computer_id.clone() else {
            return self.reject(DvError::NoComputerSelected);
        };
        self.spawn_listing(Some(id))
    }

    fn spawn_listing(&mut self, connect_to: Option<String>) -> DvResult<()> {
        let Some(token) = self.state.auth.access_token.clone() else {
            return self.reject(DvError::NotAuthenticated);
        };

        let request = self.state.listings.begin(connect_to);
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let listing = directory::list_computers(&api, &token).await;
            let _ = events.send(OrchestratorEvent::ComputersListed { request, listing });
        });
        Ok(())
    }

    // ── Connection ────────────────────────────────────────────────────────────

    /// Connect to a computer from the last listing. Supersedes any attempt
    /// still in flight.
    pub fn connect(&mut self, computer_id: &str) -> DvResult<SessionId> {
        let Some(token) = self.state.auth.access_token.clone() else {
            return self.reject(DvError::NotAuthenticated);
        };
        let Some(computer) = directory::resolve(&self.state.computers, computer_id).cloned() else {
            tracing::warn!(computer = computer_id, "Selected computer is not in the directory");
            return self.reject(DvError::ComputerNotFound { id: computer_id.to_owned() });
        };

        let id = self.state.sessions.begin();
        let session = ConnectionSession::connect(
            id,
            &computer,
            token,
            self.api.clone(),
            self.platform.transport.clone(),
            Duration::from_secs(self.config.connection.stream_timeout_secs),
            self.events_tx.clone(),
        );
        self.state.auth.selected_computer_id = Some(computer.id);
        self.state.current = Some(session);
        self.refresh_buttons();
        Ok(id)
    }

    /// Drop the surface and the connection; late events from the current
    /// attempt are discarded and a pending connect-to-selected is dropped.
    pub fn disconnect(&mut self) {
        self.state.surfaces.teardown(self.platform.scene.as_mut());
        if let Some(connection) = self.state.connection.take() {
            connection.teardown();
        }
        self.state.current = None;
        if self.state.listings.take_connect().is_some() {
            tracing::debug!("Pending connect dropped");
        }
        if let Some(session) = self.state.sessions.clear() {
            tracing::info!(%session, "Disconnected");
            self.platform
                .controls
                .notify(&Notice::info("DISCONNECTED", "Disconnected from the remote computer."));
        }
    }

    // ── Surface ───────────────────────────────────────────────────────────────

    /// Remove the live surface. The connection stays open.
    pub fn remove_surface(&mut self) -> bool {
        self.state.surfaces.teardown(self.platform.scene.as_mut())
    }

    /// Show the local test clip on a surface, without any connection.
    pub fn show_test_surface(&mut self) -> SurfaceStatus {
        let source = VideoSource::File(self.config.surface.test_video_path.clone());
        self.build_surface(source, None, None, true)
    }

    fn build_surface(
        &mut self,
        source: VideoSource,
        connection: Option<&ActiveConnection>,
        session: Option<SessionId>,
        muted: bool,
    ) -> SurfaceStatus {
        self.platform.toolkit.bind_video(&source, muted);
        self.state.surfaces.build_surface(
            SurfaceRequest {
                source,
                connection: connection.map(|c| c.connection.clone()),
                session,
                camera: self.render.camera(),
                container: &self.platform.container,
                options: &self.config.surface.options,
            },
            self.platform.toolkit.as_mut(),
            self.platform.scene.as_mut(),
        )
    }

    // ── XR ────────────────────────────────────────────────────────────────────

    /// Ask the runtime for an immersive session.
    pub fn enter_xr(&mut self) {
        let request = XrSessionRequest {
            mode: self.config.xr.session_mode.clone(),
            optional_features: self.config.xr.optional_features.clone(),
        };
        let xr = self.platform.xr.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = xr.request_session(&request).await;
            let _ = events.send(OrchestratorEvent::XrSessionStarted(outcome));
        });
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    pub fn resize(&mut self, width: u32, height: u32) {
        self.render.resize(width, height, self.platform.renderer.as_mut());
    }

    /// Apply completed work, then update and render one frame.
    pub fn frame(&mut self, time_ms: f64) -> FrameTime {
        self.pump();
        self.render.tick(
            time_ms,
            &mut self.state.surfaces,
            self.platform.scene.as_ref(),
            self.platform.renderer.as_mut(),
        )
    }

    /// Apply every event that has already arrived. Never waits.
    pub fn pump(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            applied.push(self.apply(event));
        }
        applied
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    pub fn apply(&mut self, event: OrchestratorEvent) -> Applied {
        tracing::debug!(event = event.name(), "Applying event");
        match event {
            OrchestratorEvent::GrantReceived(outcome) => self.on_grant(outcome),
            OrchestratorEvent::TokenExchanged(outcome) => {
                let result = AuthController::finish_exchange(
                    &mut self.state.auth,
                    self.platform.location.as_mut(),
                    outcome,
                );
                self.refresh_buttons();
                match result {
                    Ok(()) => Applied::Authenticated,
                    Err(e) => {
                        self.report(&e);
                        Applied::AuthFailed
                    }
                }
            }
            OrchestratorEvent::ComputersListed { request, listing } => {
                self.on_listing(request, listing)
            }
            OrchestratorEvent::Session(event) => self.on_session(event),
            OrchestratorEvent::XrSessionStarted(outcome) => match outcome {
                Ok(session) => {
                    tracing::info!(session = %session.id, "XR session started");
                    self.platform
                        .renderer
                        .present_xr(session.clone(), &self.config.xr.reference_space);
                    self.state.xr_session = Some(session);
                    Applied::XrPresenting
                }
                Err(e) => {
                    tracing::warn!("XR session request failed: {e}");
                    self.report(&e);
                    Applied::XrUnavailable
                }
            },
        }
    }

    fn on_grant(&mut self, outcome: DvResult<AuthorizationGrant>) -> Applied {
        match outcome {
            Ok(grant) => {
                self.apply_grant(grant);
                Applied::Authorized
            }
            Err(DvError::Superseded) => {
                tracing::debug!("Superseded authorization attempt ignored");
                Applied::GrantSuperseded
            }
            Err(e) => {
                tracing::warn!("Authorization handshake failed: {e}");
                self.report(&e);
                self.refresh_buttons();
                Applied::AuthFailed
            }
        }
    }

    fn on_listing(&mut self, request: u64, listing: ComputerListing) -> Applied {
        if !self.state.listings.is_latest(request) {
            tracing::debug!(request, "Discarding superseded directory listing");
            return Applied::StaleListing { request };
        }

        let connect_to = self.state.listings.take_connect();
        let ComputerListing { computers, failure } = listing;
        directory::render(self.platform.directory.as_mut(), &computers);
        let count = computers.len();
        self.state.computers = computers;

        if let Some(e) = failure {
            self.report(&e);
            return Applied::Listed { count, connecting: None };
        }

        let connecting = connect_to.and_then(|id| self.connect(&id).ok());
        Applied::Listed { count, connecting }
    }

    fn on_session(&mut self, event: SessionEvent) -> Applied {
        let session = event.session();
        if !self.state.sessions.is_current(session) {
            tracing::debug!(%session, current = ?self.state.sessions.current(), "Discarding stale session event");
            if let SessionEvent::StreamAdded { connection, .. } = event {
                connection.close();
            }
            return Applied::StaleDiscarded { session };
        }

        match event {
            SessionEvent::StreamAdded { session, channel_name, stream, connection } => {
                tracing::info!(%session, channel = %channel_name, stream = %stream.id, "Stream available");
                let active = ActiveConnection {
                    session,
                    channel_name,
                    connection,
                    connected_at: chrono::Utc::now(),
                };
                let status = self.build_surface(
                    VideoSource::Stream(stream),
                    Some(&active),
                    Some(session),
                    self.config.surface.stream_muted,
                );
                if let Some(previous) = self.state.connection.replace(active) {
                    previous.teardown();
                }
                Applied::SurfaceBuilt(status)
            }
            SessionEvent::Failed { session, channel_name, error } => {
                tracing::warn!(%session, channel = %channel_name, code = error.error_code(), "Connection failed: {error}");
                self.state.sessions.clear();
                self.state.current = None;
                self.report(&error);
                Applied::ConnectFailed { session }
            }
        }
    }
}
