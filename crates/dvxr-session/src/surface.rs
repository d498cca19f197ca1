//! Desktop surface lifecycle: the single in-scene screen and its adapters.
//!
//! The manager owns five dependent objects per surface: the surface itself,
//! the keyboard overlay, and the XR, pointer, and touch adapters. Replacing
//! the surface always runs a full synchronous teardown first, so two sets of
//! adapters are never registered for input at the same time:
//!
//! ```text
//!   Empty ──stream──▶ Building ──▶ Active
//!     ▲                              │
//!     └──── teardown (sync) ◀────────┘  new stream / remove / disconnect
//! ```
//!
//! Adapters hold back-references into the surface, so they are torn down
//! before the surface leaves the scene graph.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dvxr_common::models::SurfaceOptions;

use crate::connection::SessionId;
use crate::platform::{
    AdapterKind, Camera, ContainerRef, DesktopSurface, InputAdapter, NodeId, Scene,
    SurfaceContext, SurfaceToolkit, TransportConnection, VideoSource,
};
use crate::render::FrameTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Empty,
    Building,
    Active,
}

/// Inputs for [`DesktopSurfaceManager::build_surface`].
pub struct SurfaceRequest<'a> {
    pub source: VideoSource,
    /// Absent for the local test surface; no keyboard overlay is built then.
    pub connection: Option<Arc<dyn TransportConnection>>,
    pub session: Option<SessionId>,
    pub camera: &'a Camera,
    pub container: &'a ContainerRef,
    pub options: &'a SurfaceOptions,
}

/// The live surface and everything anchored to it.
struct SurfaceBinding {
    surface: Box<dyn DesktopSurface>,
    keyboard: Option<Box<dyn InputAdapter>>,
    xr: Box<dyn InputAdapter>,
    pointer: Box<dyn InputAdapter>,
    touch: Box<dyn InputAdapter>,
    session: Option<SessionId>,
    built_at: DateTime<Utc>,
}

impl SurfaceBinding {
    fn status(&self) -> SurfaceStatus {
        let mut adapters = vec![AdapterKind::Xr, AdapterKind::Pointer, AdapterKind::Touch];
        if self.keyboard.is_some() {
            adapters.push(AdapterKind::Keyboard);
        }
        SurfaceStatus {
            node: self.surface.node(),
            source: self.surface.source().clone(),
            session: self.session,
            adapters,
            built_at: self.built_at,
        }
    }
}

/// Snapshot of the active surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStatus {
    pub node: NodeId,
    pub source: VideoSource,
    pub session: Option<SessionId>,
    pub adapters: Vec<AdapterKind>,
    pub built_at: DateTime<Utc>,
}

/// Owns at most one desktop surface at a time.
pub struct DesktopSurfaceManager {
    phase: SurfacePhase,
    active: Option<SurfaceBinding>,
}

impl DesktopSurfaceManager {
    pub fn new() -> Self {
        Self {
            phase: SurfacePhase::Empty,
            active: None,
        }
    }

    pub fn phase(&self) -> SurfacePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SurfacePhase::Active
    }

    /// Session the active surface was built for; `None` for the test surface.
    pub fn bound_session(&self) -> Option<SessionId> {
        self.active.as_ref().and_then(|b| b.session)
    }

    pub fn status(&self) -> Option<SurfaceStatus> {
        self.active.as_ref().map(SurfaceBinding::status)
    }

    /// Replace whatever is live with a new surface bound to `request.source`.
    ///
    /// On return exactly one surface and one adapter of each type are live,
    /// all bound to the new surface.
    pub fn build_surface(
        &mut self,
        request: SurfaceRequest<'_>,
        toolkit: &mut dyn SurfaceToolkit,
        scene: &mut dyn Scene,
    ) -> SurfaceStatus {
        self.teardown(scene);
        self.phase = SurfacePhase::Building;

        let options = request.options;
        let ctx = SurfaceContext {
            source: &request.source,
            camera: request.camera,
            container: request.container,
        };
        let surface = toolkit.create_surface(&ctx, options);

        let keyboard = match request.connection {
            Some(connection) if options.include_keyboard => {
                Some(toolkit.create_keyboard(surface.as_ref(), connection, &options.keyboard))
            }
            _ => None,
        };
        let xr = toolkit.create_xr_controls(surface.as_ref(), &options.xr);
        let pointer = toolkit.create_pointer_controls(surface.as_ref());
        let touch = toolkit.create_touch_controls(surface.as_ref());

        scene.add(surface.node());
        if let Some(node) = xr.node() {
            scene.add(node);
        }

        tracing::info!(
            node = %surface.node(),
            source = request.source.label(),
            session = ?request.session,
            keyboard = keyboard.is_some(),
            "Desktop surface built"
        );

        let binding = SurfaceBinding {
            surface,
            keyboard,
            xr,
            pointer,
            touch,
            session: request.session,
            built_at: Utc::now(),
        };
        let status = binding.status();
        self.active = Some(binding);
        self.phase = SurfacePhase::Active;
        status
    }

    /// Tear down the live surface, adapters first. Returns whether anything
    /// was live.
    pub fn teardown(&mut self, scene: &mut dyn Scene) -> bool {
        let Some(mut binding) = self.active.take() else {
            self.phase = SurfacePhase::Empty;
            return false;
        };

        binding.xr.teardown();
        if let Some(node) = binding.xr.node() {
            scene.remove(node);
        }
        binding.pointer.teardown();
        binding.touch.teardown();
        if let Some(keyboard) = binding.keyboard.as_mut() {
            keyboard.teardown();
        }

        let node = binding.surface.node();
        scene.remove(node);
        binding.surface.dispose();
        self.phase = SurfacePhase::Empty;

        tracing::info!(node = %node, session = ?binding.session, "Desktop surface torn down");
        true
    }

    /// Per-frame update: surface, keyboard, pointer, XR.
    ///
    /// Pointer and XR read surface geometry, so the surface goes first.
    pub fn update(&mut self, frame: &FrameTime) {
        let Some(binding) = self.active.as_mut() else {
            return;
        };
        binding.surface.update(frame);
        if let Some(keyboard) = binding.keyboard.as_mut() {
            keyboard.update(frame);
        }
        binding.pointer.update(frame);
        binding.xr.update(frame);
    }
}

impl Default for DesktopSurfaceManager {
    fn default() -> Self {
        Self::new()
    }
}
