//! Capability providers the orchestrator drives but does not implement.
//!
//! A host (browser shim, native engine) implements these against the real
//! rendering engine, XR runtime, streaming SDK, and page. Traits that are used
//! from spawned tasks are `Send + Sync`; everything else is only touched from
//! the thread that owns the [`crate::Orchestrator`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dvxr_api::RoomOptions;
use dvxr_common::error::DvResult;
use dvxr_common::models::{KeyboardOptions, SurfaceOptions, Vec3, XrOptions};
use url::Url;

use crate::render::FrameTime;
use crate::ui::{Affordance, ButtonState, Notice};

/// Handle to a node in the engine's scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// A negotiated remote media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
}

/// What the video sink plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Stream(MediaStream),
    /// Local clip, looped; used by the test surface.
    File(String),
}

impl VideoSource {
    pub fn label(&self) -> &str {
        match self {
            Self::Stream(s) => &s.id,
            Self::File(path) => path,
        }
    }
}

/// DOM element (or native equivalent) hosting the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef(pub String);

/// Viewer camera. Owned by the render loop, read by the renderer and toolkit.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub aspect: f32,
}

impl Camera {
    pub fn at_height(height: f32) -> Self {
        Self {
            position: Vec3::new(0.0, height, 0.0),
            aspect: 1.0,
        }
    }
}

/// The engine's scene graph.
pub trait Scene {
    fn add(&mut self, node: NodeId);
    fn remove(&mut self, node: NodeId);
}

/// Submits frames and hosts the XR presentation session.
pub trait Renderer {
    fn render(&mut self, scene: &dyn Scene, camera: &Camera);
    fn set_size(&mut self, width: u32, height: u32);
    fn present_xr(&mut self, session: XrSession, reference_space: &str);
}

/// The live 3D object bound to a video source.
pub trait DesktopSurface {
    fn node(&self) -> NodeId;
    fn source(&self) -> &VideoSource;
    fn update(&mut self, frame: &FrameTime);
    /// Release GPU and video resources. Called after removal from the scene.
    fn dispose(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdapterKind {
    Keyboard,
    Pointer,
    Touch,
    Xr,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyboard => "keyboard",
            Self::Pointer => "pointer",
            Self::Touch => "touch",
            Self::Xr => "xr",
        })
    }
}

/// An input binding anchored to one surface.
///
/// Adapters register input listeners when created and must drop all of them
/// in [`InputAdapter::teardown`].
pub trait InputAdapter {
    fn kind(&self) -> AdapterKind;

    /// Scene node for visuals the adapter draws itself (controllers, hands).
    fn node(&self) -> Option<NodeId> {
        None
    }

    fn update(&mut self, _frame: &FrameTime) {}

    fn teardown(&mut self);
}

/// Everything a surface is built against besides its options.
pub struct SurfaceContext<'a> {
    pub source: &'a VideoSource,
    pub camera: &'a Camera,
    pub container: &'a ContainerRef,
}

/// The streaming SDK's surface, keyboard, and input factories.
pub trait SurfaceToolkit {
    /// Point the video sink at `source` with inline playback.
    fn bind_video(&mut self, source: &VideoSource, muted: bool);

    fn create_surface(
        &mut self,
        ctx: &SurfaceContext<'_>,
        options: &SurfaceOptions,
    ) -> Box<dyn DesktopSurface>;

    fn create_keyboard(
        &mut self,
        surface: &dyn DesktopSurface,
        connection: Arc<dyn TransportConnection>,
        options: &KeyboardOptions,
    ) -> Box<dyn InputAdapter>;

    fn create_xr_controls(
        &mut self,
        surface: &dyn DesktopSurface,
        options: &XrOptions,
    ) -> Box<dyn InputAdapter>;

    fn create_pointer_controls(&mut self, surface: &dyn DesktopSurface) -> Box<dyn InputAdapter>;

    fn create_touch_controls(&mut self, surface: &dyn DesktopSurface) -> Box<dyn InputAdapter>;
}

/// Opens transport connections from negotiated room options.
#[async_trait]
pub trait StreamingTransport: Send + Sync {
    async fn open(&self, options: RoomOptions) -> DvResult<Arc<dyn TransportConnection>>;
}

/// One open transport connection.
#[async_trait]
pub trait TransportConnection: Send + Sync {
    /// Resolves once the remote end publishes its stream.
    async fn wait_for_stream(&self) -> DvResult<MediaStream>;

    fn close(&self);
}

/// Spawns the login page in a new context or navigates to it.
pub trait AuthLauncher {
    fn open_popup(&mut self, url: &Url) -> DvResult<Box<dyn AuthWindow>>;
    fn navigate(&mut self, url: &Url);
}

/// A spawned login context.
pub trait AuthWindow: Send {
    fn close(&mut self);
}

/// The page's address bar.
pub trait Location {
    fn href(&self) -> Url;
    /// Replace the current history entry without navigating.
    fn replace_state(&mut self, url: Url);
}

/// Action buttons and the status line.
pub trait ControlPanel {
    fn apply(&mut self, buttons: &ButtonState);
    fn notify(&mut self, notice: &Notice);
}

/// The container holding one affordance per computer.
pub trait DirectoryPanel {
    fn clear(&mut self);
    fn add_affordance(&mut self, affordance: &Affordance);
    fn add_notice(&mut self, text: &str);
}

/// A granted XR presentation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrSession {
    pub id: String,
}

/// What to ask the XR runtime for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrSessionRequest {
    pub mode: String,
    pub optional_features: Vec<String>,
}

#[async_trait]
pub trait XrRuntime: Send + Sync {
    async fn request_session(&self, request: &XrSessionRequest) -> DvResult<XrSession>;
}

/// Cosmetic scene content animated every frame.
pub trait SceneDecoration {
    fn animate(&mut self, frame: &FrameTime);
}

/// The full set of providers one orchestrator runs against.
pub struct Platform {
    pub scene: Box<dyn Scene>,
    pub renderer: Box<dyn Renderer>,
    pub toolkit: Box<dyn SurfaceToolkit>,
    pub transport: Arc<dyn StreamingTransport>,
    pub xr: Arc<dyn XrRuntime>,
    pub launcher: Box<dyn AuthLauncher>,
    pub location: Box<dyn Location>,
    pub controls: Box<dyn ControlPanel>,
    pub directory: Box<dyn DirectoryPanel>,
    pub container: ContainerRef,
}
