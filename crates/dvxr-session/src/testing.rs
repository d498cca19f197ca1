//! In-memory platform for tests.
//!
//! Every fake writes into a shared [`PlatformLog`], so a test can hand the
//! fakes to an orchestrator and still inspect scene nodes, live input
//! listeners, and UI state afterwards.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dvxr_api::RoomOptions;
use dvxr_common::error::{DvError, DvResult};
use dvxr_common::models::{KeyboardOptions, SurfaceOptions, XrOptions};
use serde_json::Value;
use tokio::sync::{Notify, oneshot};
use url::Url;

use crate::platform::{
    AdapterKind, AuthLauncher, AuthWindow, Camera, ContainerRef, ControlPanel, DesktopSurface,
    DirectoryPanel, InputAdapter, Location, MediaStream, NodeId, Platform, Renderer, Scene,
    StreamingTransport, SurfaceContext, SurfaceToolkit, TransportConnection, VideoSource,
    XrRuntime, XrSession, XrSessionRequest,
};
use crate::render::FrameTime;
use crate::ui::{Affordance, ButtonState, Notice};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One entry rendered into the directory panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryItem {
    Affordance(Affordance),
    Notice(String),
}

#[derive(Default)]
struct LogInner {
    entries: Vec<String>,
    next_node: u64,
    next_listener: u64,
    scene: Vec<NodeId>,
    listeners: Vec<(u64, AdapterKind, NodeId)>,
    disposed: Vec<NodeId>,
    frames: u64,
    buttons: Option<ButtonState>,
    notices: Vec<Notice>,
    directory: Vec<DirectoryItem>,
    bound_videos: Vec<(VideoSource, bool)>,
    popups: Vec<Url>,
    windows: Vec<Arc<AtomicBool>>,
    navigations: Vec<Url>,
    location: Option<Url>,
    presented: Vec<(XrSession, String)>,
}

/// Shared record of everything the fakes were asked to do.
#[derive(Clone, Default)]
pub struct PlatformLog {
    inner: Rc<RefCell<LogInner>>,
}

impl PlatformLog {
    fn read(&self) -> Ref<'_, LogInner> {
        self.inner.borrow()
    }

    fn write(&self) -> RefMut<'_, LogInner> {
        self.inner.borrow_mut()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.write().entries.push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.read().entries.clone()
    }

    pub fn clear_entries(&self) {
        self.write().entries.clear();
    }

    fn alloc_node(&self) -> NodeId {
        let mut inner = self.write();
        inner.next_node += 1;
        NodeId(inner.next_node)
    }

    fn subscribe(&self, kind: AdapterKind, node: NodeId) -> u64 {
        let mut inner = self.write();
        inner.next_listener += 1;
        let id = inner.next_listener;
        inner.listeners.push((id, kind, node));
        id
    }

    fn unsubscribe(&self, id: u64) {
        self.write().listeners.retain(|(listener, _, _)| *listener != id);
    }

    /// Surfaces that still have a live listener of `kind`.
    pub fn listeners(&self, kind: AdapterKind) -> Vec<NodeId> {
        self.read()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, node)| *node)
            .collect()
    }

    pub fn live_listener_count(&self) -> usize {
        self.read().listeners.len()
    }

    pub fn scene_nodes(&self) -> Vec<NodeId> {
        self.read().scene.clone()
    }

    pub fn disposed(&self) -> Vec<NodeId> {
        self.read().disposed.clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.read().frames
    }

    pub fn buttons(&self) -> Option<ButtonState> {
        self.read().buttons
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.read().notices.clone()
    }

    pub fn directory(&self) -> Vec<DirectoryItem> {
        self.read().directory.clone()
    }

    pub fn bound_videos(&self) -> Vec<(VideoSource, bool)> {
        self.read().bound_videos.clone()
    }

    pub fn popups(&self) -> Vec<Url> {
        self.read().popups.clone()
    }

    /// Closed flag of every popup opened so far, oldest first.
    pub fn closed_windows(&self) -> Vec<bool> {
        self.read()
            .windows
            .iter()
            .map(|w| w.load(Ordering::SeqCst))
            .collect()
    }

    pub fn navigations(&self) -> Vec<Url> {
        self.read().navigations.clone()
    }

    pub fn location(&self) -> Option<Url> {
        self.read().location.clone()
    }

    pub fn presented(&self) -> Vec<(XrSession, String)> {
        self.read().presented.clone()
    }
}

pub struct FakeScene {
    log: PlatformLog,
}

impl FakeScene {
    pub fn new(log: PlatformLog) -> Self {
        Self { log }
    }
}

impl Scene for FakeScene {
    fn add(&mut self, node: NodeId) {
        self.log.record(format!("add {node}"));
        self.log.write().scene.push(node);
    }

    fn remove(&mut self, node: NodeId) {
        self.log.record(format!("remove {node}"));
        self.log.write().scene.retain(|n| *n != node);
    }
}

pub struct FakeRenderer {
    log: PlatformLog,
}

impl FakeRenderer {
    pub fn new(log: PlatformLog) -> Self {
        Self { log }
    }
}

impl Renderer for FakeRenderer {
    fn render(&mut self, _scene: &dyn Scene, _camera: &Camera) {
        self.log.record("render");
        self.log.write().frames += 1;
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.log.record(format!("resize {width}x{height}"));
    }

    fn present_xr(&mut self, session: XrSession, reference_space: &str) {
        self.log.record(format!("present {} {reference_space}", session.id));
        self.log.write().presented.push((session, reference_space.to_owned()));
    }
}

pub struct FakeSurface {
    log: PlatformLog,
    node: NodeId,
    source: VideoSource,
}

impl DesktopSurface for FakeSurface {
    fn node(&self) -> NodeId {
        self.node
    }

    fn source(&self) -> &VideoSource {
        &self.source
    }

    fn update(&mut self, _frame: &FrameTime) {
        self.log.record(format!("update surface {}", self.node));
    }

    fn dispose(&mut self) {
        self.log.record(format!("dispose {}", self.node));
        self.log.write().disposed.push(self.node);
    }
}

/// Registers one listener on creation and drops it on teardown.
pub struct FakeAdapter {
    log: PlatformLog,
    kind: AdapterKind,
    node: Option<NodeId>,
    listener: Option<u64>,
}

impl FakeAdapter {
    fn attach(log: &PlatformLog, kind: AdapterKind, surface: NodeId, node: Option<NodeId>) -> Self {
        let listener = log.subscribe(kind, surface);
        Self {
            log: log.clone(),
            kind,
            node,
            listener: Some(listener),
        }
    }
}

impl InputAdapter for FakeAdapter {
    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn node(&self) -> Option<NodeId> {
        self.node
    }

    fn update(&mut self, _frame: &FrameTime) {
        self.log.record(format!("update {}", self.kind));
    }

    fn teardown(&mut self) {
        self.log.record(format!("teardown {}", self.kind));
        if let Some(listener) = self.listener.take() {
            self.log.unsubscribe(listener);
        }
    }
}

/// Allocates scene nodes for surfaces and XR controller visuals only.
pub struct FakeToolkit {
    log: PlatformLog,
}

impl FakeToolkit {
    pub fn new(log: PlatformLog) -> Self {
        Self { log }
    }
}

impl SurfaceToolkit for FakeToolkit {
    fn bind_video(&mut self, source: &VideoSource, muted: bool) {
        self.log.record(format!("bind {} muted={muted}", source.label()));
        self.log.write().bound_videos.push((source.clone(), muted));
    }

    fn create_surface(
        &mut self,
        ctx: &SurfaceContext<'_>,
        _options: &SurfaceOptions,
    ) -> Box<dyn DesktopSurface> {
        let node = self.log.alloc_node();
        self.log.record(format!("create surface {node}"));
        Box::new(FakeSurface {
            log: self.log.clone(),
            node,
            source: ctx.source.clone(),
        })
    }

    fn create_keyboard(
        &mut self,
        surface: &dyn DesktopSurface,
        _connection: Arc<dyn TransportConnection>,
        _options: &KeyboardOptions,
    ) -> Box<dyn InputAdapter> {
        Box::new(FakeAdapter::attach(&self.log, AdapterKind::Keyboard, surface.node(), None))
    }

    fn create_xr_controls(
        &mut self,
        surface: &dyn DesktopSurface,
        _options: &XrOptions,
    ) -> Box<dyn InputAdapter> {
        let visuals = self.log.alloc_node();
        Box::new(FakeAdapter::attach(&self.log, AdapterKind::Xr, surface.node(), Some(visuals)))
    }

    fn create_pointer_controls(&mut self, surface: &dyn DesktopSurface) -> Box<dyn InputAdapter> {
        Box::new(FakeAdapter::attach(&self.log, AdapterKind::Pointer, surface.node(), None))
    }

    fn create_touch_controls(&mut self, surface: &dyn DesktopSurface) -> Box<dyn InputAdapter> {
        Box::new(FakeAdapter::attach(&self.log, AdapterKind::Touch, surface.node(), None))
    }
}

/// A transport connection whose stream is released by the test.
pub struct FakeConnection {
    options: RoomOptions,
    closed: AtomicBool,
    release: Mutex<Option<oneshot::Sender<DvResult<MediaStream>>>>,
    stream: Mutex<Option<oneshot::Receiver<DvResult<MediaStream>>>>,
}

impl FakeConnection {
    fn pending(options: RoomOptions) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            options,
            closed: AtomicBool::new(false),
            release: Mutex::new(Some(tx)),
            stream: Mutex::new(Some(rx)),
        }
    }

    /// A connection whose stream is already available.
    pub fn ready(stream_id: &str) -> Self {
        let connection = Self::pending(RoomOptions(Value::Null));
        connection.release(stream_id);
        connection
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    /// Publish the remote stream.
    pub fn release(&self, stream_id: &str) {
        self.resolve(Ok(MediaStream { id: stream_id.to_owned() }));
    }

    /// Fail the connection before any stream arrives.
    pub fn fail(&self, message: &str) {
        self.resolve(Err(DvError::transport(message)));
    }

    fn resolve(&self, outcome: DvResult<MediaStream>) {
        if let Some(tx) = lock(&self.release).take() {
            let _ = tx.send(outcome);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnection for FakeConnection {
    async fn wait_for_stream(&self) -> DvResult<MediaStream> {
        let rx = lock(&self.stream).take();
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(DvError::transport("connection dropped"))),
            None => Err(DvError::transport("stream already taken")),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
enum TransportMode {
    /// Streams arrive immediately, named `stream-<room>`.
    Auto,
    /// Streams arrive when the test releases them.
    Gated,
    Failing(String),
}

struct TransportInner {
    mode: TransportMode,
    room_options: Mutex<Vec<RoomOptions>>,
    opened: Mutex<Vec<Arc<FakeConnection>>>,
    opened_changed: Notify,
}

/// Records every open and hands out [`FakeConnection`]s.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<TransportInner>,
}

impl FakeTransport {
    fn with_mode(mode: TransportMode) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                mode,
                room_options: Mutex::new(Vec::new()),
                opened: Mutex::new(Vec::new()),
                opened_changed: Notify::new(),
            }),
        }
    }

    pub fn auto() -> Self {
        Self::with_mode(TransportMode::Auto)
    }

    pub fn gated() -> Self {
        Self::with_mode(TransportMode::Gated)
    }

    pub fn failing(message: &str) -> Self {
        Self::with_mode(TransportMode::Failing(message.to_owned()))
    }

    pub fn room_options(&self) -> Vec<RoomOptions> {
        lock(&self.inner.room_options).clone()
    }

    pub fn opened(&self) -> Vec<Arc<FakeConnection>> {
        lock(&self.inner.opened).clone()
    }

    /// Wait until at least `count` connections were opened.
    pub async fn wait_for_opened(&self, count: usize) -> Vec<Arc<FakeConnection>> {
        loop {
            let changed = self.inner.opened_changed.notified();
            let opened = self.opened();
            if opened.len() >= count {
                return opened;
            }
            changed.await;
        }
    }
}

#[async_trait]
impl StreamingTransport for FakeTransport {
    async fn open(&self, options: RoomOptions) -> DvResult<Arc<dyn TransportConnection>> {
        lock(&self.inner.room_options).push(options.clone());

        let connection = match &self.inner.mode {
            TransportMode::Failing(message) => return Err(DvError::transport(message)),
            TransportMode::Gated => Arc::new(FakeConnection::pending(options)),
            TransportMode::Auto => {
                let room = options
                    .as_value()
                    .get("room")
                    .and_then(Value::as_str)
                    .unwrap_or("default")
                    .to_owned();
                let connection = Arc::new(FakeConnection::pending(options));
                connection.release(&format!("stream-{room}"));
                connection
            }
        };

        lock(&self.inner.opened).push(connection.clone());
        self.inner.opened_changed.notify_waiters();
        Ok(connection)
    }
}

struct XrInner {
    unavailable: Option<String>,
    requests: Mutex<Vec<XrSessionRequest>>,
}

#[derive(Clone)]
pub struct FakeXr {
    inner: Arc<XrInner>,
}

impl FakeXr {
    pub fn available() -> Self {
        Self {
            inner: Arc::new(XrInner { unavailable: None, requests: Mutex::new(Vec::new()) }),
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            inner: Arc::new(XrInner {
                unavailable: Some(message.to_owned()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn requests(&self) -> Vec<XrSessionRequest> {
        lock(&self.inner.requests).clone()
    }
}

#[async_trait]
impl XrRuntime for FakeXr {
    async fn request_session(&self, request: &XrSessionRequest) -> DvResult<XrSession> {
        let count = {
            let mut requests = lock(&self.inner.requests);
            requests.push(request.clone());
            requests.len()
        };
        match &self.inner.unavailable {
            Some(message) => Err(DvError::Xr { message: message.clone() }),
            None => Ok(XrSession { id: format!("xr-{count}") }),
        }
    }
}

pub struct FakeWindow {
    closed: Arc<AtomicBool>,
}

impl AuthWindow for FakeWindow {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeLauncher {
    log: PlatformLog,
    blocked: bool,
}

impl FakeLauncher {
    pub fn new(log: PlatformLog) -> Self {
        Self { log, blocked: false }
    }

    /// A launcher whose popups are always blocked.
    pub fn blocked(log: PlatformLog) -> Self {
        Self { log, blocked: true }
    }
}

impl AuthLauncher for FakeLauncher {
    fn open_popup(&mut self, url: &Url) -> DvResult<Box<dyn AuthWindow>> {
        if self.blocked {
            return Err(DvError::auth("popup blocked"));
        }
        let closed = Arc::new(AtomicBool::new(false));
        let mut inner = self.log.write();
        inner.popups.push(url.clone());
        inner.windows.push(closed.clone());
        Ok(Box::new(FakeWindow { closed }))
    }

    fn navigate(&mut self, url: &Url) {
        self.log.write().navigations.push(url.clone());
    }
}

pub struct FakeLocation {
    log: PlatformLog,
}

impl FakeLocation {
    pub fn new(log: PlatformLog, href: &str) -> Self {
        log.write().location = Some(Url::parse(href).expect("fake location needs an absolute url"));
        Self { log }
    }
}

impl Location for FakeLocation {
    fn href(&self) -> Url {
        self.log.location().expect("fake location is always set")
    }

    fn replace_state(&mut self, url: Url) {
        self.log.write().location = Some(url);
    }
}

pub struct FakeControls {
    log: PlatformLog,
}

impl ControlPanel for FakeControls {
    fn apply(&mut self, buttons: &ButtonState) {
        self.log.write().buttons = Some(*buttons);
    }

    fn notify(&mut self, notice: &Notice) {
        self.log.write().notices.push(notice.clone());
    }
}

pub struct FakeDirectoryPanel {
    log: PlatformLog,
}

impl FakeDirectoryPanel {
    pub fn new(log: PlatformLog) -> Self {
        Self { log }
    }
}

impl DirectoryPanel for FakeDirectoryPanel {
    fn clear(&mut self) {
        self.log.write().directory.clear();
    }

    fn add_affordance(&mut self, affordance: &Affordance) {
        self.log.write().directory.push(DirectoryItem::Affordance(affordance.clone()));
    }

    fn add_notice(&mut self, text: &str) {
        self.log.write().directory.push(DirectoryItem::Notice(text.to_owned()));
    }
}

/// A complete fake [`Platform`] recording into `log`, with the page at `href`.
pub fn platform(log: &PlatformLog, transport: &FakeTransport, xr: &FakeXr, href: &str) -> Platform {
    Platform {
        scene: Box::new(FakeScene::new(log.clone())),
        renderer: Box::new(FakeRenderer::new(log.clone())),
        toolkit: Box::new(FakeToolkit::new(log.clone())),
        transport: Arc::new(transport.clone()),
        xr: Arc::new(xr.clone()),
        launcher: Box::new(FakeLauncher::new(log.clone())),
        location: Box::new(FakeLocation::new(log.clone(), href)),
        controls: Box::new(FakeControls { log: log.clone() }),
        directory: Box::new(FakeDirectoryPanel::new(log.clone())),
        container: ContainerRef("scene-container".into()),
    }
}
