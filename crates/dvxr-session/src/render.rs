//! Per-frame update and submit.

use crate::platform::{Camera, Renderer, Scene, SceneDecoration};
use crate::surface::DesktopSurfaceManager;

/// Pixels trimmed from each viewport dimension so the canvas never forces
/// scrollbars on its container.
const VIEWPORT_BORDER: u32 = 4;

/// Timing for one frame, as handed to everything updated in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Host clock in milliseconds.
    pub time_ms: f64,
    /// Time since the previous frame; zero on the first frame.
    pub delta_ms: f64,
    pub index: u64,
}

/// Drives one update+render pass per display frame.
///
/// Never blocks and never starts async work; it only reads state that
/// completed async steps have already published.
pub struct RenderLoop {
    camera: Camera,
    decorations: Vec<Box<dyn SceneDecoration>>,
    frames: u64,
    last_time_ms: Option<f64>,
}

impl RenderLoop {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            decorations: Vec::new(),
            frames: 0,
            last_time_ms: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn add_decoration(&mut self, decoration: Box<dyn SceneDecoration>) {
        self.decorations.push(decoration);
    }

    fn next_frame(&mut self, time_ms: f64) -> FrameTime {
        let delta_ms = self
            .last_time_ms
            .map(|last| (time_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_time_ms = Some(time_ms);
        let frame = FrameTime { time_ms, delta_ms, index: self.frames };
        self.frames += 1;
        frame
    }

    /// Run one frame: surface update (if any), decorations, submit.
    pub fn tick(
        &mut self,
        time_ms: f64,
        surfaces: &mut DesktopSurfaceManager,
        scene: &dyn Scene,
        renderer: &mut dyn Renderer,
    ) -> FrameTime {
        let frame = self.next_frame(time_ms);

        if surfaces.is_active() {
            surfaces.update(&frame);
        }
        for decoration in &mut self.decorations {
            decoration.animate(&frame);
        }
        renderer.render(scene, &self.camera);

        frame
    }

    /// Fit camera and renderer to a new viewport size.
    pub fn resize(&mut self, width: u32, height: u32, renderer: &mut dyn Renderer) {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "Ignoring degenerate viewport");
            return;
        }
        self.camera.aspect = width as f32 / height as f32;
        renderer.set_size(
            width.saturating_sub(VIEWPORT_BORDER),
            height.saturating_sub(VIEWPORT_BORDER),
        );
    }
}
