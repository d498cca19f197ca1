//! Placement and presentation options for the in-scene desktop surface.

use serde::{Deserialize, Serialize};

/// A point in scene space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Options for building one desktop surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceOptions {
    /// Draw the back face of the screen too.
    pub render_back: bool,
    pub initial_scale: f32,
    /// Eye height, one meter in front of the viewer by default.
    pub initial_position: Vec3,
    /// Reach (meters) within which the surface can be grabbed and moved.
    pub grab_distance: f32,
    pub show_move_icon: bool,
    pub show_resize_icon: bool,
    pub include_keyboard: bool,
    /// Present through a compositor layer instead of a mesh.
    pub render_as_layer: bool,
    pub keyboard: KeyboardOptions,
    pub xr: XrOptions,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            render_back: true,
            initial_scale: 0.5,
            initial_position: Vec3::new(0.0, 1.6, -1.0),
            grab_distance: 1.0,
            show_move_icon: true,
            show_resize_icon: true,
            include_keyboard: true,
            render_as_layer: false,
            keyboard: KeyboardOptions::default(),
            xr: XrOptions::default(),
        }
    }
}

/// Virtual keyboard overlay theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardOptions {
    pub show_move_icon: bool,
    pub show_resize_icon: bool,
    pub key_color: String,
    pub highlight_color: String,
}

impl Default for KeyboardOptions {
    fn default() -> Self {
        Self {
            show_move_icon: true,
            show_resize_icon: true,
            key_color: "rgb(200, 100, 100)".into(),
            highlight_color: "rgb(250, 50, 50)".into(),
        }
    }
}

/// What the XR control binding draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrOptions {
    pub hide_controllers: bool,
    pub hide_hands: bool,
    pub hide_cursors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_fill_from_defaults() {
        let opts: SurfaceOptions = serde_json::from_value(serde_json::json!({
            "initial_scale": 0.8,
            "xr": { "hide_hands": true }
        }))
        .unwrap();

        assert_eq!(opts.initial_scale, 0.8);
        assert!(opts.xr.hide_hands);
        assert!(!opts.xr.hide_controllers);
        assert_eq!(opts.initial_position, Vec3::new(0.0, 1.6, -1.0));
        assert_eq!(opts.keyboard.key_color, "rgb(200, 100, 100)");
    }
}
