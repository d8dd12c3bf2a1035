//! Fixed viewer constants.
//!
//! Nothing here is configurable at runtime: the viewer shows exactly one asset
//! with one camera setup, so every parameter is baked in at compile time.

/// Asset path relative to the `assets/` directory (native) or `<origin>/assets/` (web).
pub const MESH_PATH: &str = "Data/Katrina.dae";

pub const CAMERA_FOV_DEG: f32 = 75.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;
pub const CAMERA_POSITION: [f32; 3] = [3.0, 2.0, 3.0];
/// Roughly the centre of the hurricane model.
pub const ORBIT_TARGET: [f32; 3] = [0.0, 1.16, 0.0];

pub const AMBIENT_COLOR: u32 = 0xB8B8B8;
pub const POINT_LIGHT_COLOR: u32 = 0xFFFFFF;
pub const POINT_LIGHT_INTENSITY: f32 = 1.0;
pub const POINT_LIGHT_DISTANCE: f32 = 50.0;
pub const POINT_LIGHT_DECAY: f32 = 1.0;
pub const POINT_LIGHT_POSITION: [f32; 3] = [0.0, 5.0, 3.0];

pub const AXES_SIZE: f32 = 3.0;

pub const CLEAR_COLOR: u32 = 0x525252;
pub const CLEAR_ALPHA: f64 = 1.0;
pub const MSAA_SAMPLES: u32 = 4;

pub const ENABLE_DAMPING: bool = true;
pub const DAMPING_FACTOR: f32 = 0.05;

/// Splits a `0xRRGGBB` colour into normalized sRGB components.
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    ]
}

/// Converts one sRGB-encoded channel to linear light.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// `0xRRGGBB` to linear RGB, the space the shaders light in.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    hex_to_rgb(hex).map(srgb_to_linear)
}
