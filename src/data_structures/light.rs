//! Ambient and point lights.
//!
//! Lights live in the scene graph like every other node. The renderer folds all
//! reachable lights into one [`LightsUniform`] per frame; contributions are
//! purely additive.

use crate::{
    data_structures::{
        scene_graph::{NodeKind, SceneNode},
        transform::Transform,
    },
    settings,
};

/// Upper bound of point lights the Lambert shader evaluates.
pub const MAX_POINT_LIGHTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    /// Uniform contribution from every direction, no position.
    Ambient { color: [f32; 3] },
    /// Falls off to zero at `distance` (0 means infinite range) with exponent `decay`.
    Point {
        color: [f32; 3],
        intensity: f32,
        distance: f32,
        decay: f32,
    },
}

pub struct LightNode {
    name: String,
    light: Light,
    transform: Transform,
    children: Vec<Box<dyn SceneNode>>,
}

impl LightNode {
    pub fn ambient(hex: u32) -> Self {
        Self::new(
            "AmbientLight",
            Light::Ambient {
                color: settings::hex_to_linear(hex),
            },
        )
    }

    pub fn point(hex: u32, intensity: f32, distance: f32, decay: f32) -> Self {
        Self::new(
            "PointLight",
            Light::Point {
                color: settings::hex_to_linear(hex),
                intensity,
                distance,
                decay,
            },
        )
    }

    pub fn new(name: &str, light: Light) -> Self {
        Self {
            name: name.to_string(),
            light,
            transform: Transform::new(),
            children: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.transform.position = position.into();
        self
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn position(&self) -> cgmath::Vector3<f32> {
        self.transform.position
    }
}

impl SceneNode for LightNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Light
    }

    fn get_local_transform(&self) -> Transform {
        self.transform
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn as_light(&self) -> Option<&Light> {
        Some(&self.light)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    position: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    distance: f32,
    decay: f32,
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    ambient: [f32; 3],
    point_count: u32,
    points: [PointLightRaw; MAX_POINT_LIGHTS],
}

impl LightsUniform {
    /// Folds lights with their world positions into the shader layout.
    ///
    /// Ambient colours are summed; point lights beyond [`MAX_POINT_LIGHTS`]
    /// are dropped with a warning.
    pub fn from_lights<'a>(lights: impl IntoIterator<Item = (&'a Light, [f32; 3])>) -> Self {
        let mut uniform = Self::default();
        for (light, position) in lights {
            match *light {
                Light::Ambient { color } => {
                    for (acc, c) in uniform.ambient.iter_mut().zip(color) {
                        *acc += c;
                    }
                }
                Light::Point {
                    color,
                    intensity,
                    distance,
                    decay,
                } => {
                    let idx = uniform.point_count as usize;
                    if idx >= MAX_POINT_LIGHTS {
                        log::warn!(
                            "Only {} point lights are supported, ignoring the rest.",
                            MAX_POINT_LIGHTS
                        );
                        continue;
                    }
                    uniform.points[idx] = PointLightRaw {
                        position,
                        intensity,
                        color,
                        distance,
                        decay,
                        _padding: [0.0; 3],
                    };
                    uniform.point_count += 1;
                }
            }
        }
        uniform
    }

    pub fn ambient(&self) -> [f32; 3] {
        self.ambient
    }

    pub fn point_count(&self) -> u32 {
        self.point_count
    }
}
