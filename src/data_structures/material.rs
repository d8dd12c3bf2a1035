//! Lambert (diffuse-only) material.

/// Diffuse shading descriptor.
///
/// With `vertex_colors` set, the per-vertex colour multiplies the diffuse
/// colour, which is how the encoded scalar data becomes visible.
#[derive(Clone, Debug, PartialEq)]
pub struct LambertMaterial {
    pub name: String,
    /// Linear RGB.
    pub color: [f32; 3],
    pub vertex_colors: bool,
}

impl LambertMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: [1.0, 1.0, 1.0],
            vertex_colors: false,
        }
    }

    pub fn with_vertex_colors(mut self, enabled: bool) -> Self {
        self.vertex_colors = enabled;
        self
    }

    pub fn to_uniform(&self) -> MaterialUniform {
        MaterialUniform {
            color: self.color,
            vertex_colors: self.vertex_colors as u32,
        }
    }
}

impl Default for LambertMaterial {
    fn default() -> Self {
        Self::new("Default Lambert")
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    color: [f32; 3],
    vertex_colors: u32,
}
