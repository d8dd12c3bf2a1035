//! CPU-side mesh geometry.
//!
//! Geometry stays on the CPU inside the scene graph; the renderer uploads it to
//! vertex/index buffers the first time a mesh is drawn.

use cgmath::InnerSpace;

/// The vertex layout shared by the Lambert pipeline and the CPU geometry.
///
/// `color` carries whatever the asset author encoded per vertex, for the
/// hurricane data that is wind magnitude mapped onto a colour ramp.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl ModelVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Recomputes smooth vertex normals.
    ///
    /// Face normals are accumulated per vertex (their length is twice the
    /// triangle area, so bigger faces weigh more) and normalized afterwards.
    pub fn compute_vertex_normals(&mut self) {
        let mut accumulated = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for c in self.indices.chunks_exact(3) {
            let (a, b, d) = (c[0] as usize, c[1] as usize, c[2] as usize);
            if a >= self.vertices.len() || b >= self.vertices.len() || d >= self.vertices.len() {
                log::warn!("Skipping triangle with out of range index {:?}", c);
                continue;
            }
            let pos0: cgmath::Vector3<f32> = self.vertices[a].position.into();
            let pos1: cgmath::Vector3<f32> = self.vertices[b].position.into();
            let pos2: cgmath::Vector3<f32> = self.vertices[d].position.into();
            let face = (pos1 - pos0).cross(pos2 - pos0);
            accumulated[a] += face;
            accumulated[b] += face;
            accumulated[d] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            // degenerate or unused vertices keep pointing up
            vertex.normal = if normal.magnitude2() > f32::EPSILON {
                normal.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            };
        }
    }
}

/// Coloured line segment vertex for helpers such as the axes marker.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
