//! Perspective camera and its GPU uniform.
//!
//! The camera always looks at `target`; [`crate::controls::OrbitControls`]
//! moves `position` around it and moves `target` only when panning.

use cgmath::{EuclideanSpace, InnerSpace};
use wgpu::util::DeviceExt;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: cgmath::Point3<f32>,
    pub target: cgmath::Point3<f32>,
    pub up: cgmath::Vector3<f32>,
    fovy: cgmath::Deg<f32>,
    aspect: f32,
    znear: f32,
    zfar: f32,
}

impl PerspectiveCamera {
    /// Creates a camera at the origin looking down -Z.
    ///
    /// Fails unless `0 < znear < zfar` and the aspect ratio is a positive finite number.
    pub fn new(fovy: cgmath::Deg<f32>, aspect: f32, znear: f32, zfar: f32) -> anyhow::Result<Self> {
        if !(znear > 0.0 && znear < zfar) {
            anyhow::bail!("Invalid clip planes: near ({znear}) must be positive and below far ({zfar})");
        }
        if !(aspect.is_finite() && aspect > 0.0) {
            anyhow::bail!("Invalid aspect ratio {aspect}");
        }
        if !(fovy.0 > 0.0 && fovy.0 < 180.0) {
            anyhow::bail!("Invalid field of view {:?}", fovy);
        }
        Ok(Self {
            position: cgmath::Point3::origin(),
            target: cgmath::Point3::new(0.0, 0.0, -1.0),
            up: cgmath::Vector3::unit_y(),
            fovy,
            aspect,
            znear,
            zfar,
        })
    }

    /// Camera whose aspect ratio matches a `width` x `height` surface.
    ///
    /// Zero-sized surfaces (minimized windows) are treated as 1 pixel.
    pub fn for_surface(
        fovy: cgmath::Deg<f32>,
        width: u32,
        height: u32,
        znear: f32,
        zfar: f32,
    ) -> anyhow::Result<Self> {
        Self::new(fovy, aspect_ratio(width, height), znear, zfar)
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.position = position.into();
        self
    }

    pub fn look_at(mut self, target: [f32; 3]) -> Self {
        self.target = target.into();
        self
    }

    pub fn fovy(&self) -> cgmath::Deg<f32> {
        self.fovy
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.znear
    }

    pub fn far(&self) -> f32 {
        self.zfar
    }

    pub fn distance_to_target(&self) -> f32 {
        (self.position - self.target).magnitude()
    }

    /// Unit vector from the camera towards the target.
    pub fn forward(&self) -> cgmath::Vector3<f32> {
        (self.target - self.position).normalize()
    }

    /// Screen-right direction in world space.
    pub fn right(&self) -> cgmath::Vector3<f32> {
        self.forward().cross(self.up).normalize()
    }

    /// Screen-up direction in world space.
    pub fn screen_up(&self) -> cgmath::Vector3<f32> {
        self.right().cross(self.forward())
    }

    pub fn view_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn build_view_projection_matrix(&self) -> cgmath::Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        // We're using Vector4 because of the uniforms 16 byte spacing requirement
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.build_view_projection_matrix().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera uniform buffer with its bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &PerspectiveCamera) {
        self.uniform.update_view_proj(camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
