//! Scene rendering.
//!
//! [`SceneRenderer`] is the seam between the viewer logic and the GPU: the
//! viewer only ever asks "draw this scene from this camera", which keeps it
//! testable without a device.
//!
//! Each frame the scene graph is flattened into a [`Frame`]: every node is
//! turned into a [`Render`] and sorted into a batch per pipeline (lit meshes,
//! helper lines) while lights are folded into the light uniform. GPU buffers
//! are created lazily the first time a node is drawn and cached by node id.
//!
//! # Key types
//!
//! - [`Render<'a>`] describes how a single scene node is drawn
//! - [`Frame<'a>`] is the batched draw list for one frame
//! - [`Renderer`] owns the [`Context`], the pipelines and the buffer caches

use std::{collections::HashMap, iter};

use instant::Duration;
use wgpu::util::DeviceExt;

use crate::{
    camera::{CameraResources, PerspectiveCamera},
    context::{Context, Target},
    data_structures::{
        geometry::{Geometry, LineVertex},
        light::{Light, LightsUniform},
        scene_graph::{MeshRef, Scene, SceneNode},
    },
    pipelines::{
        basic::{ObjectBinding, ObjectUniform, mk_lambert_pipeline, mk_object_bind_group_layout},
        light::LightResources,
        line::mk_line_pipeline,
    },
};

/// Draws a scene as seen from a camera.
pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);
}

/// Specifies how a scene node is drawn.
///
/// - `None` draws nothing (groups)
/// - `Mesh` is Lambert-shaded indexed geometry
/// - `Lines` is an unlit line list
/// - `Light` contributes to the lighting of every mesh
pub enum Render<'a> {
    None,
    Mesh(MeshRef<'a>),
    Lines { id: u32, vertices: &'a [LineVertex] },
    Light(&'a Light),
}

impl<'a> Render<'a> {
    /// Sorts `self` into the batch of the pipeline that draws it.
    pub(crate) fn set_pipelines(self, world: &cgmath::Matrix4<f32>, frame: &mut Frame<'a>) {
        match self {
            Render::Mesh(mesh) => frame.meshes.push((mesh, *world)),
            Render::Lines { id, vertices } => frame.lines.push((id, vertices, *world)),
            Render::Light(light) => frame.lights.push((light, world.w.truncate().into())),
            Render::None => (),
        }
    }
}

impl<'a> From<&'a dyn SceneNode> for Render<'a> {
    fn from(node: &'a dyn SceneNode) -> Self {
        if let Some(mesh) = node.as_mesh() {
            Render::Mesh(mesh)
        } else if let Some((id, vertices)) = node.as_lines() {
            Render::Lines { id, vertices }
        } else if let Some(light) = node.as_light() {
            Render::Light(light)
        } else {
            Render::None
        }
    }
}

/// Everything drawn in one frame, batched per pipeline, with world matrices.
#[derive(Default)]
pub struct Frame<'a> {
    pub meshes: Vec<(MeshRef<'a>, cgmath::Matrix4<f32>)>,
    pub lines: Vec<(u32, &'a [LineVertex], cgmath::Matrix4<f32>)>,
    pub lights: Vec<(&'a Light, [f32; 3])>,
}

impl<'a> Frame<'a> {
    pub fn collect(scene: &'a Scene) -> Self {
        let mut frame = Frame::default();
        scene.traverse(&mut |node, world| Render::from(node).set_pipelines(world, &mut frame));
        frame
    }

    pub fn lights_uniform(&self) -> LightsUniform {
        LightsUniform::from_lights(self.lights.iter().map(|(light, position)| (*light, *position)))
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    object: ObjectBinding,
}

impl GpuMesh {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        geometry: &Geometry,
        uniform: ObjectUniform,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices.len() as u32,
            object: ObjectBinding::new(device, layout, uniform),
        }
    }
}

struct GpuLines {
    vertex_buffer: wgpu::Buffer,
    num_vertices: u32,
    object: ObjectBinding,
}

impl GpuLines {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        vertices: &[LineVertex],
        uniform: ObjectUniform,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Line Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vertex_buffer,
            num_vertices: vertices.len() as u32,
            object: ObjectBinding::new(device, layout, uniform),
        }
    }
}

/// The wgpu implementation of [`SceneRenderer`].
pub struct Renderer {
    ctx: Context,
    camera: CameraResources,
    lights: LightResources,
    object_layout: wgpu::BindGroupLayout,
    lambert_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    meshes: HashMap<u32, GpuMesh>,
    lines: HashMap<u32, GpuLines>,
    frames_rendered: u64,
}

impl Renderer {
    pub fn new(ctx: Context) -> Self {
        let camera = CameraResources::new(&ctx.device);
        let lights = LightResources::new(&ctx.device);
        let object_layout = mk_object_bind_group_layout(&ctx.device);
        let lambert_pipeline = mk_lambert_pipeline(
            &ctx.device,
            &ctx.config,
            ctx.sample_count,
            &camera.bind_group_layout,
            &lights.bind_group_layout,
            &object_layout,
        );
        let line_pipeline = mk_line_pipeline(
            &ctx.device,
            &ctx.config,
            ctx.sample_count,
            &camera.bind_group_layout,
            &object_layout,
        );
        log::info!(
            "Renderer bound to a {}x{} target at pixel ratio {}",
            ctx.config.width,
            ctx.config.height,
            ctx.pixel_ratio
        );
        Self {
            ctx,
            camera,
            lights,
            object_layout,
            lambert_pipeline,
            line_pipeline,
            meshes: HashMap::new(),
            lines: HashMap::new(),
            frames_rendered: 0,
        }
    }

    /// Renderer drawing into an offscreen texture, see [`Renderer::read_pixels`].
    pub async fn headless(width: u32, height: u32) -> anyhow::Result<Self> {
        Ok(Self::new(Context::headless(width, height).await?))
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Drawable size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.ctx.config.width, self.ctx.config.height)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn upload(&mut self, frame: &Frame) {
        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        for (mesh, world) in &frame.meshes {
            let uniform = ObjectUniform::new(world, mesh.material);
            match self.meshes.get(&mesh.id) {
                Some(gpu) => gpu.object.write(queue, uniform),
                None if mesh.geometry.is_empty() => (),
                None => {
                    log::debug!(
                        "Uploading mesh {} ({} triangles)",
                        mesh.id,
                        mesh.geometry.triangle_count()
                    );
                    let gpu = GpuMesh::new(device, &self.object_layout, mesh.geometry, uniform);
                    self.meshes.insert(mesh.id, gpu);
                }
            }
        }
        for (id, vertices, world) in &frame.lines {
            let uniform = ObjectUniform::unlit(world);
            match self.lines.get(id) {
                Some(gpu) => gpu.object.write(queue, uniform),
                None => {
                    let gpu = GpuLines::new(device, &self.object_layout, vertices, uniform);
                    self.lines.insert(*id, gpu);
                }
            }
        }
    }

    /// Draws one frame. Surface errors are handed to the caller.
    pub fn try_render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = Frame::collect(scene);
        self.camera.write(&self.ctx.queue, camera);
        self.lights.write(&self.ctx.queue, frame.lights_uniform());
        self.upload(&frame);

        let (output, view) = match &self.ctx.target {
            Target::Surface(surface) => {
                let output = surface.get_current_texture()?;
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                (Some(output), view)
            }
            Target::Offscreen(texture) => (None, texture.view.clone()),
        };
        let multisampled = self.ctx.sample_count > 1;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: if multisampled {
                        &self.ctx.msaa_texture.view
                    } else {
                        &view
                    },
                    resolve_target: if multisampled { Some(&view) } else { None },
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.line_pipeline);
            render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
            for (id, _, _) in &frame.lines {
                if let Some(lines) = self.lines.get(id) {
                    render_pass.set_bind_group(1, &lines.object.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, lines.vertex_buffer.slice(..));
                    render_pass.draw(0..lines.num_vertices, 0..1);
                }
            }

            render_pass.set_pipeline(&self.lambert_pipeline);
            render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
            render_pass.set_bind_group(1, &self.lights.bind_group, &[]);
            for (mesh, _) in &frame.meshes {
                if let Some(gpu) = self.meshes.get(&mesh.id) {
                    render_pass.set_bind_group(2, &gpu.object.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..gpu.num_indices, 0, 0..1);
                }
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        if let Some(output) = output {
            output.present();
        }
        self.frames_rendered += 1;
        Ok(())
    }

    /// Copies the last offscreen frame back to the CPU.
    ///
    /// Only available for renderers created with [`Renderer::headless`].
    pub fn read_pixels(&self) -> anyhow::Result<image::RgbaImage> {
        let Target::Offscreen(texture) = &self.ctx.target else {
            anyhow::bail!("Pixels can only be read back from a headless renderer");
        };
        let (width, height) = self.size();
        let unpadded_bytes_per_row = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read-back Buffer"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read-back Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(iter::once(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            // the receiver only goes away if the read-back was abandoned
            let _ = tx.send(result);
        });
        self.ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        futures::executor::block_on(rx.receive())
            .ok_or_else(|| anyhow::anyhow!("The read-back buffer was never mapped"))??;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(padded_bytes_per_row as usize)
                .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
                .copied()
                .collect::<Vec<u8>>()
        };
        output_buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow::anyhow!("Read-back size does not match {}x{}", width, height))
    }
}

impl SceneRenderer for Renderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        match self.try_render(scene, camera) {
            Ok(()) => (),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.ctx.reconfigure();
            }
            Err(e) => log::error!("Unable to render {}", e),
        }
    }
}
