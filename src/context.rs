//! GPU context: device, queue and the colour target frames are drawn into.
//!
//! A context is bound to exactly one target for its lifetime, either a window
//! surface or (for tests and tooling) an offscreen texture.

use std::sync::Arc;

use winit::window::Window;

use crate::{data_structures::texture::Texture, settings};

/// Where finished frames go.
#[derive(Debug)]
pub enum Target {
    Surface(wgpu::Surface<'static>),
    Offscreen(Texture),
}

#[derive(Debug)]
pub struct Context {
    pub(crate) target: Target,
    pub(crate) depth_texture: Texture,
    pub(crate) msaa_texture: Texture,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    /// Device pixel ratio, read once when the context is created.
    pub pixel_ratio: f64,
    pub sample_count: u32,
    pub clear_colour: wgpu::Color,
}

impl Context {
    /// Binds a new context to `window`, sized to its full inner area in physical pixels.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let pixel_ratio = window.scale_factor();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders light in linear space and rely on an sRGB surface for encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("The surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface configured at {}x{} (format {:?})",
            config.width,
            config.height,
            config.format
        );

        Ok(Self::from_parts(
            Target::Surface(surface),
            device,
            queue,
            config,
            pixel_ratio,
        ))
    }

    /// Creates a context that renders into an offscreen `width` x `height` texture.
    pub async fn headless(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter).await?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let output =
            Texture::create_readback_target(&device, [config.width, config.height], config.format);
        Ok(Self::from_parts(
            Target::Offscreen(output),
            device,
            queue,
            config,
            1.0,
        ))
    }

    fn from_parts(
        target: Target,
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: wgpu::SurfaceConfiguration,
        pixel_ratio: f64,
    ) -> Self {
        let sample_count = settings::MSAA_SAMPLES;
        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_texture = Texture::create_msaa_texture(
            &device,
            [config.width, config.height],
            sample_count,
            config.format,
        );
        let [r, g, b] = settings::hex_to_linear(settings::CLEAR_COLOR);
        let clear_colour = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: settings::CLEAR_ALPHA,
        };
        Self {
            target,
            depth_texture,
            msaa_texture,
            device,
            queue,
            config,
            pixel_ratio,
            sample_count,
            clear_colour,
        }
    }

    /// Reconfigures the surface after it was lost or went out of date.
    ///
    /// The size stays what it was at creation; the viewer does not follow resizes.
    pub fn reconfigure(&mut self) {
        if let Target::Surface(surface) = &self.target {
            surface.configure(&self.device, &self.config);
        }
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features, so if
            // we're building for the web we'll have to disable some.
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            ..Default::default()
        })
        .await?;
    Ok((device, queue))
}
