//! Application shell and event loop.
//!
//! The shell owns the window, the async runtime and the [`Viewer`]. It turns
//! winit events into viewer calls:
//!
//! 1. `resumed` creates the window and GPU context, builds the viewer, arms the
//!    first frame and starts the asset load
//! 2. `RedrawRequested` is the animation frame, at most one per display
//!    refresh; [`FramePacer`] sleeps the loop between frames
//! 3. cursor, button and wheel events become controller input
//! 4. the finished load arrives as [`ViewerEvent::AssetLoaded`] through the
//!    event loop proxy
//!
//! Natively the load runs on a tokio runtime owned by the app; on the web it
//! runs under `wasm_bindgen_futures::spawn_local`.

use std::{fmt::Debug, sync::Arc, time::Duration};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    context::Context,
    controls::PointerButton,
    render::Renderer,
    resources::{ColladaLoader, collada::ColladaAsset},
    viewer::{FrameScheduler, Viewer},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Pixels of smooth scrolling that count as one wheel step.
const PIXELS_PER_WHEEL_STEP: f64 = 50.0;

/// Refresh rate assumed when the monitor does not report one.
const DEFAULT_REFRESH_MILLIHERTZ: u32 = 60_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    /// No frame is armed.
    Idle,
    /// The armed frame may run now.
    Due,
    /// The armed frame runs once this much time has passed.
    Wait(Duration),
}

/// Spaces animation frames at least one display refresh apart.
///
/// An idle frame presents nothing, so vsync cannot throttle the loop; the
/// pacer measures the time since the last frame instead.
#[derive(Clone, Debug)]
pub struct FramePacer {
    interval: Duration,
    armed: bool,
    last_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed: false,
            last_frame: None,
        }
    }

    /// Pacer for a display refreshing at `millihertz`, 60 Hz if unknown.
    pub fn for_refresh_rate(millihertz: Option<u32>) -> Self {
        let millihertz = millihertz
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_REFRESH_MILLIHERTZ);
        Self::new(Duration::from_micros(1_000_000_000 / millihertz as u64))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn poll(&self, now: Instant) -> Pace {
        if !self.armed {
            return Pace::Idle;
        }
        let Some(last) = self.last_frame else {
            return Pace::Due;
        };
        let elapsed = if now > last {
            now.duration_since(last)
        } else {
            Duration::ZERO
        };
        if elapsed >= self.interval {
            Pace::Due
        } else {
            Pace::Wait(self.interval - elapsed)
        }
    }

    /// Claims the armed frame if it is due. Redraws the platform asks for on
    /// its own, or that arrive early, are not animation frames.
    pub fn begin_frame(&mut self, now: Instant) -> bool {
        if self.poll(now) != Pace::Due {
            return false;
        }
        self.armed = false;
        self.last_frame = Some(now);
        true
    }
}

/// Schedules animation frames as paced winit redraws.
#[derive(Debug)]
pub struct WindowScheduler {
    window: Arc<Window>,
    pacer: FramePacer,
}

impl WindowScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        let refresh_rate = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz());
        let pacer = FramePacer::for_refresh_rate(refresh_rate);
        log::info!("Animation frames every {:?}", pacer.interval());
        Self { window, pacer }
    }

    /// Sets how long the event loop may sleep before the next frame.
    fn pace(&self, event_loop: &ActiveEventLoop) {
        match self.pacer.poll(Instant::now()) {
            Pace::Idle => event_loop.set_control_flow(ControlFlow::Wait),
            Pace::Due => {
                event_loop.set_control_flow(ControlFlow::Wait);
                self.window.request_redraw();
            }
            Pace::Wait(remaining) => {
                event_loop.set_control_flow(ControlFlow::wait_duration(remaining))
            }
        }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        self.pacer.arm();
    }
}

pub type WindowViewer = Viewer<Renderer, WindowScheduler>;

pub enum ViewerEvent {
    #[cfg(target_arch = "wasm32")]
    Initialized(anyhow::Result<Box<WindowViewer>>),
    AssetLoaded(anyhow::Result<ColladaAsset>),
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(result) => f
                .debug_tuple("Initialized")
                .field(&result.as_ref().map(|_| "Viewer"))
                .finish(),
            Self::AssetLoaded(result) => f
                .debug_tuple("AssetLoaded")
                .field(&result.as_ref().map(|asset| asset.children().len()))
                .finish(),
        }
    }
}

async fn create_viewer(window: Arc<Window>) -> anyhow::Result<Box<WindowViewer>> {
    let ctx = Context::new(window.clone()).await?;
    let renderer = Renderer::new(ctx);
    let (width, height) = renderer.size();
    let viewer = Viewer::new(width, height, renderer, WindowScheduler::new(window))?;
    Ok(Box::new(viewer))
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    loader: ColladaLoader,
    viewer: Option<Box<WindowViewer>>,
    initializing: bool,
    cursor: [f32; 2],
    load_started: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            loader: ColladaLoader::new(),
            viewer: None,
            initializing: false,
            cursor: [0.0; 2],
            load_started: Instant::now(),
        })
    }

    fn on_viewer_ready(&mut self, event_loop: &ActiveEventLoop, viewer: anyhow::Result<Box<WindowViewer>>) {
        let mut viewer = match viewer {
            Ok(viewer) => viewer,
            Err(e) => {
                log::error!("Cannot create the viewer: {:#}", e);
                event_loop.exit();
                return;
            }
        };
        viewer.start();
        if let Some(load) = viewer.begin_load(&self.loader) {
            self.load_started = Instant::now();
            let proxy = self.proxy.clone();
            let send = move |result| {
                if let Err(e) = proxy.send_event(ViewerEvent::AssetLoaded(result)) {
                    log::error!("The event loop closed before the model arrived: {}", e);
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            self.async_runtime.spawn(async move { send(load.await) });
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(async move { send(load.await) });
        }
        self.viewer = Some(viewer);
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() || self.initializing {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("Collada Viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.initializing = true;

        #[cfg(not(target_arch = "wasm32"))]
        {
            let viewer = self.async_runtime.block_on(create_viewer(window));
            self.initializing = false;
            self.on_viewer_ready(event_loop, viewer);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let viewer = create_viewer(window).await;
                assert!(proxy.send_event(ViewerEvent::Initialized(viewer)).is_ok());
            });
        }
    }

    fn user_event(&mut self, #[allow(unused)] event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(viewer) => {
                self.initializing = false;
                self.on_viewer_ready(event_loop, viewer);
            }
            ViewerEvent::AssetLoaded(result) => {
                log::info!("Model request finished after {:?}", self.load_started.elapsed());
                if let Some(viewer) = &mut self.viewer {
                    viewer.complete_load(result);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let viewer = match &mut self.viewer {
            Some(viewer) => viewer,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => {
                if viewer.scheduler_mut().pacer.begin_frame(Instant::now()) {
                    viewer.on_animation_frame();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = [position.x as f32, position.y as f32];
                viewer.pointer_move(self.cursor);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Primary,
                    MouseButton::Right => PointerButton::Secondary,
                    MouseButton::Middle => PointerButton::Auxiliary,
                    _ => return,
                };
                if button_state.is_pressed() {
                    viewer.pointer_down(button, self.cursor);
                } else {
                    viewer.pointer_up(button);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        (position.y / PIXELS_PER_WHEEL_STEP) as f32
                    }
                };
                viewer.wheel(steps);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(viewer) = &self.viewer {
            viewer.scheduler().pace(event_loop);
        }
    }
}

/// Sets up logging and runs the viewer until its window is closed.
pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
