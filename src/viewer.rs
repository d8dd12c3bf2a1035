//! The viewer: one scene, one camera, one set of controls, one model.
//!
//! [`Viewer`] owns every piece of mutable state and is driven entirely from
//! the outside: the shell feeds it pointer input, animation frames and the
//! result of the single asset load. Rendering and frame scheduling go through
//! the [`SceneRenderer`] and [`FrameScheduler`] traits so the whole flow can
//! run without a window or GPU.
//!
//! Renders happen on exactly two occasions: whenever the controls report a
//! camera change, and once right after the loaded model is attached.

use std::{future::Future, sync::Arc};

use crate::{
    camera::PerspectiveCamera,
    controls::{ControlEvent, OrbitControls, PointerButton},
    data_structures::{
        helpers::AxesHelper,
        light::LightNode,
        material::LambertMaterial,
        scene_graph::Scene,
    },
    render::SceneRenderer,
    resources::{ColladaLoader, collada::ColladaAsset},
    settings,
};

/// Arms the next animation frame.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    Pending,
    /// The model's first node is part of the scene.
    Attached,
    /// The file parsed but had nothing to attach.
    Empty,
    Failed(String),
}

pub struct Viewer<R: SceneRenderer, F: FrameScheduler> {
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    renderer: R,
    scheduler: F,
    material: Arc<LambertMaterial>,
    load_state: LoadState,
}

impl<R: SceneRenderer, F: FrameScheduler> Viewer<R, F> {
    /// Builds the scene for a `width` x `height` surface.
    ///
    /// The aspect ratio is fixed here and never re-queried.
    pub fn new(width: u32, height: u32, renderer: R, scheduler: F) -> anyhow::Result<Self> {
        let camera = PerspectiveCamera::for_surface(
            cgmath::Deg(settings::CAMERA_FOV_DEG),
            width,
            height,
            settings::CAMERA_NEAR,
            settings::CAMERA_FAR,
        )?
        .with_position(settings::CAMERA_POSITION)
        .look_at(settings::ORBIT_TARGET);

        let mut scene = Scene::new();
        scene.add(Box::new(LightNode::ambient(settings::AMBIENT_COLOR)));
        scene.add(Box::new(
            LightNode::point(
                settings::POINT_LIGHT_COLOR,
                settings::POINT_LIGHT_INTENSITY,
                settings::POINT_LIGHT_DISTANCE,
                settings::POINT_LIGHT_DECAY,
            )
            .with_position(settings::POINT_LIGHT_POSITION),
        ));
        scene.add(Box::new(AxesHelper::new(settings::AXES_SIZE)));

        let controls = OrbitControls::new(&camera, height);
        let material = Arc::new(LambertMaterial::new("Model Lambert").with_vertex_colors(true));
        log::info!(
            "Viewer initialized at {}x{} (aspect {:.3})",
            width,
            height,
            camera.aspect()
        );

        Ok(Self {
            scene,
            camera,
            controls,
            renderer,
            scheduler,
            material,
            load_state: LoadState::NotStarted,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }

    /// The material every loaded model is shaded with.
    pub fn material(&self) -> &Arc<LambertMaterial> {
        &self.material
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// Arms the first animation frame.
    pub fn start(&mut self) {
        self.scheduler.request_frame();
    }

    /// One display refresh: re-arm, then advance the controls by one step.
    pub fn on_animation_frame(&mut self) {
        self.scheduler.request_frame();
        self.controls.update(&mut self.camera);
        self.dispatch_control_events();
    }

    pub fn render_scene(&mut self) {
        self.renderer.render(&self.scene, &self.camera);
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: [f32; 2]) {
        self.controls.pointer_down(button, position);
        self.dispatch_control_events();
    }

    pub fn pointer_move(&mut self, position: [f32; 2]) {
        self.controls.pointer_move(position, &mut self.camera);
        self.dispatch_control_events();
    }

    pub fn pointer_up(&mut self, button: PointerButton) {
        self.controls.pointer_up(button);
        self.dispatch_control_events();
    }

    pub fn wheel(&mut self, steps: f32) {
        self.controls.wheel(steps, &mut self.camera);
        self.dispatch_control_events();
    }

    fn dispatch_control_events(&mut self) {
        let changes = self
            .controls
            .drain_events()
            .filter(|event| *event == ControlEvent::Change)
            .count();
        for _ in 0..changes {
            self.render_scene();
        }
    }

    /// Starts the one asset request of this viewer.
    ///
    /// Returns `None` if a load was already started. The returned future must be
    /// driven to completion and its output handed to [`Viewer::complete_load`].
    pub fn begin_load(
        &mut self,
        loader: &ColladaLoader,
    ) -> Option<impl Future<Output = anyhow::Result<ColladaAsset>> + use<R, F>> {
        if self.load_state != LoadState::NotStarted {
            log::warn!("The model was already requested ({:?})", self.load_state);
            return None;
        }
        self.load_state = LoadState::Pending;
        let loader = loader.clone();
        Some(async move { loader.load(settings::MESH_PATH).await })
    }

    /// Attaches the first node of a loaded asset and renders.
    ///
    /// The node gets the shared viewer material, is moved into the scene and
    /// the scene is drawn once, in that order.
    pub fn complete_load(&mut self, result: anyhow::Result<ColladaAsset>) {
        if self.load_state != LoadState::Pending {
            log::warn!("Ignoring load completion while {:?}", self.load_state);
            return;
        }
        let mut asset = match result {
            Ok(asset) => asset,
            Err(e) => {
                log::error!("Failed to load {}: {:#}", settings::MESH_PATH, e);
                self.load_state = LoadState::Failed(format!("{e:#}"));
                return;
            }
        };
        let Some(mut node) = asset.take_first_child() else {
            log::warn!("{} contains no nodes, nothing to show", settings::MESH_PATH);
            self.load_state = LoadState::Empty;
            return;
        };
        if !node.set_material(self.material.clone()) {
            log::warn!(
                "First node '{}' is a {:?}, not a mesh; attaching it with its own materials",
                node.name(),
                node.kind()
            );
        }
        self.scene.add(node);
        self.load_state = LoadState::Attached;
        self.render_scene();
    }
}
