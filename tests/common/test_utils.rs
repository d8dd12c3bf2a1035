#![allow(dead_code)]

use std::path::PathBuf;

use collada_viewer::{
    camera::PerspectiveCamera,
    controls::OrbitControls,
    data_structures::scene_graph::Scene,
    render::SceneRenderer,
    viewer::{FrameScheduler, Viewer},
};

/// What the renderer saw when it was asked to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub scene_len: usize,
    pub camera_position: [f32; 3],
    pub camera_target: [f32; 3],
}

/// Renderer that only records its calls.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    records: Vec<RenderRecord>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[RenderRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&RenderRecord> {
        self.records.last()
    }
}

impl SceneRenderer for RecordingRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        self.records.push(RenderRecord {
            scene_len: scene.len(),
            camera_position: camera.position.into(),
            camera_target: camera.target.into(),
        });
    }
}

#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: usize,
}

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl FrameScheduler for CountingScheduler {
    fn request_frame(&mut self) {
        self.requests += 1;
    }
}

pub type TestViewer = Viewer<RecordingRenderer, CountingScheduler>;

pub fn test_viewer(width: u32, height: u32) -> TestViewer {
    Viewer::new(
        width,
        height,
        RecordingRenderer::new(),
        CountingScheduler::default(),
    )
    .unwrap()
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

pub fn test_camera() -> PerspectiveCamera {
    PerspectiveCamera::new(cgmath::Deg(75.0), 1.5, 0.1, 1000.0)
        .unwrap()
        .with_position([3.0, 2.0, 3.0])
        .look_at([0.0, 1.16, 0.0])
}

/// Steps the controls until all residual motion is gone; returns the number of steps.
pub fn settle(controls: &mut OrbitControls, camera: &mut PerspectiveCamera) -> usize {
    let mut ticks = 0;
    while !controls.is_at_rest() {
        controls.update(camera);
        ticks += 1;
        assert!(ticks < 10_000, "controls never came to rest");
    }
    ticks
}

pub fn assert_close(actual: [f32; 3], expected: [f32; 3], epsilon: f32) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() <= epsilon,
            "expected {:?}, got {:?} (epsilon {})",
            expected,
            actual,
            epsilon
        );
    }
}
