//! Debug helpers drawn as unlit lines.

use crate::{
    data_structures::{
        geometry::LineVertex,
        scene_graph::{NodeKind, SceneNode, next_node_id},
        transform::Transform,
    },
    settings,
};

/// Axis marker ("jack"): three colour-coded lines from the origin along +X
/// (red), +Y (green) and +Z (blue).
pub struct AxesHelper {
    id: u32,
    size: f32,
    vertices: Vec<LineVertex>,
    transform: Transform,
    children: Vec<Box<dyn SceneNode>>,
}

impl AxesHelper {
    pub fn new(size: f32) -> Self {
        let line = |to: [f32; 3], start: [f32; 3], end: [f32; 3]| {
            [
                LineVertex {
                    position: [0.0; 3],
                    color: start.map(settings::srgb_to_linear),
                },
                LineVertex {
                    position: to,
                    color: end.map(settings::srgb_to_linear),
                },
            ]
        };
        let vertices = [
            line([size, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.6, 0.0]),
            line([0.0, size, 0.0], [0.0, 1.0, 0.0], [0.6, 1.0, 0.0]),
            line([0.0, 0.0, size], [0.0, 0.0, 1.0], [0.0, 0.6, 1.0]),
        ]
        .concat();
        Self {
            id: next_node_id(),
            size,
            vertices,
            transform: Transform::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn vertices(&self) -> &[LineVertex] {
        &self.vertices
    }
}

impl SceneNode for AxesHelper {
    fn name(&self) -> &str {
        "AxesHelper"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Helper
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

    fn as_lines(&self) -> Option<(u32, &[LineVertex])> {
        Some((self.id, &self.vertices))
    }
}
