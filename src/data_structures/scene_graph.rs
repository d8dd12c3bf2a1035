//! Scene graph and hierarchical scene organization.
//!
//! A [`Scene`] is the single root of everything that gets drawn or lights
//! something. Nodes are boxed [`SceneNode`] trait objects owning their
//! children, so attaching a node moves it into the tree for good; there is no
//! removal and no shared ownership of nodes.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use cgmath::SquareMatrix;

use crate::data_structures::{
    geometry::{Geometry, LineVertex},
    light::Light,
    material::LambertMaterial,
    transform::Transform,
};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique id, used by the renderer to cache GPU buffers per node.
pub fn next_node_id() -> u32 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Mesh,
    Light,
    Helper,
}

/// Borrowed view of a drawable mesh.
pub struct MeshRef<'a> {
    pub id: u32,
    pub geometry: &'a Geometry,
    pub material: &'a LambertMaterial,
}

pub trait SceneNode: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    fn get_local_transform(&self) -> Transform;

    fn set_local_transform(&mut self, transform: Transform);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.get_children_mut().push(child);
    }

    fn material(&self) -> Option<&Arc<LambertMaterial>> {
        None
    }

    /// Replaces the node's material. Returns `false` for nodes that have none.
    fn set_material(&mut self, _material: Arc<LambertMaterial>) -> bool {
        false
    }

    fn as_mesh(&self) -> Option<MeshRef<'_>> {
        None
    }

    fn as_light(&self) -> Option<&Light> {
        None
    }

    fn as_lines(&self) -> Option<(u32, &[LineVertex])> {
        None
    }
}

/// Transform-only node grouping its children.
pub struct ContainerNode {
    name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    transform: Transform,
}

impl ContainerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            transform: Transform::new(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Group
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
}

/// Geometry plus the material it is shaded with.
pub struct MeshNode {
    id: u32,
    name: String,
    geometry: Geometry,
    material: Arc<LambertMaterial>,
    transform: Transform,
    children: Vec<Box<dyn SceneNode>>,
}

impl MeshNode {
    pub fn new(name: &str, geometry: Geometry, material: Arc<LambertMaterial>) -> Self {
        Self {
            id: next_node_id(),
            name: name.to_string(),
            geometry,
            material,
            transform: Transform::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

impl SceneNode for MeshNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Mesh
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

    fn material(&self) -> Option<&Arc<LambertMaterial>> {
        Some(&self.material)
    }

    fn set_material(&mut self, material: Arc<LambertMaterial>) -> bool {
        self.material = material;
        true
    }

    fn as_mesh(&self) -> Option<MeshRef<'_>> {
        Some(MeshRef {
            id: self.id,
            geometry: &self.geometry,
            material: &self.material,
        })
    }
}

/// The root of the scene graph.
#[derive(Default)]
pub struct Scene {
    children: Vec<Box<dyn SceneNode>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `node` into the scene.
    pub fn add(&mut self, node: Box<dyn SceneNode>) {
        log::debug!("Adding {:?} node '{}' to the scene", node.kind(), node.name());
        self.children.push(node);
    }

    pub fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first walk handing every node its world matrix.
    pub fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn SceneNode, &cgmath::Matrix4<f32>)) {
        let root = cgmath::Matrix4::identity();
        for child in &self.children {
            walk(child.as_ref(), &root, visit);
        }
    }

    /// Number of nodes of `kind` reachable from the root.
    pub fn count(&self, kind: NodeKind) -> usize {
        let mut count = 0;
        self.traverse(&mut |node, _| {
            if node.kind() == kind {
                count += 1;
            }
        });
        count
    }
}

fn walk<'a>(
    node: &'a dyn SceneNode,
    parent: &cgmath::Matrix4<f32>,
    visit: &mut dyn FnMut(&'a dyn SceneNode, &cgmath::Matrix4<f32>),
) {
    let world = *parent * node.get_local_transform().to_matrix();
    visit(node, &world);
    for child in node.get_children() {
        walk(child.as_ref(), &world, visit);
    }
}
