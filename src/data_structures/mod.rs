//! Viewer data structures: scene graph, geometry, lights, materials.
//!
//! - `scene_graph` is the node tree rooted at the single [`scene_graph::Scene`]
//! - `geometry` holds CPU-side vertices/indices and their GPU vertex layouts
//! - `light` contains ambient/point lights and their uniform packing
//! - `material` is the Lambert material with the vertex-colour switch
//! - `helpers` has the axes marker
//! - `transform` holds per-node position/rotation/scale
//! - `texture` wraps depth and multisample render targets

pub mod geometry;
pub mod helpers;
pub mod light;
pub mod material;
pub mod scene_graph;
pub mod texture;
pub mod transform;
