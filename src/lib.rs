//! collada-viewer
//!
//! An interactive viewer for a single vertex-coloured COLLADA mesh, running
//! natively and in the browser (WebGL2 through wgpu). The model is shown with
//! Lambert shading under an ambient and a point light, next to an axes marker,
//! and can be inspected with damped orbit, pan and zoom controls.
//!
//! High-level modules
//! - `camera`: perspective camera and its uniform
//! - `controls`: orbit/pan/dolly controller with damping and change events
//! - `context`: GPU device, queue and render target
//! - `data_structures`: scene graph, geometry, lights, materials, helpers
//! - `flow`: winit application shell and the `run` entry point
//! - `pipelines`: Lambert and line pipelines with their uniforms
//! - `render`: scene batching and the wgpu renderer
//! - `resources`: asset loading and COLLADA parsing
//! - `settings`: fixed camera, light and renderer constants
//! - `viewer`: the viewer state and its reactions to input, frames and loads
//!

pub mod camera;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod settings;
pub mod viewer;

pub use flow::run;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&e.to_string()))
}
