//! Render pipelines and the uniforms they bind.
//!
//! - `basic`: the Lambert triangle pipeline, the shared pipeline builder and per-object uniforms
//! - `light`: ambient and point light uniform buffer
//! - `line`: unlit line list pipeline for helpers

pub mod basic;
pub mod light;
pub mod line;
