//! COLLADA (`.dae`) parsing into scene nodes.
//!
//! Only the static subset a mesh viewer needs is read: geometry with
//! positions, normals and vertex colours, diffuse material colours, ambient and
//! point lights, and the node hierarchy of the instantiated visual scene.
//! Animations, controllers, cameras and textures are ignored.
//!
//! The visual scene becomes the root [`ContainerNode`] of a [`ColladaAsset`].
//! Its `up_axis` and `unit` are applied to the root transform only, so a
//! child taken out of the asset keeps nothing but its own local transform.

use std::{collections::HashMap, sync::Arc};

use cgmath::{Rotation3, SquareMatrix};
use roxmltree::Node;

use crate::{
    data_structures::{
        geometry::{Geometry, ModelVertex},
        light::{Light, LightNode},
        material::LambertMaterial,
        scene_graph::{ContainerNode, MeshNode, SceneNode},
        transform::Transform,
    },
    settings,
};

/// Guards `instance_node` reference cycles.
const MAX_NODE_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ColladaError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("expected a <COLLADA> root element, found <{0}>")]
    NotCollada(String),
    #[error("the document has no visual scene")]
    MissingVisualScene,
    #[error("invalid number '{value}' in <{element}>")]
    InvalidNumber { element: String, value: String },
    #[error("unresolved reference '{0}'")]
    DanglingReference(String),
    #[error("malformed <{element}>: {reason}")]
    Malformed { element: String, reason: String },
}

impl ColladaError {
    fn malformed(element: Node, reason: impl Into<String>) -> Self {
        ColladaError::Malformed {
            element: element.tag_name().name().to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpAxis {
    X,
    #[default]
    Y,
    Z,
}

/// A parsed document.
pub struct ColladaAsset {
    /// The visual scene; its ordered children are the top-level nodes.
    pub scene: ContainerNode,
    pub up_axis: UpAxis,
    /// Metres per file unit.
    pub unit: f32,
}

impl ColladaAsset {
    pub fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.scene.children
    }

    /// Detaches and returns the first top-level node, if there is one.
    pub fn take_first_child(&mut self) -> Option<Box<dyn SceneNode>> {
        if self.scene.children.is_empty() {
            None
        } else {
            Some(self.scene.children.remove(0))
        }
    }
}

/// Parses a COLLADA document.
pub fn parse(text: &str) -> Result<ColladaAsset, ColladaError> {
    let document = roxmltree::Document::parse(text)?;
    let root = document.root_element();
    if root.tag_name().name() != "COLLADA" {
        return Err(ColladaError::NotCollada(root.tag_name().name().to_string()));
    }
    let reader = Reader::new(&document);

    let (up_axis, unit) = match child(root, "asset") {
        Some(asset) => (read_up_axis(asset), read_unit(asset)?),
        None => (UpAxis::default(), 1.0),
    };

    let visual_scene = reader.visual_scene(root)?;
    let mut scene = ContainerNode::new(name_of(visual_scene, "Scene"));
    scene.set_local_transform(root_transform(up_axis, unit));
    for node in elements(visual_scene, "node") {
        scene.children.push(reader.node(node, 0)?);
    }
    log::info!(
        "Parsed COLLADA scene '{}' with {} top-level nodes (up axis {:?}, unit {})",
        scene.name(),
        scene.children.len(),
        up_axis,
        unit
    );
    Ok(ColladaAsset {
        scene,
        up_axis,
        unit,
    })
}

fn root_transform(up_axis: UpAxis, unit: f32) -> Transform {
    let rotation = match up_axis {
        UpAxis::X => cgmath::Quaternion::from_angle_z(cgmath::Deg(90.0)),
        UpAxis::Y => cgmath::Quaternion::from_angle_y(cgmath::Deg(0.0)),
        UpAxis::Z => cgmath::Quaternion::from_angle_x(cgmath::Deg(-90.0)),
    };
    Transform {
        position: cgmath::Vector3::new(0.0, 0.0, 0.0),
        rotation,
        scale: cgmath::Vector3::new(unit, unit, unit),
    }
}

fn read_up_axis(asset: Node) -> UpAxis {
    match child(asset, "up_axis").and_then(|n| n.text()).map(str::trim) {
        Some("X_UP") => UpAxis::X,
        Some("Z_UP") => UpAxis::Z,
        Some("Y_UP") | None => UpAxis::Y,
        Some(other) => {
            log::warn!("Unknown up axis '{}', assuming Y_UP", other);
            UpAxis::Y
        }
    }
}

fn read_unit(asset: Node) -> Result<f32, ColladaError> {
    let Some(meter) = child(asset, "unit").and_then(|n| n.attribute("meter")) else {
        return Ok(1.0);
    };
    let unit = parse_number::<f32>("unit", meter)?;
    if unit > 0.0 && unit.is_finite() {
        Ok(unit)
    } else {
        log::warn!("Ignoring non-positive unit {}", unit);
        Ok(1.0)
    }
}

/// Float data of a `<source>` with its accessor stride.
struct Source {
    data: Vec<f32>,
    stride: usize,
}

impl Source {
    fn get(&self, index: u32, len: usize) -> Option<&[f32]> {
        let start = index as usize * self.stride;
        self.data.get(start..start + len)
    }
}

#[derive(Clone, Copy)]
struct Input<'a, 'input> {
    semantic: &'a str,
    source: Node<'a, 'input>,
    offset: usize,
}

/// Per-corner attribute sources of one primitive.
#[derive(Default)]
struct Attributes<'a, 'input> {
    position: Option<Input<'a, 'input>>,
    normal: Option<Input<'a, 'input>>,
    color: Option<Input<'a, 'input>>,
}

struct Reader<'a, 'input> {
    ids: HashMap<&'a str, Node<'a, 'input>>,
}

impl<'a, 'input> Reader<'a, 'input> {
    fn new(document: &'a roxmltree::Document<'input>) -> Self {
        let ids = document
            .descendants()
            .filter(|n| n.is_element())
            .filter_map(|n| n.attribute("id").map(|id| (id, n)))
            .collect();
        Self { ids }
    }

    fn resolve(&self, url: &str) -> Result<Node<'a, 'input>, ColladaError> {
        self.ids
            .get(url.trim_start_matches('#'))
            .copied()
            .ok_or_else(|| ColladaError::DanglingReference(url.to_string()))
    }

    fn resolve_attr(&self, node: Node<'a, 'input>, attr: &str) -> Result<Node<'a, 'input>, ColladaError> {
        let url = node
            .attribute(attr)
            .ok_or_else(|| ColladaError::malformed(node, format!("missing '{attr}' attribute")))?;
        self.resolve(url)
    }

    /// The scene instantiated by `<scene>`, or the first one in the library.
    fn visual_scene(&self, root: Node<'a, 'input>) -> Result<Node<'a, 'input>, ColladaError> {
        if let Some(instance) = child(root, "scene").and_then(|s| child(s, "instance_visual_scene")) {
            return self.resolve_attr(instance, "url");
        }
        child(root, "library_visual_scenes")
            .and_then(|library| child(library, "visual_scene"))
            .ok_or(ColladaError::MissingVisualScene)
    }

    fn node(&self, node: Node<'a, 'input>, depth: usize) -> Result<Box<dyn SceneNode>, ColladaError> {
        if depth > MAX_NODE_DEPTH {
            return Err(ColladaError::malformed(node, "node hierarchy is too deep or cyclic"));
        }
        let name = name_of(node, "node");
        let transform = Transform::from_matrix(&node_matrix(node)?);

        let mut meshes = Vec::new();
        let mut others: Vec<Box<dyn SceneNode>> = Vec::new();
        for element in node.children().filter(Node::is_element) {
            match element.tag_name().name() {
                "instance_geometry" => {
                    let geometry = self.resolve_attr(element, "url")?;
                    let bindings = self.material_bindings(element)?;
                    meshes.extend(self.meshes(geometry, &bindings)?);
                }
                "instance_light" => {
                    let light = self.resolve_attr(element, "url")?;
                    if let Some(light) = self.light(light)? {
                        others.push(Box::new(light));
                    }
                }
                "instance_node" => {
                    let target = self.resolve_attr(element, "url")?;
                    others.push(self.node(target, depth + 1)?);
                }
                "node" => others.push(self.node(element, depth + 1)?),
                "instance_camera" | "instance_controller" => {
                    log::debug!("Skipping <{}> in node '{}'", element.tag_name().name(), name);
                }
                _ => (),
            }
        }

        if meshes.len() == 1 && others.is_empty() {
            if let Some(mut mesh) = meshes.pop() {
                mesh.set_name(name);
                mesh.set_local_transform(transform);
                return Ok(Box::new(mesh));
            }
        }
        let mut group = ContainerNode::new(name);
        group.set_local_transform(transform);
        group
            .children
            .extend(meshes.into_iter().map(|m| Box::new(m) as Box<dyn SceneNode>));
        group.children.extend(others);
        Ok(Box::new(group))
    }

    /// `instance_material` symbol to diffuse colour.
    fn material_bindings(
        &self,
        instance: Node<'a, 'input>,
    ) -> Result<HashMap<&'a str, LambertMaterial>, ColladaError> {
        let mut bindings = HashMap::new();
        let Some(technique) = child(instance, "bind_material").and_then(|b| child(b, "technique_common")) else {
            return Ok(bindings);
        };
        for binding in elements(technique, "instance_material") {
            let symbol = binding
                .attribute("symbol")
                .ok_or_else(|| ColladaError::malformed(binding, "missing 'symbol' attribute"))?;
            let material = self.resolve_attr(binding, "target")?;
            bindings.insert(symbol, self.material(material)?);
        }
        Ok(bindings)
    }

    fn material(&self, material: Node<'a, 'input>) -> Result<LambertMaterial, ColladaError> {
        let name = name_of(material, "material");
        let mut lambert = LambertMaterial::new(name);
        let Some(instance) = child(material, "instance_effect") else {
            return Ok(lambert);
        };
        let effect = self.resolve_attr(instance, "url")?;
        let shading = effect
            .descendants()
            .find(|n| matches!(n.tag_name().name(), "lambert" | "phong" | "blinn" | "constant"));
        let color = shading
            .and_then(|s| child(s, "diffuse").or_else(|| child(s, "emission")))
            .and_then(|d| child(d, "color"));
        if let Some(color) = color {
            let values = floats(color)?;
            if values.len() < 3 {
                return Err(ColladaError::malformed(color, "expected at least 3 components"));
            }
            lambert.color = [values[0], values[1], values[2]].map(settings::srgb_to_linear);
        }
        Ok(lambert)
    }

    fn light(&self, light: Node<'a, 'input>) -> Result<Option<LightNode>, ColladaError> {
        let name = name_of(light, "light");
        let Some(technique) = child(light, "technique_common") else {
            return Ok(None);
        };
        let Some(kind) = technique.children().find(Node::is_element) else {
            return Ok(None);
        };
        let color = match child(kind, "color") {
            Some(color) => {
                let values = floats(color)?;
                if values.len() < 3 {
                    return Err(ColladaError::malformed(color, "expected 3 components"));
                }
                [values[0], values[1], values[2]].map(settings::srgb_to_linear)
            }
            None => [1.0; 3],
        };
        let light = match kind.tag_name().name() {
            "ambient" => Light::Ambient { color },
            "point" => Light::Point {
                color,
                intensity: 1.0,
                distance: 0.0,
                decay: if has_quadratic_falloff(kind)? { 2.0 } else { 1.0 },
            },
            other => {
                log::warn!("Unsupported {} light '{}' skipped", other, name);
                return Ok(None);
            }
        };
        Ok(Some(LightNode::new(name, light)))
    }

    /// One mesh node per supported primitive of `geometry`.
    fn meshes(
        &self,
        geometry: Node<'a, 'input>,
        bindings: &HashMap<&'a str, LambertMaterial>,
    ) -> Result<Vec<MeshNode>, ColladaError> {
        let name = name_of(geometry, "geometry");
        let Some(mesh) = child(geometry, "mesh") else {
            log::warn!("Geometry '{}' has no <mesh>, skipping", name);
            return Ok(Vec::new());
        };

        // attributes shared by every primitive through the VERTEX input
        let mut shared = Attributes::default();
        if let Some(vertices) = child(mesh, "vertices") {
            for input in elements(vertices, "input") {
                let source = self.resolve_attr(input, "source")?;
                let input = Input {
                    semantic: input.attribute("semantic").unwrap_or(""),
                    source,
                    offset: 0,
                };
                match input.semantic {
                    "POSITION" => shared.position = Some(input),
                    "NORMAL" => shared.normal = Some(input),
                    "COLOR" => shared.color = Some(input),
                    _ => (),
                }
            }
        }

        let mut nodes = Vec::new();
        for primitive in mesh.children().filter(Node::is_element) {
            let kind = primitive.tag_name().name();
            match kind {
                "triangles" | "polylist" | "polygons" => (),
                "lines" | "linestrips" | "trifans" | "tristrips" => {
                    log::warn!("Unsupported <{}> primitive in '{}' skipped", kind, name);
                    continue;
                }
                _ => continue,
            }
            let geometry = self.primitive(primitive, &shared)?;
            if geometry.is_empty() {
                log::warn!("Primitive <{}> in '{}' has no triangles", kind, name);
                continue;
            }
            let material = primitive
                .attribute("material")
                .and_then(|symbol| {
                    bindings.get(symbol).cloned().or_else(|| {
                        // some exporters reference the material id directly
                        self.ids
                            .get(symbol)
                            .and_then(|node| self.material(*node).ok())
                    })
                })
                .unwrap_or_default();
            let has_colors = geometry.vertices.iter().any(|v| v.color != [1.0; 3]);
            log::debug!(
                "Mesh '{}': {} vertices, {} triangles, vertex colours: {}",
                name,
                geometry.vertices.len(),
                geometry.triangle_count(),
                has_colors
            );
            nodes.push(MeshNode::new(
                name,
                geometry,
                Arc::new(material.with_vertex_colors(has_colors)),
            ));
        }
        Ok(nodes)
    }

    fn primitive(&self, primitive: Node<'a, 'input>, shared: &Attributes<'a, 'input>) -> Result<Geometry, ColladaError> {
        let mut attributes = Attributes::default();
        let mut stride = 0;
        for input in elements(primitive, "input") {
            let semantic = input.attribute("semantic").unwrap_or("");
            let offset = match input.attribute("offset") {
                Some(offset) => parse_number::<usize>("input", offset)?,
                None => 0,
            };
            stride = stride.max(offset + 1);
            let source = self.resolve_attr(input, "source")?;
            match semantic {
                "VERTEX" => {
                    let position = shared
                        .position
                        .ok_or_else(|| ColladaError::malformed(source, "<vertices> without POSITION"))?;
                    attributes.position = Some(Input { offset, ..position });
                    attributes.normal = shared.normal.map(|n| Input { offset, ..n });
                    attributes.color = shared.color.map(|c| Input { offset, ..c });
                }
                "NORMAL" => {
                    attributes.normal = Some(Input {
                        semantic,
                        source,
                        offset,
                    })
                }
                "COLOR" => {
                    attributes.color = Some(Input {
                        semantic,
                        source,
                        offset,
                    })
                }
                _ => (),
            }
        }
        let position = attributes
            .position
            .ok_or_else(|| ColladaError::malformed(primitive, "no VERTEX input"))?;
        let stride = stride.max(1);

        let polygons = polygon_indices(primitive, stride)?;

        let positions = self.source(position.source, 3)?;
        let normals = attributes.normal.map(|n| self.source(n.source, 3)).transpose()?;
        let colors = attributes.color.map(|c| self.source(c.source, 3)).transpose()?;

        let mut geometry = Geometry::default();
        let mut corners: HashMap<&[u32], u32> = HashMap::new();
        for polygon in &polygons {
            let mut corner_indices = Vec::with_capacity(polygon.len() / stride);
            for corner in polygon.chunks_exact(stride) {
                let index = match corners.get(corner) {
                    Some(index) => *index,
                    None => {
                        let vertex = ModelVertex {
                            position: read3(&positions, corner[position.offset], primitive)?,
                            normal: match (&normals, attributes.normal) {
                                (Some(source), Some(input)) => read3(source, corner[input.offset], primitive)?,
                                _ => [0.0; 3],
                            },
                            color: match (&colors, attributes.color) {
                                (Some(source), Some(input)) => {
                                    read3(source, corner[input.offset], primitive)?.map(settings::srgb_to_linear)
                                }
                                _ => [1.0; 3],
                            },
                        };
                        let index = geometry.vertices.len() as u32;
                        geometry.vertices.push(vertex);
                        corners.insert(corner, index);
                        index
                    }
                };
                corner_indices.push(index);
            }
            // fan triangulation
            for i in 1..corner_indices.len().saturating_sub(1) {
                geometry
                    .indices
                    .extend([corner_indices[0], corner_indices[i], corner_indices[i + 1]]);
            }
        }
        if normals.is_none() {
            geometry.compute_vertex_normals();
        }
        Ok(geometry)
    }

    fn source(&self, source: Node<'a, 'input>, min_stride: usize) -> Result<Source, ColladaError> {
        let array = child(source, "float_array")
            .ok_or_else(|| ColladaError::malformed(source, "no <float_array>"))?;
        let data = floats(array)?;
        let stride = match child(source, "technique_common")
            .and_then(|t| child(t, "accessor"))
            .and_then(|a| a.attribute("stride"))
        {
            Some(stride) => parse_number::<usize>("accessor", stride)?,
            None => min_stride,
        };
        if stride < min_stride {
            return Err(ColladaError::malformed(
                source,
                format!("accessor stride {stride} is below {min_stride}"),
            ));
        }
        Ok(Source { data, stride })
    }
}

/// Splits the `<p>` data of a primitive into polygons of `stride`-sized corners.
fn polygon_indices(primitive: Node, stride: usize) -> Result<Vec<Vec<u32>>, ColladaError> {
    match primitive.tag_name().name() {
        "triangles" => {
            let p = match child(primitive, "p") {
                Some(p) => uints(p)?,
                None => Vec::new(),
            };
            Ok(p.chunks_exact(3 * stride).map(<[u32]>::to_vec).collect())
        }
        "polylist" => {
            let p = match child(primitive, "p") {
                Some(p) => uints(p)?,
                None => Vec::new(),
            };
            let vcount = match child(primitive, "vcount") {
                Some(vcount) => uints(vcount)?,
                None => Vec::new(),
            };
            let mut polygons = Vec::with_capacity(vcount.len());
            let mut start = 0;
            for count in vcount {
                let end = start + count as usize * stride;
                let polygon = p
                    .get(start..end)
                    .ok_or_else(|| ColladaError::malformed(primitive, "<vcount> exceeds <p>"))?;
                polygons.push(polygon.to_vec());
                start = end;
            }
            Ok(polygons)
        }
        // <polygons>: one <p> per polygon, holes (<ph>) are ignored
        _ => elements(primitive, "p").map(uints).collect(),
    }
}

fn read3(source: &Source, index: u32, primitive: Node) -> Result<[f32; 3], ColladaError> {
    source
        .get(index, 3)
        .map(|v| [v[0], v[1], v[2]])
        .ok_or_else(|| ColladaError::malformed(primitive, format!("index {index} out of range")))
}

fn has_quadratic_falloff(point: Node) -> Result<bool, ColladaError> {
    match child(point, "quadratic_attenuation") {
        Some(q) => Ok(floats(q)?.first().is_some_and(|v| *v > 0.0)),
        None => Ok(false),
    }
}

/// Local matrix of a node from its transform elements, applied in document order.
fn node_matrix(node: Node) -> Result<cgmath::Matrix4<f32>, ColladaError> {
    let mut matrix = cgmath::Matrix4::identity();
    for element in node.children().filter(Node::is_element) {
        let step = match element.tag_name().name() {
            "matrix" => {
                let v = floats(element)?;
                if v.len() != 16 {
                    return Err(ColladaError::malformed(element, "expected 16 values"));
                }
                // row-major in the file
                #[rustfmt::skip]
                let m = cgmath::Matrix4::new(
                    v[0], v[4], v[8], v[12],
                    v[1], v[5], v[9], v[13],
                    v[2], v[6], v[10], v[14],
                    v[3], v[7], v[11], v[15],
                );
                m
            }
            "translate" => {
                let [x, y, z] = fixed::<3>(element)?;
                cgmath::Matrix4::from_translation(cgmath::Vector3::new(x, y, z))
            }
            "rotate" => {
                let [x, y, z, angle] = fixed::<4>(element)?;
                let axis = cgmath::Vector3::new(x, y, z);
                if cgmath::InnerSpace::magnitude2(axis) > 0.0 {
                    cgmath::Matrix4::from_axis_angle(cgmath::InnerSpace::normalize(axis), cgmath::Deg(angle))
                } else {
                    cgmath::Matrix4::identity()
                }
            }
            "scale" => {
                let [x, y, z] = fixed::<3>(element)?;
                cgmath::Matrix4::from_nonuniform_scale(x, y, z)
            }
            "lookat" | "skew" => {
                log::warn!("Unsupported <{}> transform ignored", element.tag_name().name());
                continue;
            }
            _ => continue,
        };
        matrix = matrix * step;
    }
    Ok(matrix)
}

fn fixed<const N: usize>(element: Node) -> Result<[f32; N], ColladaError> {
    let values = floats(element)?;
    values
        .try_into()
        .map_err(|_| ColladaError::malformed(element, format!("expected {N} values")))
}

fn floats(element: Node) -> Result<Vec<f32>, ColladaError> {
    numbers(element)
}

fn uints(element: Node) -> Result<Vec<u32>, ColladaError> {
    numbers(element)
}

fn numbers<T: std::str::FromStr>(element: Node) -> Result<Vec<T>, ColladaError> {
    element
        .text()
        .unwrap_or("")
        .split_whitespace()
        .map(|value| parse_number(element.tag_name().name(), value))
        .collect()
}

fn parse_number<T: std::str::FromStr>(element: &str, value: &str) -> Result<T, ColladaError> {
    value.parse().map_err(|_| ColladaError::InvalidNumber {
        element: element.to_string(),
        value: value.to_string(),
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn name_of<'a>(node: Node<'a, '_>, fallback: &'a str) -> &'a str {
    node.attribute("name")
        .or_else(|| node.attribute("id"))
        .unwrap_or(fallback)
}
