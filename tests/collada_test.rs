use collada_viewer::{
    data_structures::{
        light::Light,
        scene_graph::{NodeKind, SceneNode},
    },
    resources::{
        ColladaLoader,
        collada::{self, ColladaError, UpAxis},
    },
    settings,
};

use crate::common::test_utils::{assert_close, assets_dir, fixture};

mod common;

/// Wraps a visual scene body into a minimal document.
fn document(library: &str, nodes: &str) -> String {
    format!(
        r##"<?xml version="1.0"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  {library}
  <library_visual_scenes>
    <visual_scene id="Scene">{nodes}</visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#Scene"/></scene>
</COLLADA>"##
    )
}

fn triangle_library(positions: &str, p: &str, stride: u32) -> String {
    format!(
        r##"<library_geometries>
    <geometry id="g" name="g">
      <mesh>
        <source id="g-pos">
          <float_array id="g-pos-array">{positions}</float_array>
          <technique_common><accessor source="#g-pos-array" stride="{stride}"/></technique_common>
        </source>
        <vertices id="g-vtx"><input semantic="POSITION" source="#g-pos"/></vertices>
        <triangles count="1">
          <input semantic="VERTEX" source="#g-vtx" offset="0"/>
          <p>{p}</p>
        </triangles>
      </mesh>
    </geometry>
  </library_geometries>"##
    )
}

#[test]
fn should_parse_a_single_mesh() {
    let mut asset = collada::parse(&fixture("one_mesh.dae")).unwrap();
    assert_eq!(asset.up_axis, UpAxis::Y);
    assert_eq!(asset.unit, 1.0);
    assert_eq!(asset.scene.name(), "Scene");
    assert_eq!(asset.children().len(), 1);

    let node = asset.take_first_child().unwrap();
    assert!(asset.take_first_child().is_none());
    assert_eq!(node.kind(), NodeKind::Mesh);
    assert_eq!(node.name(), "Quad");
    assert_close(node.get_local_transform().position.into(), [0.0, 1.0, 0.0], 1e-6);

    let mesh = node.as_mesh().unwrap();
    assert_eq!(mesh.geometry.vertices.len(), 4);
    assert_eq!(mesh.geometry.triangle_count(), 2);
    assert_eq!(mesh.geometry.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(mesh.geometry.vertices[1].color, [0.0, 1.0, 0.0]);
    assert_eq!(mesh.geometry.vertices[3].color, [1.0, 1.0, 0.0]);
    // generated normals of a quad in the XZ plane face +Y
    for vertex in &mesh.geometry.vertices {
        assert_close(vertex.normal, [0.0, 1.0, 0.0], 1e-6);
    }

    assert_eq!(mesh.material.name, "red");
    assert_eq!(mesh.material.color, [1.0, 0.0, 0.0]);
    assert!(mesh.material.vertex_colors);
}

#[test]
fn should_parse_an_empty_scene() {
    let asset = collada::parse(&fixture("empty_scene.dae")).unwrap();
    assert!(asset.children().is_empty());
}

#[test]
fn should_triangulate_polylists() {
    let mut asset = collada::parse(&fixture("polylist_colors.dae")).unwrap();
    let node = asset.take_first_child().unwrap();
    assert_eq!(node.name(), "Shape");
    let mesh = node.as_mesh().unwrap();

    // a quad and a triangle
    assert_eq!(mesh.geometry.triangle_count(), 3);
    assert_eq!(mesh.geometry.vertices.len(), 7);
    assert_eq!(mesh.geometry.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6]);

    // authored colours are sRGB and stored linear, like material colours
    let authored = [0.25, 0.5, 0.75].map(settings::srgb_to_linear);
    for vertex in &mesh.geometry.vertices[..4] {
        assert_close(vertex.color, authored, 1e-6);
        assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
    }
    for vertex in &mesh.geometry.vertices[4..] {
        assert_eq!(vertex.color, [1.0, 1.0, 1.0]);
    }

    // no bound material
    assert_eq!(mesh.material.color, [1.0, 1.0, 1.0]);
    assert!(mesh.material.vertex_colors);
}

#[test]
fn should_read_axis_unit_lights_and_instanced_nodes() {
    let asset = collada::parse(&fixture("z_up_scene.dae")).unwrap();
    assert_eq!(asset.up_axis, UpAxis::Z);
    assert_eq!(asset.unit, 0.01);

    let root = asset.scene.get_local_transform();
    assert_close(root.scale.into(), [0.01, 0.01, 0.01], 1e-6);
    // Z up becomes Y up
    let up = root.rotation * cgmath::Vector3::new(0.0, 0.0, 1.0);
    assert_close(up.into(), [0.0, 1.0, 0.0], 1e-5);

    let children = asset.children();
    assert_eq!(children.len(), 2);

    let rig = &children[0];
    assert_eq!(rig.name(), "Rig");
    assert_eq!(rig.kind(), NodeKind::Group);
    assert_close(rig.get_local_transform().position.into(), [10.0, 0.0, 5.0], 1e-5);
    let x_axis = rig.get_local_transform().rotation * cgmath::Vector3::new(1.0, 0.0, 0.0);
    assert_close(x_axis.into(), [0.0, 1.0, 0.0], 1e-5);

    // the directional light is skipped
    let rig_children = rig.get_children();
    assert_eq!(rig_children.len(), 3);
    match rig_children[0].as_light() {
        Some(Light::Ambient { color }) => {
            assert_close(*color, [settings::srgb_to_linear(0.2); 3], 1e-6)
        }
        other => panic!("expected an ambient light, got {:?}", other),
    }
    match rig_children[1].as_light() {
        Some(Light::Point { decay, distance, .. }) => {
            assert_eq!(*decay, 2.0);
            assert_eq!(*distance, 0.0);
        }
        other => panic!("expected a point light, got {:?}", other),
    }

    let shared = &rig_children[2];
    assert_eq!(shared.kind(), NodeKind::Mesh);
    assert_eq!(shared.name(), "shared-tri");
    assert_close(shared.get_local_transform().scale.into(), [2.0, 2.0, 2.0], 1e-6);
    assert_eq!(shared.as_mesh().unwrap().geometry.triangle_count(), 1);

    // only lines, which are not drawn
    let wire = &children[1];
    assert_eq!(wire.kind(), NodeKind::Group);
    assert!(wire.get_children().is_empty());
}

#[test]
fn should_decompose_node_matrices() {
    let text = document(
        &triangle_library("0 0 0 1 0 0 0 1 0", "0 1 2", 3),
        r##"<node id="m" name="m">
          <matrix>2 0 0 1  0 2 0 2  0 0 2 3  0 0 0 1</matrix>
          <instance_geometry url="#g"/>
        </node>"##,
    );
    let asset = collada::parse(&text).unwrap();
    let transform = asset.children()[0].get_local_transform();
    assert_close(transform.position.into(), [1.0, 2.0, 3.0], 1e-6);
    assert_close(transform.scale.into(), [2.0, 2.0, 2.0], 1e-6);
}

#[test]
fn should_reject_malformed_xml() {
    let err = collada::parse("<COLLADA><scene></COLLADA>").err().unwrap();
    assert!(matches!(err, ColladaError::Xml(_)), "{}", err);
}

#[test]
fn should_reject_other_documents() {
    let err = collada::parse("<svg/>").err().unwrap();
    match err {
        ColladaError::NotCollada(root) => assert_eq!(root, "svg"),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn should_require_a_visual_scene() {
    let err = collada::parse("<COLLADA version=\"1.4.1\"/>").err().unwrap();
    assert!(matches!(err, ColladaError::MissingVisualScene), "{}", err);
}

#[test]
fn should_report_invalid_numbers() {
    let text = document("", r#"<node id="n"><translate>0 one 0</translate></node>"#);
    match collada::parse(&text).err().unwrap() {
        ColladaError::InvalidNumber { element, value } => {
            assert_eq!(element, "translate");
            assert_eq!(value, "one");
        }
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn should_report_dangling_references() {
    let text = document("", r##"<node id="n"><instance_geometry url="#nowhere"/></node>"##);
    match collada::parse(&text).err().unwrap() {
        ColladaError::DanglingReference(url) => assert_eq!(url, "#nowhere"),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn should_reject_out_of_range_indices() {
    let text = document(
        &triangle_library("0 0 0 1 0 0 0 1 0", "0 1 5", 3),
        r##"<node id="n"><instance_geometry url="#g"/></node>"##,
    );
    let err = collada::parse(&text).err().unwrap();
    assert!(err.to_string().contains("index 5 out of range"), "{}", err);
}

#[test]
fn should_reject_short_accessors() {
    let text = document(
        &triangle_library("0 0 0 1 0 0", "0 1 2", 2),
        r##"<node id="n"><instance_geometry url="#g"/></node>"##,
    );
    match collada::parse(&text).err().unwrap() {
        ColladaError::Malformed { element, .. } => assert_eq!(element, "source"),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn should_stop_on_cyclic_instances() {
    let text = document(
        r##"<library_nodes><node id="loop"><instance_node url="#loop"/></node></library_nodes>"##,
        r##"<node id="n"><instance_node url="#loop"/></node>"##,
    );
    match collada::parse(&text).err().unwrap() {
        ColladaError::Malformed { element, reason } => {
            assert_eq!(element, "node");
            assert!(reason.contains("cyclic"));
        }
        other => panic!("unexpected error {}", other),
    }
}

#[tokio::test]
async fn should_load_the_bundled_model() {
    let loader = ColladaLoader::with_root(assets_dir());
    let mut asset = loader.load(settings::MESH_PATH).await.unwrap();
    assert_eq!(asset.children().len(), 1);

    let node = asset.take_first_child().unwrap();
    assert_eq!(node.kind(), NodeKind::Mesh);
    assert_eq!(node.name(), "Katrina");
    let mesh = node.as_mesh().unwrap();
    assert_eq!(mesh.geometry.triangle_count(), 608);
    assert_eq!(mesh.geometry.vertices.len(), 321);
    assert!(mesh.material.vertex_colors);
}

#[tokio::test]
async fn should_fail_to_load_missing_files() {
    let loader = ColladaLoader::with_root(assets_dir());
    let err = loader.load("Data/missing.dae").await.err().unwrap();
    assert!(err.to_string().contains("missing.dae"), "{}", err);
}
