use std::sync::Arc;

use collada_viewer::{
    controls::{ControlState, PointerButton},
    data_structures::{light::Light, scene_graph::NodeKind},
    resources::{ColladaLoader, collada},
    settings,
    viewer::LoadState,
};

use crate::common::test_utils::{assert_close, assets_dir, fixture, fixtures_dir, test_viewer};

mod common;

#[test]
fn should_build_the_initial_scene() {
    let viewer = test_viewer(800, 600);
    let scene = viewer.scene();

    assert_eq!(scene.len(), 3);
    assert_eq!(scene.count(NodeKind::Light), 2);
    assert_eq!(scene.count(NodeKind::Helper), 1);
    assert_eq!(scene.count(NodeKind::Mesh), 0);

    match scene.children()[0].as_light() {
        Some(Light::Ambient { color }) => {
            assert_eq!(*color, settings::hex_to_linear(0xB8B8B8));
        }
        other => panic!("expected an ambient light, got {:?}", other),
    }
    match scene.children()[1].as_light() {
        Some(Light::Point {
            color,
            intensity,
            distance,
            decay,
        }) => {
            assert_eq!(*color, [1.0, 1.0, 1.0]);
            assert_eq!(*intensity, 1.0);
            assert_eq!(*distance, 50.0);
            assert_eq!(*decay, 1.0);
        }
        other => panic!("expected a point light, got {:?}", other),
    }
    let light_position: [f32; 3] = scene.children()[1].get_local_transform().position.into();
    assert_eq!(light_position, [0.0, 5.0, 3.0]);

    let axes = scene.children()[2].as_lines().map(|(_, vertices)| vertices.len());
    assert_eq!(axes, Some(6));
    assert_eq!(viewer.load_state(), &LoadState::NotStarted);
}

#[test]
fn should_set_up_the_camera() {
    let viewer = test_viewer(800, 600);
    let camera = viewer.camera();

    assert_eq!(camera.fovy(), cgmath::Deg(75.0));
    assert_eq!(camera.near(), 0.1);
    assert_eq!(camera.far(), 1000.0);
    assert!(camera.near() < camera.far());
    assert_eq!(camera.position, cgmath::Point3::new(3.0, 2.0, 3.0));
    assert_eq!(camera.target, cgmath::Point3::new(0.0, 1.16, 0.0));
}

#[test]
fn should_match_aspect_to_surface() {
    for (width, height) in [(800, 600), (1920, 1080), (1, 1), (300, 1200), (4096, 7)] {
        let viewer = test_viewer(width, height);
        assert_eq!(viewer.camera().aspect(), width as f32 / height as f32);
    }
}

#[test]
fn should_clamp_zero_sized_surfaces() {
    let viewer = test_viewer(0, 0);
    assert_eq!(viewer.camera().aspect(), 1.0);
    assert!(viewer.camera().projection_matrix().x.x.is_finite());
}

#[test]
fn should_re_arm_once_per_frame() {
    let mut viewer = test_viewer(800, 600);
    viewer.start();
    assert_eq!(viewer.scheduler().requests(), 1);

    for _ in 0..1000 {
        viewer.on_animation_frame();
    }
    assert_eq!(viewer.scheduler().requests(), 1001);
    // nothing moved, nothing drawn
    assert_eq!(viewer.renderer().count(), 0);
}

#[test]
fn should_render_once_per_pointer_move() {
    let mut viewer = test_viewer(800, 600);
    viewer.start();

    viewer.pointer_down(PointerButton::Primary, [100.0, 100.0]);
    assert_eq!(viewer.controls().state(), ControlState::Dragging(collada_viewer::controls::ControlMode::Rotate));
    assert_eq!(viewer.renderer().count(), 0);

    viewer.pointer_move([120.0, 100.0]);
    assert_eq!(viewer.renderer().count(), 1);
    let after_move = viewer.renderer().last().unwrap().camera_position;
    assert_ne!(after_move, [3.0, 2.0, 3.0]);

    viewer.pointer_move([140.0, 110.0]);
    assert_eq!(viewer.renderer().count(), 2);

    // no movement, no change
    viewer.pointer_move([140.0, 110.0]);
    assert_eq!(viewer.renderer().count(), 2);

    viewer.pointer_up(PointerButton::Primary);
    assert_eq!(viewer.controls().state(), ControlState::Idle);
    assert_eq!(viewer.renderer().count(), 2);
}

#[test]
fn should_coast_after_release_and_then_stop_rendering() {
    let mut viewer = test_viewer(800, 600);
    viewer.start();
    viewer.pointer_down(PointerButton::Primary, [100.0, 100.0]);
    viewer.pointer_move([200.0, 100.0]);
    viewer.pointer_up(PointerButton::Primary);
    let after_drag = viewer.renderer().count();

    viewer.on_animation_frame();
    assert_eq!(viewer.renderer().count(), after_drag + 1);

    for _ in 0..2000 {
        viewer.on_animation_frame();
    }
    assert!(viewer.controls().is_at_rest());
    let settled = viewer.renderer().count();
    for _ in 0..10 {
        viewer.on_animation_frame();
    }
    assert_eq!(viewer.renderer().count(), settled);
    // orbiting never moves the target
    assert_close(
        viewer.renderer().last().unwrap().camera_target,
        [0.0, 1.16, 0.0],
        1e-6,
    );
}

#[test]
fn should_render_once_per_wheel_step() {
    let mut viewer = test_viewer(800, 600);
    let distance = viewer.camera().distance_to_target();

    viewer.wheel(1.0);
    assert_eq!(viewer.renderer().count(), 1);
    assert!((viewer.camera().distance_to_target() - distance * 0.95).abs() < 1e-4);

    viewer.wheel(-1.0);
    assert_eq!(viewer.renderer().count(), 2);
    assert!((viewer.camera().distance_to_target() - distance).abs() < 1e-4);
}

#[tokio::test]
async fn should_attach_first_child_then_render() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(assets_dir());

    let load = viewer.begin_load(&loader).unwrap();
    assert_eq!(viewer.load_state(), &LoadState::Pending);
    let result = load.await;
    assert!(result.is_ok(), "{:?}", result.as_ref().err());

    viewer.complete_load(result);

    assert_eq!(viewer.load_state(), &LoadState::Attached);
    assert_eq!(viewer.scene().len(), 4);
    assert_eq!(viewer.scene().count(NodeKind::Mesh), 1);

    let model = &viewer.scene().children()[3];
    let material = model.material().unwrap();
    assert!(Arc::ptr_eq(material, viewer.material()));
    assert!(material.vertex_colors);

    // exactly one render, and it already saw the model
    assert_eq!(viewer.renderer().count(), 1);
    assert_eq!(viewer.renderer().last().unwrap().scene_len, 4);
}

#[test]
fn should_ignore_empty_models() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());

    let asset = collada::parse(&fixture("empty_scene.dae")).unwrap();
    viewer.complete_load(Ok(asset));

    assert_eq!(viewer.load_state(), &LoadState::Empty);
    assert_eq!(viewer.scene().len(), 3);
    assert_eq!(viewer.renderer().count(), 0);
}

#[test]
fn should_attach_single_child_models() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());

    let asset = collada::parse(&fixture("one_mesh.dae")).unwrap();
    viewer.complete_load(Ok(asset));

    assert_eq!(viewer.load_state(), &LoadState::Attached);
    assert_eq!(viewer.scene().len(), 4);
    assert_eq!(viewer.renderer().count(), 1);
    let model = &viewer.scene().children()[3];
    assert_eq!(model.name(), "Quad");
    assert!(Arc::ptr_eq(model.material().unwrap(), viewer.material()));
}

#[test]
fn should_record_failed_loads() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());

    viewer.complete_load(Err(anyhow::anyhow!("connection reset")));

    match viewer.load_state() {
        LoadState::Failed(message) => assert!(message.contains("connection reset")),
        other => panic!("expected a failed load, got {:?}", other),
    }
    assert_eq!(viewer.scene().len(), 3);
    assert_eq!(viewer.renderer().count(), 0);
}

#[tokio::test]
async fn should_fail_on_missing_file() {
    let mut viewer = test_viewer(800, 600);
    // the fixtures directory has no Data/Katrina.dae
    let loader = ColladaLoader::with_root(fixtures_dir());
    let load = viewer.begin_load(&loader).unwrap();
    let result = load.await;
    assert!(result.is_err());

    viewer.complete_load(result);
    assert!(matches!(viewer.load_state(), LoadState::Failed(_)));
    assert_eq!(viewer.scene().len(), 3);
}

#[test]
fn should_request_the_model_only_once() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());
    assert!(viewer.begin_load(&loader).is_none());
    assert_eq!(viewer.load_state(), &LoadState::Pending);
}

#[test]
fn should_ignore_second_completion() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());

    viewer.complete_load(Ok(collada::parse(&fixture("one_mesh.dae")).unwrap()));
    viewer.complete_load(Ok(collada::parse(&fixture("one_mesh.dae")).unwrap()));

    assert_eq!(viewer.load_state(), &LoadState::Attached);
    assert_eq!(viewer.scene().len(), 4);
    assert_eq!(viewer.renderer().count(), 1);
}

#[test]
fn should_ignore_completion_without_request() {
    let mut viewer = test_viewer(800, 600);
    viewer.complete_load(Ok(collada::parse(&fixture("one_mesh.dae")).unwrap()));

    assert_eq!(viewer.load_state(), &LoadState::NotStarted);
    assert_eq!(viewer.scene().len(), 3);
    assert_eq!(viewer.renderer().count(), 0);
}

#[test]
fn should_attach_non_mesh_first_child_as_is() {
    let mut viewer = test_viewer(800, 600);
    let loader = ColladaLoader::with_root(fixtures_dir());
    assert!(viewer.begin_load(&loader).is_some());

    // first node of this file is a group of lights and a mesh
    viewer.complete_load(Ok(collada::parse(&fixture("z_up_scene.dae")).unwrap()));

    assert_eq!(viewer.load_state(), &LoadState::Attached);
    assert_eq!(viewer.scene().len(), 4);
    assert_eq!(viewer.scene().children()[3].kind(), NodeKind::Group);
    assert_eq!(viewer.renderer().count(), 1);
}
