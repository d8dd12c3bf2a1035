#![cfg(feature = "integration-tests")]

use collada_viewer::{
    render::Renderer, resources::ColladaLoader, settings, viewer::LoadState, viewer::Viewer,
};

use crate::common::test_utils::{CountingScheduler, assets_dir};

mod common;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn is_clear(pixel: &image::Rgba<u8>) -> bool {
    let expected = settings::hex_to_rgb(settings::CLEAR_COLOR).map(|c| (c * 255.0).round() as i32);
    pixel.0[..3]
        .iter()
        .zip(expected)
        .all(|(channel, expected)| (*channel as i32 - expected).abs() <= 1)
}

#[tokio::test]
async fn should_draw_the_model_after_loading() {
    let renderer = Renderer::headless(WIDTH, HEIGHT).await.unwrap();
    let mut viewer = Viewer::new(WIDTH, HEIGHT, renderer, CountingScheduler::default()).unwrap();
    let loader = ColladaLoader::with_root(assets_dir());

    let load = viewer.begin_load(&loader).unwrap();
    viewer.complete_load(load.await);
    assert_eq!(viewer.load_state(), &LoadState::Attached);
    assert_eq!(viewer.renderer().frames_rendered(), 1);

    let image = viewer.renderer().read_pixels().unwrap();
    // the orbit target sits inside the model
    assert!(!is_clear(image.get_pixel(WIDTH / 2, HEIGHT / 2)));
    // and the sky above it is empty
    assert!(is_clear(image.get_pixel(0, 0)));
}

#[tokio::test]
async fn should_redraw_on_camera_changes() {
    let renderer = Renderer::headless(WIDTH, HEIGHT).await.unwrap();
    let mut viewer = Viewer::new(WIDTH, HEIGHT, renderer, CountingScheduler::default()).unwrap();

    viewer.wheel(1.0);
    assert_eq!(viewer.renderer().frames_rendered(), 1);

    // lights and axes only, the axes cross the lower half of the view
    let image = viewer.renderer().read_pixels().unwrap();
    assert!(image.pixels().any(|pixel| !is_clear(pixel)));
    assert!(is_clear(image.get_pixel(0, 0)));
}
