use std::time::Duration;

use collada_viewer::flow::{FramePacer, Pace};
use instant::Instant;

use crate::common::test_utils::test_viewer;

mod common;

const REFRESH: Duration = Duration::from_micros(16_666);

#[test]
fn interval_follows_the_refresh_rate() {
    assert_eq!(FramePacer::for_refresh_rate(Some(60_000)).interval(), REFRESH);
    assert_eq!(
        FramePacer::for_refresh_rate(Some(144_000)).interval(),
        Duration::from_micros(6_944)
    );
    // unknown or nonsensical rates fall back to 60 Hz
    assert_eq!(FramePacer::for_refresh_rate(None).interval(), REFRESH);
    assert_eq!(FramePacer::for_refresh_rate(Some(0)).interval(), REFRESH);
}

#[test]
fn unarmed_pacer_lets_the_loop_sleep() {
    let mut pacer = FramePacer::new(REFRESH);
    let now = Instant::now();
    assert_eq!(pacer.poll(now), Pace::Idle);
    assert!(!pacer.begin_frame(now));
}

#[test]
fn first_armed_frame_runs_immediately() {
    let mut pacer = FramePacer::new(REFRESH);
    pacer.arm();
    let now = Instant::now();
    assert_eq!(pacer.poll(now), Pace::Due);
    assert!(pacer.begin_frame(now));
    assert!(!pacer.is_armed());
}

#[test]
fn rearmed_frame_waits_for_the_next_refresh() {
    let mut pacer = FramePacer::new(REFRESH);
    let start = Instant::now();
    pacer.arm();
    assert!(pacer.begin_frame(start));

    pacer.arm();
    let soon = start + Duration::from_millis(1);
    assert_eq!(pacer.poll(soon), Pace::Wait(REFRESH - Duration::from_millis(1)));
    // a redraw the platform asked for early is not a frame
    assert!(!pacer.begin_frame(soon));
    assert!(pacer.is_armed());

    let later = start + REFRESH;
    assert_eq!(pacer.poll(later), Pace::Due);
    assert!(pacer.begin_frame(later));
}

#[test]
fn idle_frames_tick_once_per_refresh() {
    let mut viewer = test_viewer(800, 600);
    let mut pacer = FramePacer::new(REFRESH);
    viewer.start();
    pacer.arm();

    // the loop wakes every millisecond for a second
    let start = Instant::now();
    let mut frames = 0;
    for ms in 0..1000 {
        let now = start + Duration::from_millis(ms);
        if pacer.begin_frame(now) {
            viewer.on_animation_frame();
            pacer.arm();
            frames += 1;
        }
    }

    assert!((59..=61).contains(&frames), "{} frames", frames);
    assert_eq!(viewer.scheduler().requests(), frames + 1);
    assert_eq!(viewer.renderer().count(), 0);
}

#[test]
fn coasting_lasts_longer_than_a_few_refreshes() {
    let mut viewer = test_viewer(800, 600);
    let mut pacer = FramePacer::new(REFRESH);
    viewer.controls_mut().rotate_left(1.0);
    pacer.arm();

    let start = Instant::now();
    let mut now = start;
    while !viewer.controls().is_at_rest() {
        match pacer.poll(now) {
            Pace::Due => {
                assert!(pacer.begin_frame(now));
                viewer.on_animation_frame();
                pacer.arm();
            }
            Pace::Wait(remaining) => now += remaining,
            Pace::Idle => unreachable!("the viewer always re-arms"),
        }
        assert!(now - start < Duration::from_secs(60));
    }

    // inertia spans over a second of wall time at 60 Hz
    assert!(now - start > Duration::from_secs(1), "{:?}", now - start);
    assert!(viewer.renderer().count() > 60);
}
