//! Orbit/pan/dolly camera controls with inertial damping.
//!
//! Input handlers only record *deltas*; [`OrbitControls::update`] applies a
//! fraction (`damping_factor`) of the outstanding delta to the camera and
//! decays the rest, so the camera keeps coasting after the pointer stops. This
//! is why `update` has to run on every display refresh even without input.
//!
//! Positions are expressed in spherical coordinates around `camera.target`
//! with +Y up. Rotating and dollying only ever change the camera position;
//! panning is the only operation that moves the target.
//!
//! Every `update` that actually moves the camera queues exactly one
//! [`ControlEvent::Change`]. The owner drains the queue with
//! [`OrbitControls::drain_events`] and decides what to do (usually render).

use std::f32::consts::PI;

use cgmath::InnerSpace;

use crate::{camera::PerspectiveCamera, settings};

/// Squared distance below which a camera move does not count as a change.
const CHANGE_EPSILON: f32 = 0.000001;
/// Residual deltas smaller than this are snapped to zero.
const REST_EPSILON: f32 = 0.000001;
/// Keeps the polar angle off the poles where `look_at` degenerates.
const POLE_EPSILON: f32 = 0.000001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    Rotate,
    Pan,
    Dolly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Dragging(ControlMode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// An interaction began (pointer down or wheel).
    Start,
    /// The camera moved.
    Change,
    /// An interaction ended.
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SphericalDelta {
    theta: f32,
    phi: f32,
}

#[derive(Debug)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_rotate: bool,
    pub rotate_speed: f32,
    pub enable_pan: bool,
    pub pan_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    state: ControlState,
    viewport_height: f32,
    pointer: Option<[f32; 2]>,
    spherical_delta: SphericalDelta,
    pan_offset: cgmath::Vector3<f32>,
    scale: f32,
    last_position: cgmath::Point3<f32>,
    last_target: cgmath::Point3<f32>,
    events: Vec<ControlEvent>,
}

impl OrbitControls {
    /// Controls for `camera`, which is expected to already look at its target.
    ///
    /// `viewport_height` is the height (in the same pixel unit as pointer
    /// positions) that a full-height drag maps to; one full drag rotates by 2π.
    pub fn new(camera: &PerspectiveCamera, viewport_height: u32) -> Self {
        Self {
            enable_damping: settings::ENABLE_DAMPING,
            damping_factor: settings::DAMPING_FACTOR,
            enable_rotate: true,
            rotate_speed: 1.0,
            enable_pan: true,
            pan_speed: 1.0,
            enable_zoom: true,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            state: ControlState::Idle,
            viewport_height: viewport_height.max(1) as f32,
            pointer: None,
            spherical_delta: SphericalDelta::default(),
            pan_offset: cgmath::Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
            last_position: camera.position,
            last_target: camera.target,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Sum of the magnitudes of all outstanding deltas; zero means at rest.
    pub fn residual_speed(&self) -> f32 {
        self.spherical_delta.theta.abs()
            + self.spherical_delta.phi.abs()
            + self.pan_offset.magnitude()
            + (self.scale - 1.0).abs()
    }

    pub fn is_at_rest(&self) -> bool {
        self.residual_speed() == 0.0
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ControlEvent> + '_ {
        self.events.drain(..)
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: [f32; 2]) {
        let mode = match button {
            PointerButton::Primary if self.enable_rotate => ControlMode::Rotate,
            PointerButton::Secondary if self.enable_pan => ControlMode::Pan,
            PointerButton::Auxiliary if self.enable_zoom => ControlMode::Dolly,
            _ => return,
        };
        self.pointer = Some(position);
        if self.state == ControlState::Idle {
            self.events.push(ControlEvent::Start);
        }
        self.state = ControlState::Dragging(mode);
    }

    /// Feeds a pointer position. While dragging, the delta since the last
    /// position is turned into a camera delta and applied right away.
    pub fn pointer_move(&mut self, position: [f32; 2], camera: &mut PerspectiveCamera) {
        let previous = self.pointer.replace(position);
        let ControlState::Dragging(mode) = self.state else {
            return;
        };
        let Some(previous) = previous else {
            return;
        };
        let dx = position[0] - previous[0];
        let dy = position[1] - previous[1];
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        match mode {
            ControlMode::Rotate => {
                self.rotate_left(2.0 * PI * dx * self.rotate_speed / self.viewport_height);
                self.rotate_up(2.0 * PI * dy * self.rotate_speed / self.viewport_height);
            }
            ControlMode::Pan => self.pan(dx * self.pan_speed, dy * self.pan_speed, camera),
            ControlMode::Dolly => {
                if dy > 0.0 {
                    self.dolly_out(self.zoom_scale());
                } else if dy < 0.0 {
                    self.dolly_in(self.zoom_scale());
                }
            }
        }
        self.update(camera);
    }

    pub fn pointer_up(&mut self, _button: PointerButton) {
        if let ControlState::Dragging(_) = self.state {
            self.state = ControlState::Idle;
            self.events.push(ControlEvent::End);
        }
    }

    /// Wheel input; positive `steps` (scrolling away from the user) zooms in.
    pub fn wheel(&mut self, steps: f32, camera: &mut PerspectiveCamera) {
        if !self.enable_zoom || steps == 0.0 {
            return;
        }
        self.events.push(ControlEvent::Start);
        if steps > 0.0 {
            self.dolly_in(self.zoom_scale());
        } else {
            self.dolly_out(self.zoom_scale());
        }
        self.update(camera);
        self.events.push(ControlEvent::End);
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    /// Screen-space pan by a pointer delta in pixels.
    ///
    /// The world distance per pixel is chosen so that the point at the target
    /// depth follows the pointer.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &PerspectiveCamera) {
        let half_fov = cgmath::Rad::from(camera.fovy()).0 / 2.0;
        let target_distance = camera.distance_to_target() * half_fov.tan();
        let left = camera.right() * (-2.0 * dx * target_distance / self.viewport_height);
        let up = camera.screen_up() * (2.0 * dy * target_distance / self.viewport_height);
        self.pan_offset += left + up;
    }

    pub fn dolly_in(&mut self, dolly_scale: f32) {
        self.scale *= dolly_scale;
    }

    pub fn dolly_out(&mut self, dolly_scale: f32) {
        self.scale /= dolly_scale;
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    /// Advances the controls by one step and moves `camera` accordingly.
    ///
    /// Returns whether the camera moved; in that case one
    /// [`ControlEvent::Change`] was queued.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - camera.target;
        let mut radius = offset.magnitude();
        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        theta += self.spherical_delta.theta * step;
        phi += self.spherical_delta.phi * step;
        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.target += self.pan_offset * step;

        let sin_phi_radius = phi.sin() * radius;
        let offset = cgmath::Vector3::new(
            sin_phi_radius * theta.sin(),
            phi.cos() * radius,
            sin_phi_radius * theta.cos(),
        );
        camera.position = camera.target + offset;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.spherical_delta.theta = snap_to_rest(self.spherical_delta.theta * decay);
            self.spherical_delta.phi = snap_to_rest(self.spherical_delta.phi * decay);
            self.pan_offset *= decay;
            if self.pan_offset.magnitude() < REST_EPSILON {
                self.pan_offset = cgmath::Vector3::new(0.0, 0.0, 0.0);
            }
        } else {
            self.spherical_delta = SphericalDelta::default();
            self.pan_offset = cgmath::Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        let moved = (camera.position - self.last_position).magnitude2() > CHANGE_EPSILON
            || (camera.target - self.last_target).magnitude2() > CHANGE_EPSILON;
        if moved {
            self.last_position = camera.position;
            self.last_target = camera.target;
            self.events.push(ControlEvent::Change);
        }
        moved
    }
}

fn snap_to_rest(value: f32) -> f32 {
    if value.abs() < REST_EPSILON { 0.0 } else { value }
}
