//! Lighting system
//!
//! A fixed rig of shadow-casting lights. Each light carries its own camera so
//! the shadow pass can render depth from the light's point of view; only the
//! first light's camera drives the shadow map.

use crate::config::Viewport;
use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::render::camera::Camera;
use crate::render::constants::{LightConstants, NUM_LIGHTS};

/// Field of view of every light camera, in degrees
pub const LIGHT_FOV_DEGREES: f32 = 90.0;

/// Point every light aims at once animation starts
const LIGHT_TARGET: Vec3 = Vec3::new(0.0, 8.0, 0.0);

/// Host-side state of one light
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    /// Light position (w = 1)
    pub position: Vec4,
    /// Normalized light direction (w = 0)
    pub direction: Vec4,
    /// Light color
    pub color: Vec4,
    /// Attenuation parameters
    pub falloff: Vec4,
    /// Light camera view matrix
    pub view: Mat4,
    /// Light camera projection matrix
    pub projection: Mat4,
}

impl LightState {
    fn new() -> Self {
        Self {
            position: Vec4::new(0.0, 15.0, -30.0, 1.0),
            direction: Vec4::new(0.0, 0.0, 1.0, 0.0),
            color: Vec4::new(0.7, 0.7, 0.7, 1.0),
            falloff: Vec4::new(800.0, 1.0, 0.0, 1.0),
            view: Mat4::identity(),
            projection: Mat4::identity(),
        }
    }

    /// Pack into the constant-buffer layout
    pub fn to_constants(&self) -> LightConstants {
        LightConstants {
            position: utils::vec4_to_raw(&self.position),
            direction: utils::vec4_to_raw(&self.direction),
            color: utils::vec4_to_raw(&self.color),
            falloff: utils::vec4_to_raw(&self.falloff),
            view: utils::to_raw(&self.view),
            projection: utils::to_raw(&self.projection),
        }
    }
}

/// Lights plus their shadow cameras
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    lights: [LightState; NUM_LIGHTS],
    cameras: [Camera; NUM_LIGHTS],
}

impl LightRig {
    /// Create the rig with every light at the starting position
    pub fn new(viewport: Viewport) -> Self {
        let mut rig = Self {
            lights: std::array::from_fn(|_| LightState::new()),
            cameras: std::array::from_fn(|_| Camera::new()),
        };

        for (light, camera) in rig.lights.iter_mut().zip(rig.cameras.iter_mut()) {
            let eye = light.position.xyz();
            camera.set(eye, eye + light.direction.xyz(), Vec3::y());
            let (view, projection) = camera.view_projection(LIGHT_FOV_DEGREES, viewport);
            light.view = view;
            light.projection = projection;
        }

        rig
    }

    /// Light states
    pub fn lights(&self) -> &[LightState; NUM_LIGHTS] {
        &self.lights
    }

    /// Light cameras
    pub fn cameras(&self) -> &[Camera; NUM_LIGHTS] {
        &self.cameras
    }

    /// Camera used for the shadow pass
    pub fn shadow_camera(&self) -> &Camera {
        &self.cameras[0]
    }

    /// Orbit the lights around the Y axis
    ///
    /// Even-indexed lights turn counter-clockwise and odd-indexed lights
    /// clockwise, at two radians per second. Each light is re-aimed at the
    /// scene center afterwards.
    pub fn animate(&mut self, delta_seconds: f32, viewport: Viewport) {
        let frame_change = 2.0 * delta_seconds;

        for (index, (light, camera)) in self.lights.iter_mut().zip(self.cameras.iter_mut()).enumerate() {
            let angle = if index % 2 == 0 { frame_change } else { -frame_change };

            let eye = utils::rotate_about_axis(&light.position.xyz(), &Vec3::y(), angle);
            light.position = eye.push(1.0);
            light.direction = (LIGHT_TARGET - eye).normalize().push(0.0);

            camera.set(eye, LIGHT_TARGET, Vec3::y());
            let (view, projection) = camera.view_projection(LIGHT_FOV_DEGREES, viewport);
            light.view = view;
            light.projection = projection;
        }
    }

    /// Pack every light into the constant-buffer layout
    pub fn to_constants(&self) -> [LightConstants; NUM_LIGHTS] {
        std::array::from_fn(|index| self.lights[index].to_constants())
    }
}
