//! Camera component

use crate::ecs::Component;

/// Camera rendering target description
#[derive(Debug, Clone, PartialEq)]
pub struct CameraComponent {
    /// Render target size in pixels
    pub resolution: (u32, u32),
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
}

impl Component for CameraComponent {
    const UPDATES: bool = false;
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            resolution: (1920, 1080),
            fov_y: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraComponent {
    /// Width over height, `0.0` for an empty resolution
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.resolution;
        if height == 0 {
            0.0
        } else {
            width as f32 / height as f32
        }
    }
}
