//! Transform component for the ECS system
//!
//! Pure data: world-space position, rotation and scale in Y-up right-handed
//! coordinates. Objects face -Z when unrotated.

use crate::ecs::Component;
use crate::foundation::math::{axes, Mat4, Quat, Vec3};

/// ECS Transform component
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// World space position
    pub position: Vec3,

    /// World space rotation quaternion
    pub rotation: Quat,

    /// World space scale factors
    pub scale: Vec3,
}

impl Component for TransformComponent {
    const UPDATES: bool = false;
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformComponent {
    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Place at `position`, facing `target`
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let rotation = Quat::rotation_between(&axes::forward(), &(target - position))
            .unwrap_or_else(|| Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::PI));
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder pattern: Set rotation from quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set scale (uniform)
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Model matrix (TRS order)
    pub fn matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Local +X in world space
    pub fn right(&self) -> Vec3 {
        self.rotation * axes::right()
    }

    /// Local +Y in world space
    pub fn up(&self) -> Vec3 {
        self.rotation * axes::up()
    }

    /// Local -Z in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * axes::forward()
    }
}
