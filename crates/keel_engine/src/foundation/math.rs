//! Math types used by the engine
//!
//! Thin aliases over nalgebra so components share one vocabulary.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// World axes, Y-up right-handed
pub mod axes {
    use super::Vec3;

    /// +X
    pub fn right() -> Vec3 {
        Vec3::x()
    }

    /// +Y
    pub fn up() -> Vec3 {
        Vec3::y()
    }

    /// -Z, the direction a default-oriented object faces
    pub fn forward() -> Vec3 {
        -Vec3::z()
    }
}
