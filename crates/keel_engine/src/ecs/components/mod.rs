//! Engine-provided components

pub mod audio;
pub mod camera;
pub mod transform;

pub use audio::{AudioListenerComponent, AudioSourceComponent, Orientation};
pub use camera::CameraComponent;
pub use transform::TransformComponent;
