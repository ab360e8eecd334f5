//! Engine-provided systems

pub mod audio;
pub mod camera;

pub use audio::AudioSystem;
pub use camera::AutoCameraResolution;
