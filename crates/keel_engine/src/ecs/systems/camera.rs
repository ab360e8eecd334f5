//! Keeps camera resolutions matched to the window

use crate::ecs::components::CameraComponent;
use crate::ecs::{System, SystemContext, UpdateError};
use crate::platform::PlatformEvent;

/// Resizes every camera of the scene when the window is resized
#[derive(Debug, Clone)]
pub struct AutoCameraResolution {
    /// Resolution relative to the window size
    pub scale: f32,
}

impl Default for AutoCameraResolution {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl AutoCameraResolution {
    /// Resolution for a window of the given size
    pub fn resolution_for(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = |extent: u32| (extent as f32 * self.scale).round().max(0.0) as u32;
        (scaled(width), scaled(height))
    }
}

impl System for AutoCameraResolution {
    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        let latest = ctx.events().iter().rev().find_map(|event| match *event {
            PlatformEvent::Resized { width, height } => Some((width, height)),
            PlatformEvent::CloseRequested => None,
        });
        let Some((width, height)) = latest else {
            return Ok(());
        };

        let resolution = self.resolution_for(width, height);
        for camera in ctx.scene().get_components::<CameraComponent>() {
            camera.write().resolution = resolution;
        }
        log::debug!("Camera resolution set to {}x{}", resolution.0, resolution.1);
        Ok(())
    }
}
