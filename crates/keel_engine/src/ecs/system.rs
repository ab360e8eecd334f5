//! System trait and the context handed to systems each frame

use crate::ecs::scene::SceneView;
use crate::ecs::scheduler::{FrameContext, UpdateError};
use crate::platform::PlatformEvent;
use std::any::Any;

/// Scene-scoped behaviour that runs once per frame over the components it queries.
///
/// A system belongs to the scene it was added to for its whole life. It keeps
/// no entity-owned state; durable state lives in components.
pub trait System: Send + Sync + 'static {
    /// Called when the owning scene becomes the engine's active scene
    fn on_enable(&mut self, scene: &SceneView<'_>) {
        let _ = scene;
    }

    /// Called when the owning scene is unloaded or replaced
    fn on_disable(&mut self, scene: &SceneView<'_>) {
        let _ = scene;
    }

    /// Runs every frame before [`update`](Self::update)
    fn early_update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs once per frame while the owning scene is active
    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError>;

    /// Runs every frame after [`update`](Self::update)
    fn late_update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        let _ = ctx;
        Ok(())
    }
}

/// Everything a system may look at during an update phase
pub struct SystemContext<'a> {
    scene: SceneView<'a>,
    frame: &'a FrameContext,
    events: &'a [PlatformEvent],
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(scene: SceneView<'a>, frame: &'a FrameContext, events: &'a [PlatformEvent]) -> Self {
        Self { scene, frame, events }
    }

    /// Read-only view of the owning scene
    pub fn scene(&self) -> &SceneView<'a> {
        &self.scene
    }

    /// Timing information for the current frame
    pub fn frame(&self) -> &'a FrameContext {
        self.frame
    }

    /// Seconds elapsed during the previous frame
    pub fn delta_time(&self) -> f32 {
        self.frame.delta_time
    }

    /// Platform events pumped at the start of this frame
    pub fn events(&self) -> &'a [PlatformEvent] {
        self.events
    }
}

/// Downcasting support for boxed systems
pub(crate) trait AnySystem: System {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: System> AnySystem for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
