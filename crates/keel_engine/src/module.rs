//! Engine modules
//!
//! A module is an engine-wide service that lives outside any scene (input
//! state, audio device, asset cache). Modules are updated once per frame on
//! the loop thread, after platform events were pumped and before the scene
//! update phases run.

use crate::ecs::FrameContext;
use crate::platform::PlatformEvent;
use std::any::{Any, TypeId};

/// Engine-wide service updated once per frame
pub trait Module: 'static {
    /// Called once when the module is added to the engine
    fn init(&mut self) {}

    /// Called every frame with the events pumped for that frame
    fn update(&mut self, frame: &FrameContext, events: &[PlatformEvent]);

    /// Called once when the module is removed or the engine shuts down
    fn destroy(&mut self) {}
}

pub(crate) trait AnyModule: Module {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Module> AnyModule for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct ModuleSlot {
    pub(crate) key: TypeId,
    pub(crate) name: &'static str,
    pub(crate) module: Box<dyn AnyModule>,
}
