//! Entity-Component-System implementation
//!
//! Entities own components, scenes own entities and systems, and the
//! [`scheduler`] fans the per-frame updates out over the worker pool.

pub mod component;
pub mod components;
pub mod entity;
pub mod scene;
pub mod scheduler;
pub mod system;
pub mod systems;

#[cfg(test)]
mod tests;

pub use component::{Component, ComponentContext, ComponentRef};
pub use entity::{ComponentEvent, Entity, EntityId};
pub use scene::{EntityMut, Scene, SceneView};
pub use scheduler::{FrameContext, TaskFailure, TaskOwner, TaskStage, TaskTiming, UpdateError, UpdatePhase};
pub use system::{System, SystemContext};
