//! # Keel Engine
//!
//! Scene-based Entity-Component-System core with a parallel frame loop.
//!
//! ## Features
//!
//! - **ECS Architecture**: entities own typed components, scenes own entities and systems
//! - **Parallel Updates**: every system and component of a frame phase runs on a worker pool
//! - **Deferred Removal**: components detach at a well-defined point after presentation
//! - **Failure Isolation**: a failing or panicking update never stops its siblings or the loop
//! - **Pluggable Platform**: the loop talks to a [`Platform`], a headless one is included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keel_engine::prelude::*;
//!
//! #[derive(Default)]
//! struct Spin;
//!
//! impl System for Spin {
//!     fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
//!         for transform in ctx.scene().get_components::<TransformComponent>() {
//!             let mut transform = transform.write();
//!             let turn = Quat::from_axis_angle(&Vec3::y_axis(), ctx.delta_time());
//!             transform.rotation = turn * transform.rotation;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let platform = HeadlessPlatform::from_config(&config.window)?.with_frame_budget(120);
//!     let mut engine = Engine::new(config, platform)?;
//!
//!     let mut scene = Scene::new("spinning");
//!     let mut entity = Entity::new("cube");
//!     entity.add_component::<TransformComponent>();
//!     scene.add_entity(entity);
//!     scene.add_system::<Spin>();
//!
//!     engine.load_scene(scene);
//!     engine.run();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod foundation;
pub mod module;
pub mod platform;

mod engine;

pub use engine::{Engine, EngineError, EngineState, FrameError, FrameReport};
pub use module::Module;
pub use platform::{HeadlessPlatform, Platform};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig, WindowConfig},
        ecs::{
            components::{
                AudioListenerComponent, AudioSourceComponent, CameraComponent, TransformComponent,
            },
            systems::{AudioSystem, AutoCameraResolution},
            Component, ComponentContext, ComponentRef, Entity, EntityId, Scene, SceneView, System,
            SystemContext, UpdateError,
        },
        foundation::{
            math::{Mat4, Quat, Vec3},
            time::{Stopwatch, Timer},
        },
        platform::PlatformEvent,
        Engine, EngineError, EngineState, FrameReport, HeadlessPlatform, Module, Platform,
    };
}
