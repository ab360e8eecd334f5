//! Spatial audio components
//!
//! Sources and the listener only carry the state a mixer needs; the
//! [`AudioSystem`](crate::ecs::systems::AudioSystem) keeps them in sync with
//! their owner's transform.

use crate::ecs::{Component, EntityId};
use crate::foundation::math::{axes, Vec3};

/// Forward and up vectors of an emitter or listener
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Facing direction
    pub forward: Vec3,
    /// Up direction
    pub up: Vec3,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            forward: axes::forward(),
            up: axes::up(),
        }
    }
}

/// Sound emitter attached to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSourceComponent {
    /// World position last synced from the transform
    pub position: Vec3,
    /// Units per second
    pub velocity: Vec3,
    /// Emitter orientation
    pub orientation: Orientation,
    /// Spatialised when true; otherwise played without positioning
    pub is_3d: bool,
    /// Restart when the clip ends
    pub looping: bool,
    /// Linear volume
    pub gain: f32,
    /// Playback rate multiplier
    pub pitch: f32,
    voice: Option<EntityId>,
}

impl Default for AudioSourceComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
            orientation: Orientation::default(),
            is_3d: true,
            looping: false,
            gain: 1.0,
            pitch: 1.0,
            voice: None,
        }
    }
}

impl Component for AudioSourceComponent {
    const UPDATES: bool = false;

    fn on_enable(&mut self, owner: EntityId) {
        log::trace!("Audio source of {owner} acquired a voice");
        self.voice = Some(owner);
    }

    fn on_disable(&mut self, owner: EntityId) {
        log::trace!("Audio source of {owner} released its voice");
        self.voice = None;
    }
}

impl AudioSourceComponent {
    /// A non-spatial source, e.g. music
    pub fn flat() -> Self {
        Self {
            is_3d: false,
            ..Default::default()
        }
    }

    /// Whether the source currently holds a mixer voice
    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// Set orientation from up and forward vectors
    pub fn set_orientation(&mut self, up: Vec3, forward: Vec3) {
        self.orientation = Orientation { forward, up };
    }
}

/// The ears of the scene; only one should exist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioListenerComponent {
    /// World position last synced from the transform
    pub position: Vec3,
    /// Units per second
    pub velocity: Vec3,
    /// Listener orientation
    pub orientation: Orientation,
}

impl Component for AudioListenerComponent {
    const UPDATES: bool = false;
}

impl AudioListenerComponent {
    /// Set orientation from up and forward vectors
    pub fn set_orientation(&mut self, up: Vec3, forward: Vec3) {
        self.orientation = Orientation { forward, up };
    }
}
