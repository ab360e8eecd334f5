//! Scenario tests driving scenes through the engine frame loop
//!
//! Tracers write every lifecycle call into a shared journal so the tests can
//! assert on ordering across components, systems and frames.


use crate::config::EngineConfig;
use crate::ecs::{Component, ComponentContext, EntityId, System, SystemContext, UpdateError};
use crate::ecs::SceneView;
use crate::platform::HeadlessPlatform;
use crate::Engine;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Default)]
pub(super) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub(super) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub(super) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub(super) fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub(super) fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(super) enum Behaviour {
    #[default]
    Succeed,
    Fail,
    Panic,
    RemoveSelf,
}

/// Component that journals its lifecycle
pub(super) struct Tracer {
    pub(super) label: &'static str,
    pub(super) journal: Journal,
    pub(super) behaviour: Behaviour,
}

impl Tracer {
    pub(super) fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            journal: journal.clone(),
            behaviour: Behaviour::Succeed,
        }
    }

    pub(super) fn behaving(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }
}

impl Component for Tracer {
    fn on_enable(&mut self, _owner: EntityId) {
        self.journal.record(format!("{}:enable", self.label));
    }

    fn on_disable(&mut self, _owner: EntityId) {
        self.journal.record(format!("{}:disable", self.label));
    }

    fn update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        self.journal.record(format!("{}:update", self.label));
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(UpdateError::failed("tracer failed")),
            Behaviour::Panic => panic!("tracer panicked"),
            Behaviour::RemoveSelf => {
                ctx.entity().remove_component::<Self>();
                Ok(())
            }
        }
    }
}

/// System that journals its lifecycle and counts the tracers it can see
pub(super) struct Watcher {
    pub(super) label: &'static str,
    pub(super) journal: Journal,
    pub(super) behaviour: Behaviour,
    pub(super) seen: Vec<usize>,
}

impl Watcher {
    pub(super) fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            journal: journal.clone(),
            behaviour: Behaviour::Succeed,
            seen: Vec::new(),
        }
    }
}

impl System for Watcher {
    fn on_enable(&mut self, _scene: &SceneView<'_>) {
        self.journal.record(format!("{}:enable", self.label));
    }

    fn on_disable(&mut self, _scene: &SceneView<'_>) {
        self.journal.record(format!("{}:disable", self.label));
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        self.journal.record(format!("{}:update", self.label));
        self.seen.push(ctx.scene().get_components::<Tracer>().len());
        match self.behaviour {
            Behaviour::Fail => Err(UpdateError::failed("watcher failed")),
            Behaviour::Panic => panic!("watcher panicked"),
            Behaviour::Succeed | Behaviour::RemoveSelf => Ok(()),
        }
    }
}

/// A second system type, so two watchers can share one scene
pub(super) struct OtherWatcher(pub(super) Watcher);

impl System for OtherWatcher {
    fn on_enable(&mut self, scene: &SceneView<'_>) {
        self.0.on_enable(scene);
    }

    fn on_disable(&mut self, scene: &SceneView<'_>) {
        self.0.on_disable(scene);
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        self.0.update(ctx)
    }
}

pub(super) fn engine() -> Engine<HeadlessPlatform> {
    let config = EngineConfig::default()
        .with_worker_threads(4)
        .with_max_loops_per_second(0);
    Engine::new(config, HeadlessPlatform::default()).unwrap()
}
