//! Per-frame fan-out and join of system and component updates
//!
//! Every system and every attached component of a phase is dispatched to the
//! worker pool at once, and the phase returns only after all of them finished.
//! Outcomes are gathered for every task: a failing or panicking task never
//! cancels its siblings.

use crate::ecs::component::{ComponentContext, ComponentSlot};
use crate::ecs::entity::{Entity, EntityId};
use crate::ecs::scene::{SceneView, SystemSlot};
use crate::ecs::system::SystemContext;
use crate::platform::PlatformEvent;
use rayon::prelude::*;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Update phases of a frame, executed in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdatePhase {
    /// Runs before the main update
    EarlyUpdate,
    /// Main per-frame update
    Update,
    /// Runs after the main update
    LateUpdate,
}

impl UpdatePhase {
    /// All phases in execution order
    pub const ALL: [Self; 3] = [Self::EarlyUpdate, Self::Update, Self::LateUpdate];

    /// Short lowercase name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::EarlyUpdate => "early_update",
            Self::Update => "update",
            Self::LateUpdate => "late_update",
        }
    }
}

/// Where in the frame a task ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStage {
    /// One of the update phases
    Phase(UpdatePhase),
    /// A component's `on_disable` while it was being detached
    Disable,
}

impl TaskStage {
    /// Short lowercase name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Phase(phase) => phase.name(),
            Self::Disable => "disable",
        }
    }
}

impl From<UpdatePhase> for TaskStage {
    fn from(phase: UpdatePhase) -> Self {
        Self::Phase(phase)
    }
}

/// Frame timing shared by all update tasks of a frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameContext {
    /// Index of the frame, starting at 0
    pub frame: u64,
    /// Seconds the previous frame took
    pub delta_time: f32,
    /// Seconds since the engine started ticking
    pub total_time: f32,
}

/// Failure reported by a single update task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The task returned an error
    #[error("{0}")]
    Failed(String),

    /// A component the task relies on is not attached
    #[error("{entity} has no {component}")]
    MissingComponent {
        /// Entity that was inspected
        entity: EntityId,
        /// Type name of the missing component
        component: &'static str,
    },

    /// The task panicked; the panic was contained
    #[error("panicked: {0}")]
    Panicked(String),
}

impl UpdateError {
    /// Build a [`UpdateError::Failed`] from a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Which task a failure came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOwner {
    /// A scene system, by type name
    System(&'static str),
    /// A component, by owner and type name
    Component {
        /// Owning entity
        entity: EntityId,
        /// Component type name
        component: &'static str,
    },
}

impl fmt::Display for TaskOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(name) => write!(f, "system {name}"),
            Self::Component { entity, component } => write!(f, "component {component} of {entity}"),
        }
    }
}

/// Outcome of a failed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Task that failed
    pub owner: TaskOwner,
    /// Where the task ran
    pub stage: TaskStage,
    /// What went wrong
    pub error: UpdateError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed in {}: {}", self.owner, self.stage.name(), self.error)
    }
}

/// Wall time a single update task took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTiming {
    /// Task that ran
    pub owner: TaskOwner,
    /// Phase it ran in
    pub phase: UpdatePhase,
    /// Time between dispatch and completion, failures included
    pub elapsed: Duration,
}

/// Everything one phase produced
#[derive(Debug, Default)]
pub(crate) struct PhaseOutcome {
    pub(crate) failures: Vec<TaskFailure>,
    pub(crate) timings: Vec<TaskTiming>,
}

impl FromIterator<(TaskTiming, Option<TaskFailure>)> for PhaseOutcome {
    fn from_iter<I: IntoIterator<Item = (TaskTiming, Option<TaskFailure>)>>(iter: I) -> Self {
        let mut outcome = Self::default();
        for (timing, failure) in iter {
            outcome.timings.push(timing);
            outcome.failures.extend(failure);
        }
        outcome
    }
}

/// Run one phase for every system and every updating component, then join.
pub(crate) fn run_phase(
    systems: &mut [SystemSlot],
    scene: SceneView<'_>,
    phase: UpdatePhase,
    frame: &FrameContext,
    events: &[PlatformEvent],
) -> PhaseOutcome {
    let ctx = SystemContext::new(scene, frame, events);
    let components: Vec<(&Entity, &ComponentSlot)> = scene
        .entities()
        .flat_map(|entity| entity.slots().map(move |slot| (entity, slot)))
        .filter(|(_, slot)| slot.erased().updates())
        .collect();

    let (system_tasks, component_tasks) = rayon::join(
        || {
            systems
                .par_iter_mut()
                .map(|slot| run_system(slot, phase, &ctx))
                .collect::<Vec<_>>()
        },
        || {
            components
                .par_iter()
                .map(|(entity, slot)| run_component(entity, slot, phase, frame))
                .collect::<Vec<_>>()
        },
    );
    system_tasks.into_iter().chain(component_tasks).collect()
}

fn run_system(
    slot: &mut SystemSlot,
    phase: UpdatePhase,
    ctx: &SystemContext<'_>,
) -> (TaskTiming, Option<TaskFailure>) {
    let system = &mut slot.system;
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match phase {
        UpdatePhase::EarlyUpdate => system.early_update(ctx),
        UpdatePhase::Update => system.update(ctx),
        UpdatePhase::LateUpdate => system.late_update(ctx),
    }));
    settle(TaskOwner::System(slot.name), phase, started.elapsed(), outcome)
}

fn run_component(
    entity: &Entity,
    slot: &ComponentSlot,
    phase: UpdatePhase,
    frame: &FrameContext,
) -> (TaskTiming, Option<TaskFailure>) {
    let ctx = ComponentContext::new(entity, frame);
    let component = slot.erased();
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| component.run(phase, &ctx)));
    let owner = TaskOwner::Component {
        entity: entity.id(),
        component: component.type_name(),
    };
    settle(owner, phase, started.elapsed(), outcome)
}

fn settle(
    owner: TaskOwner,
    phase: UpdatePhase,
    elapsed: Duration,
    outcome: std::thread::Result<Result<(), UpdateError>>,
) -> (TaskTiming, Option<TaskFailure>) {
    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(payload) => Some(UpdateError::Panicked(panic_message(payload.as_ref()))),
    };
    let failure = error.map(|error| TaskFailure {
        owner: owner.clone(),
        stage: phase.into(),
        error,
    });
    (TaskTiming { owner, phase, elapsed }, failure)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(
            UpdatePhase::ALL,
            [UpdatePhase::EarlyUpdate, UpdatePhase::Update, UpdatePhase::LateUpdate]
        );
        assert!(UpdatePhase::EarlyUpdate < UpdatePhase::LateUpdate);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_failure_display_names_the_task() {
        let failure = TaskFailure {
            owner: TaskOwner::Component {
                entity: EntityId::from_raw(3),
                component: "Spinner",
            },
            stage: UpdatePhase::Update.into(),
            error: UpdateError::failed("no mesh"),
        };
        assert_eq!(failure.to_string(), "component Spinner of entity#3 failed in update: no mesh");

        let failure = TaskFailure {
            owner: TaskOwner::System("Spawner"),
            stage: TaskStage::Disable,
            error: UpdateError::Panicked("gone".into()),
        };
        assert_eq!(failure.to_string(), "system Spawner failed in disable: panicked: gone");
    }

    #[test]
    fn test_settle_times_successful_and_failed_tasks() {
        let owner = TaskOwner::System("Clock");
        let elapsed = Duration::from_millis(3);

        let (timing, failure) = settle(owner.clone(), UpdatePhase::LateUpdate, elapsed, Ok(Ok(())));
        assert!(failure.is_none());
        assert_eq!(timing.elapsed, elapsed);
        assert_eq!(timing.phase, UpdatePhase::LateUpdate);

        let (timing, failure) = settle(owner.clone(), UpdatePhase::Update, elapsed, Err(Box::new("tick") as Box<dyn Any + Send>));
        assert_eq!(timing.owner, owner);
        let failure = failure.unwrap();
        assert_eq!(failure.stage, TaskStage::Phase(UpdatePhase::Update));
        assert_eq!(failure.error, UpdateError::Panicked("tick".into()));
    }
}
