//! Component trait, shared component handles and the type-erased slot stored by entities
//!
//! Every attached component lives in its own [`ComponentRef`] cell. The owning
//! entity is written into the cell by the factory before anyone else can see
//! the value and never changes afterwards.

use crate::ecs::entity::{Entity, EntityId};
use crate::ecs::scheduler::{panic_message, FrameContext, UpdateError, UpdatePhase};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::{type_name, Any};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Per-entity unit of state and behaviour.
///
/// Lifecycle, in order: constructed, bound to its owner, [`on_enable`](Self::on_enable)
/// right after attach, the update hooks once per frame while attached, and
/// [`on_disable`](Self::on_disable) right before detach (also when the owning
/// entity is dropped).
///
/// Update hooks of different components run concurrently. A hook holds the
/// write lock of its own component for its whole duration, so it must not
/// block on its own [`ComponentRef`]. See [`ComponentContext::entity`] for
/// reading sibling components.
pub trait Component: Send + Sync + 'static {
    /// Whether the update hooks take part in the frame.
    ///
    /// Plain data components set this to `false`: the scheduler then never
    /// dispatches them and never locks them during update phases, so systems
    /// and sibling components can always read them.
    const UPDATES: bool = true;

    /// Called once after the component was attached to `owner`.
    ///
    /// Acquire side-effecting resources here rather than in the constructor.
    fn on_enable(&mut self, owner: EntityId) {
        let _ = owner;
    }

    /// Called once before the component is detached from `owner`.
    fn on_disable(&mut self, owner: EntityId) {
        let _ = owner;
    }

    /// Runs every frame before [`update`](Self::update)
    fn early_update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs once per frame
    fn update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs every frame after [`update`](Self::update)
    fn late_update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        let _ = ctx;
        Ok(())
    }
}

/// What a component sees while one of its update hooks runs.
pub struct ComponentContext<'a> {
    entity: &'a Entity,
    frame: &'a FrameContext,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(entity: &'a Entity, frame: &'a FrameContext) -> Self {
        Self { entity, frame }
    }

    /// The entity this component is attached to.
    ///
    /// Only shared access is available mid-frame, which is enough to request a
    /// deferred removal with [`Entity::remove_component`].
    ///
    /// Sibling components whose [`Component::UPDATES`] is `false` are never
    /// locked by the scheduler and can be read with a blocking
    /// [`ComponentRef::read`]. A sibling that updates may be holding its own
    /// lock on another worker at the same time, and if it reads this
    /// component back both tasks wait forever. Use [`ComponentRef::try_read`]
    /// for those and treat `None` as "busy this phase".
    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// Identifier of the owning entity
    pub fn owner(&self) -> EntityId {
        self.entity.id()
    }

    /// Timing information for the current frame
    pub fn frame(&self) -> &'a FrameContext {
        self.frame
    }

    /// Seconds elapsed during the previous frame
    pub fn delta_time(&self) -> f32 {
        self.frame.delta_time
    }
}

pub(crate) struct ComponentCell<T> {
    owner: EntityId,
    state: RwLock<T>,
}

/// Shared handle to a component attached to an entity.
///
/// Cloning the handle is cheap; all clones point at the same component.
pub struct ComponentRef<T: Component> {
    inner: Arc<ComponentCell<T>>,
}

impl<T: Component> ComponentRef<T> {
    /// Component factory: binds the owner before the value becomes reachable.
    pub(crate) fn create(owner: EntityId, value: T) -> Self {
        Self {
            inner: Arc::new(ComponentCell {
                owner,
                state: RwLock::new(value),
            }),
        }
    }

    /// Entity this component was created for
    pub fn owner(&self) -> EntityId {
        self.inner.owner
    }

    /// Lock the component for reading, blocking while it is being written
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.state.read()
    }

    /// Lock the component for writing, blocking while it is being accessed
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.state.write()
    }

    /// Read without blocking, `None` if the component is currently being written
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.inner.state.try_read()
    }

    /// Write without blocking, `None` if the component is currently in use
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.inner.state.try_write()
    }

    /// Whether both handles refer to the same component instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Component> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Component> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("type", &type_name::<T>())
            .field("owner", &self.inner.owner)
            .finish()
    }
}

/// Object-safe view of a component cell, used by the frame scheduler.
pub(crate) trait ErasedComponent: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn updates(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
    fn run(&self, phase: UpdatePhase, ctx: &ComponentContext<'_>) -> Result<(), UpdateError>;
}

impl<T: Component> ErasedComponent for ComponentCell<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn updates(&self) -> bool {
        T::UPDATES
    }

    fn enable(&self) {
        self.state.write().on_enable(self.owner);
    }

    fn disable(&self) {
        self.state.write().on_disable(self.owner);
    }

    fn run(&self, phase: UpdatePhase, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        if !T::UPDATES {
            return Ok(());
        }
        let mut state = self.state.write();
        match phase {
            UpdatePhase::EarlyUpdate => state.early_update(ctx),
            UpdatePhase::Update => state.update(ctx),
            UpdatePhase::LateUpdate => state.late_update(ctx),
        }
    }
}

/// Entry of an entity's component map: the same cell seen as a schedulable
/// component and as `Any` for typed lookups.
pub(crate) struct ComponentSlot {
    erased: Arc<dyn ErasedComponent>,
    any: Arc<dyn Any + Send + Sync>,
}

impl ComponentSlot {
    pub(crate) fn new<T: Component>(component: &ComponentRef<T>) -> Self {
        let erased: Arc<dyn ErasedComponent> = component.inner.clone();
        let any: Arc<dyn Any + Send + Sync> = component.inner.clone();
        Self { erased, any }
    }

    pub(crate) fn erased(&self) -> &dyn ErasedComponent {
        self.erased.as_ref()
    }

    /// Run `on_disable`, turning a panic into an error.
    ///
    /// The lock is released during unwinding, so the cell stays usable.
    pub(crate) fn disable_contained(&self) -> Result<(), UpdateError> {
        let component = self.erased();
        panic::catch_unwind(AssertUnwindSafe(|| component.disable()))
            .map_err(|payload| UpdateError::Panicked(panic_message(payload.as_ref())))
    }

    pub(crate) fn downcast<T: Component>(&self) -> Option<ComponentRef<T>> {
        Arc::clone(&self.any)
            .downcast::<ComponentCell<T>>()
            .ok()
            .map(|inner| ComponentRef { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Health(i32);

    impl Component for Health {}

    #[test]
    fn test_factory_binds_owner() {
        let owner = EntityId::from_raw(7);
        let health = ComponentRef::create(owner, Health(10));
        assert_eq!(health.owner(), owner);
        assert_eq!(*health.read(), Health(10));
    }

    #[test]
    fn test_clones_share_state() {
        let health = ComponentRef::create(EntityId::from_raw(1), Health(3));
        let other = health.clone();
        other.write().0 = 42;
        assert_eq!(health.read().0, 42);
        assert!(health.ptr_eq(&other));
    }

    #[test]
    fn test_try_write_fails_while_read_locked() {
        let health = ComponentRef::create(EntityId::from_raw(1), Health(3));
        let guard = health.read();
        assert!(health.try_write().is_none());
        drop(guard);
        assert!(health.try_write().is_some());
    }

    #[test]
    fn test_slot_downcast_checks_type() {
        #[derive(Default)]
        struct Armor;
        impl Component for Armor {}

        let health = ComponentRef::create(EntityId::from_raw(1), Health(5));
        let slot = ComponentSlot::new(&health);
        assert!(slot.downcast::<Health>().is_some_and(|h| h.ptr_eq(&health)));
        assert!(slot.downcast::<Armor>().is_none());
        assert!(slot.erased().type_name().ends_with("Health"));
    }

    struct Ledger(i32);

    impl Component for Ledger {
        const UPDATES: bool = false;

        fn on_disable(&mut self, _owner: EntityId) {
            panic!("ledger closed twice");
        }

        fn update(&mut self, _ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_passive_component_is_not_run_or_locked() {
        let ledger = ComponentRef::create(EntityId::from_raw(2), Ledger(0));
        let slot = ComponentSlot::new(&ledger);
        assert!(!slot.erased().updates());
        assert!(ComponentSlot::new(&ComponentRef::create(EntityId::from_raw(2), Health(1)))
            .erased()
            .updates());

        let entity = Entity::new("books");
        let frame = FrameContext::default();
        let ctx = ComponentContext::new(&entity, &frame);
        // A held read guard would block a write lock on this thread.
        let guard = ledger.read();
        for phase in UpdatePhase::ALL {
            assert_eq!(slot.erased().run(phase, &ctx), Ok(()));
        }
        assert_eq!(guard.0, 0);
    }

    #[test]
    fn test_disable_panic_is_contained() {
        let ledger = ComponentRef::create(EntityId::from_raw(4), Ledger(9));
        let slot = ComponentSlot::new(&ledger);
        assert_eq!(
            slot.disable_contained(),
            Err(UpdateError::Panicked("ledger closed twice".into()))
        );
        assert_eq!(ledger.try_write().map(|ledger| ledger.0), Some(9));
    }
}
