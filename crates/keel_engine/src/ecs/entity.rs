//! Entity implementation
//!
//! An entity owns at most one component per concrete type. Mutations are
//! recorded as [`ComponentEvent`]s in an outbox that whoever indexes the
//! entity (normally its [`Scene`](crate::ecs::Scene)) drains and applies.

use crate::ecs::component::{Component, ComponentRef, ComponentSlot};
use crate::ecs::scheduler::{TaskFailure, TaskOwner, TaskStage};
use parking_lot::Mutex;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn allocate() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Change to an entity's active component set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentEvent {
    /// A component was attached
    Added {
        /// Entity that gained the component
        entity: EntityId,
        /// Concrete component type
        component: TypeId,
    },
    /// A component was detached
    Removed {
        /// Entity that lost the component
        entity: EntityId,
        /// Concrete component type
        component: TypeId,
    },
}

/// Container owning a unique-by-type set of components
pub struct Entity {
    id: EntityId,
    name: String,
    components: HashMap<TypeId, ComponentSlot>,
    // Keys here are always present in `components`.
    marked_for_removal: Mutex<Vec<TypeId>>,
    events: Vec<ComponentEvent>,
}

impl Entity {
    /// Create an empty entity with a fresh identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::allocate(),
            name: name.into(),
            components: HashMap::new(),
            marked_for_removal: Mutex::new(Vec::new()),
            events: Vec::new(),
        }
    }

    /// Get the entity identifier
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Human readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a default-constructed component of type `T`.
    ///
    /// Returns `None` without touching the entity if a `T` is already attached.
    pub fn add_component<T: Component + Default>(&mut self) -> Option<ComponentRef<T>> {
        self.insert_component(T::default())
    }

    /// Attach `value` as this entity's `T` component.
    ///
    /// The "added" event is recorded before [`Component::on_enable`] runs, and
    /// the handle is returned once `on_enable` has finished. Returns `None` if
    /// a `T` is already attached; `value` is dropped in that case.
    pub fn insert_component<T: Component>(&mut self, value: T) -> Option<ComponentRef<T>> {
        let key = TypeId::of::<T>();
        if self.components.contains_key(&key) {
            log::debug!("{} already has a {}", self.id, type_name::<T>());
            return None;
        }

        let component = ComponentRef::create(self.id, value);
        let slot = ComponentSlot::new(&component);
        self.components.insert(key, slot);
        self.events.push(ComponentEvent::Added {
            entity: self.id,
            component: key,
        });
        if let Some(slot) = self.components.get(&key) {
            slot.erased().enable();
        }
        Some(component)
    }

    /// Mark the `T` component for removal at the next cleanup point.
    ///
    /// Nothing is detached yet: the component keeps updating and stays
    /// visible to queries until [`remove_all_marked_for_removal`](Self::remove_all_marked_for_removal)
    /// runs. Safe to call from concurrent update tasks. Returns whether a `T`
    /// was attached.
    pub fn remove_component<T: Component>(&self) -> bool {
        let key = TypeId::of::<T>();
        if !self.components.contains_key(&key) {
            return false;
        }
        let mut marked = self.marked_for_removal.lock();
        if !marked.contains(&key) {
            marked.push(key);
        }
        true
    }

    /// Disable and detach the `T` component right now.
    ///
    /// Must not be called while an update phase is running. A panicking
    /// `on_disable` is logged and the component is detached anyway. Returns
    /// whether a component was detached.
    pub fn remove_component_immediate<T: Component>(&mut self) -> bool {
        let key = TypeId::of::<T>();
        self.marked_for_removal.get_mut().retain(|marked| *marked != key);
        match self.detach(key) {
            Some(Ok(())) => true,
            Some(Err(failure)) => {
                log::error!("{failure}");
                true
            }
            None => false,
        }
    }

    /// Detach every component marked for removal, then clear the marks.
    ///
    /// Failing `on_disable` hooks are logged. Returns how many components
    /// were detached.
    pub fn remove_all_marked_for_removal(&mut self) -> usize {
        let (detached, failures) = self.detach_marked();
        for failure in &failures {
            log::error!("{failure}");
        }
        detached
    }

    /// Detach every marked component, gathering `on_disable` failures.
    ///
    /// Every mark is processed even if earlier hooks panic.
    pub(crate) fn detach_marked(&mut self) -> (usize, Vec<TaskFailure>) {
        let marked = std::mem::take(self.marked_for_removal.get_mut());
        let mut detached = 0;
        let mut failures = Vec::new();
        for key in marked {
            match self.detach(key) {
                Some(Ok(())) => detached += 1,
                Some(Err(failure)) => {
                    detached += 1;
                    failures.push(failure);
                }
                None => {}
            }
        }
        (detached, failures)
    }

    /// `on_disable`, "removed" event, erase. The slot is erased even when the
    /// hook panics.
    fn detach(&mut self, key: TypeId) -> Option<Result<(), TaskFailure>> {
        let slot = self.components.get(&key)?;
        let outcome = slot.disable_contained().map_err(|error| TaskFailure {
            owner: TaskOwner::Component {
                entity: self.id,
                component: slot.erased().type_name(),
            },
            stage: TaskStage::Disable,
            error,
        });
        self.events.push(ComponentEvent::Removed {
            entity: self.id,
            component: key,
        });
        self.components.remove(&key);
        Some(outcome)
    }

    /// Look up the attached `T` component
    pub fn get_component<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(ComponentSlot::downcast::<T>)
    }

    /// Whether a `T` component is attached (marked ones included)
    pub fn has_component<T: Component>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Whether the `T` component is waiting for the next cleanup
    pub fn is_marked_for_removal<T: Component>(&self) -> bool {
        self.marked_for_removal.lock().contains(&TypeId::of::<T>())
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Types of all attached components
    pub fn component_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.components.keys().copied()
    }

    /// Drain the events recorded since the last call
    pub(crate) fn take_events(&mut self) -> Vec<ComponentEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = &ComponentSlot> {
        self.components.values()
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        for slot in self.components.values() {
            if let Err(error) = slot.disable_contained() {
                log::error!("{} {} failed in disable: {error}", self.id, slot.erased().type_name());
            }
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}
