//! # Scene
//!
//! A scene owns its entities (in insertion order), its systems (in
//! registration order) and an index from component type to the entities that
//! currently hold a component of that type. The index is kept up to date
//! incrementally by applying the [`ComponentEvent`]s entities record.

use crate::ecs::component::{Component, ComponentRef};
use crate::ecs::entity::{ComponentEvent, Entity, EntityId};
use crate::ecs::scheduler::{self, FrameContext, PhaseOutcome, TaskFailure, UpdatePhase};
use crate::ecs::system::{AnySystem, System};
use crate::platform::PlatformEvent;
use rayon::prelude::*;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

type ComponentIndex = HashMap<TypeId, Vec<EntityId>>;

pub(crate) struct SystemSlot {
    pub(crate) key: TypeId,
    pub(crate) name: &'static str,
    pub(crate) system: Box<dyn AnySystem>,
}

/// Scene storing all entities, components and systems that are active together
pub struct Scene {
    name: String,
    entities: Vec<Entity>,
    positions: HashMap<EntityId, usize>,
    index: ComponentIndex,
    systems: Vec<SystemSlot>,
}

impl Scene {
    /// Create an empty scene
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            positions: HashMap::new(),
            index: HashMap::new(),
            systems: Vec::new(),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only view over the entities and the component index
    pub fn view(&self) -> SceneView<'_> {
        SceneView {
            entities: &self.entities,
            positions: &self.positions,
            index: &self.index,
        }
    }

    /// Add an entity, indexing any components it already carries
    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = entity.id();
        // Everything currently attached is indexed below.
        entity.take_events();
        for component in entity.component_types() {
            self.index.entry(component).or_default().push(id);
        }
        self.positions.insert(id, self.entities.len());
        self.entities.push(entity);
        log::trace!("Added {} to scene '{}'", id, self.name);
        id
    }

    /// Remove an entity from the scene and hand it back.
    ///
    /// The entity keeps its components; they are disabled when it is dropped.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let position = self.positions.remove(&id)?;
        let mut entity = self.entities.remove(position);
        for (offset, moved) in self.entities[position..].iter().enumerate() {
            self.positions.insert(moved.id(), position + offset);
        }

        for event in entity.take_events() {
            apply_event(&mut self.index, event);
        }
        for component in entity.component_types() {
            apply_event(
                &mut self.index,
                ComponentEvent::Removed { entity: id, component },
            );
        }
        log::trace!("Removed {} from scene '{}'", id, self.name);
        Some(entity)
    }

    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.view().entity(id)
    }

    /// Mutable access to an entity.
    ///
    /// Component changes made through the returned guard reach the index when
    /// the guard is dropped.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        let position = *self.positions.get(&id)?;
        Some(EntityMut {
            entity: &mut self.entities[position],
            index: &mut self.index,
        })
    }

    /// All entities in insertion order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of entities in the scene
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Every `T` component currently attached to an entity of this scene.
    ///
    /// Components marked for removal are still returned until cleanup.
    pub fn get_components<T: Component>(&self) -> Vec<ComponentRef<T>> {
        self.view().get_components::<T>()
    }

    /// Entities currently holding a `T` component
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.view().entities_with::<T>()
    }

    /// Add a default-constructed system. Returns `None` if one of that type exists.
    ///
    /// The system is not enabled until the scene is loaded into the engine.
    pub fn add_system<T: System + Default>(&mut self) -> Option<&mut T> {
        if self.has_system::<T>() {
            log::debug!("Scene '{}' already has system {}", self.name, type_name::<T>());
            return None;
        }
        self.insert_system(T::default())
    }

    /// Add an already constructed system. Returns `None` if one of that type exists.
    pub fn insert_system<T: System>(&mut self, system: T) -> Option<&mut T> {
        let key = TypeId::of::<T>();
        if self.has_system::<T>() {
            log::debug!("Scene '{}' already has system {}", self.name, type_name::<T>());
            return None;
        }
        self.systems.push(SystemSlot {
            key,
            name: type_name::<T>(),
            system: Box::new(system),
        });
        self.systems
            .last_mut()
            .and_then(|slot| slot.system.as_any_mut().downcast_mut::<T>())
    }

    /// Remove a system and hand it back.
    ///
    /// No lifecycle hook runs; disabling a system removed from an active
    /// scene is up to the caller.
    pub fn remove_system<T: System>(&mut self) -> Option<T> {
        let key = TypeId::of::<T>();
        let position = self.systems.iter().position(|slot| slot.key == key)?;
        let slot = self.systems.remove(position);
        slot.system.into_any().downcast::<T>().ok().map(|system| *system)
    }

    /// Look up a system by type
    pub fn get_system<T: System>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        self.systems
            .iter()
            .find(|slot| slot.key == key)
            .and_then(|slot| slot.system.as_any().downcast_ref::<T>())
    }

    /// Look up a system by type for mutation
    pub fn get_system_mut<T: System>(&mut self) -> Option<&mut T> {
        let key = TypeId::of::<T>();
        self.systems
            .iter_mut()
            .find(|slot| slot.key == key)
            .and_then(|slot| slot.system.as_any_mut().downcast_mut::<T>())
    }

    /// Whether a system of type `T` is registered
    pub fn has_system<T: System>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.systems.iter().any(|slot| slot.key == key)
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Type names of the registered systems, in registration order
    pub fn system_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.systems.iter().map(|slot| slot.name)
    }

    /// Run deferred removals on every entity in parallel, then update the index.
    ///
    /// Failing `on_disable` hooks are logged. Returns how many components
    /// were detached.
    pub fn remove_all_marked_for_removal(&mut self) -> usize {
        let (removed, failures) = self.detach_marked();
        for failure in &failures {
            log::error!("{failure}");
        }
        removed
    }

    /// Deferred removal for the frame loop: failures are handed back instead
    /// of logged.
    pub(crate) fn detach_marked(&mut self) -> (usize, Vec<TaskFailure>) {
        let (removed, failures) = self
            .entities
            .par_iter_mut()
            .map(Entity::detach_marked)
            .reduce(
                || (0, Vec::new()),
                |(count, mut failures), (more, others)| {
                    failures.extend(others);
                    (count + more, failures)
                },
            );
        self.sync_index();
        (removed, failures)
    }

    /// Apply all outstanding entity events to the index
    pub(crate) fn sync_index(&mut self) {
        for entity in self.entities.iter_mut().filter(|e| e.has_pending_events()) {
            for event in entity.take_events() {
                apply_event(&mut self.index, event);
            }
        }
    }

    pub(crate) fn enable_systems(&mut self) {
        let (systems, view) = self.split();
        for slot in systems {
            log::debug!("Enabling system {}", slot.name);
            slot.system.on_enable(&view);
        }
    }

    pub(crate) fn disable_systems(&mut self) {
        let (systems, view) = self.split();
        for slot in systems {
            log::debug!("Disabling system {}", slot.name);
            slot.system.on_disable(&view);
        }
    }

    pub(crate) fn run_phase(
        &mut self,
        phase: UpdatePhase,
        frame: &FrameContext,
        events: &[PlatformEvent],
    ) -> PhaseOutcome {
        let (systems, view) = self.split();
        scheduler::run_phase(systems, view, phase, frame, events)
    }

    fn split(&mut self) -> (&mut [SystemSlot], SceneView<'_>) {
        let Self {
            entities,
            positions,
            index,
            systems,
            ..
        } = self;
        let view = SceneView {
            entities: entities.as_slice(),
            positions: &*positions,
            index: &*index,
        };
        (systems.as_mut_slice(), view)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

fn apply_event(index: &mut ComponentIndex, event: ComponentEvent) {
    match event {
        ComponentEvent::Added { entity, component } => {
            let bucket = index.entry(component).or_default();
            if !bucket.contains(&entity) {
                bucket.push(entity);
            }
        }
        ComponentEvent::Removed { entity, component } => {
            if let Some(bucket) = index.get_mut(&component) {
                bucket.retain(|id| *id != entity);
                if bucket.is_empty() {
                    index.remove(&component);
                }
            }
        }
    }
}

/// Read-only view of a scene's entities and component index.
///
/// This is what systems query while the scene's system registry is busy
/// running them.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    entities: &'a [Entity],
    positions: &'a HashMap<EntityId, usize>,
    index: &'a ComponentIndex,
}

impl<'a> SceneView<'a> {
    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&'a Entity> {
        self.positions
            .get(&id)
            .and_then(|position| self.entities.get(*position))
    }

    /// All entities in insertion order
    pub fn entities(&self) -> std::slice::Iter<'a, Entity> {
        self.entities.iter()
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Every `T` component currently attached, in the order the entities
    /// acquired it. Costs O(matching entities).
    pub fn get_components<T: Component>(&self) -> Vec<ComponentRef<T>> {
        self.index
            .get(&TypeId::of::<T>())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entity(*id))
                    .filter_map(Entity::get_component::<T>)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entities currently holding a `T` component
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.index
            .get(&TypeId::of::<T>())
            .cloned()
            .unwrap_or_default()
    }
}

/// Mutable entity borrowed from a scene; syncs the scene index on drop
pub struct EntityMut<'a> {
    entity: &'a mut Entity,
    index: &'a mut ComponentIndex,
}

impl Deref for EntityMut<'_> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        self.entity
    }
}

impl DerefMut for EntityMut<'_> {
    fn deref_mut(&mut self) -> &mut Entity {
        self.entity
    }
}

impl Drop for EntityMut<'_> {
    fn drop(&mut self) {
        for event in self.entity.take_events() {
            apply_event(self.index, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::system::SystemContext;
    use crate::ecs::scheduler::UpdateError;

    #[derive(Debug, Default)]
    struct Transform;
    impl Component for Transform {}

    #[derive(Debug, Default)]
    struct Mesh;
    impl Component for Mesh {}

    #[derive(Default)]
    struct Rotator;
    impl System for Rotator {
        fn update(&mut self, _ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Mover {
        speed: f32,
    }
    impl System for Mover {
        fn update(&mut self, _ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    fn owners<T: Component>(scene: &Scene) -> Vec<EntityId> {
        scene
            .get_components::<T>()
            .iter()
            .map(ComponentRef::owner)
            .collect()
    }

    #[test]
    fn test_transform_lifecycle_scenario() {
        let mut scene = Scene::new("test");
        let mut entity = Entity::new("e");
        let transform = entity.add_component::<Transform>();
        assert!(transform.is_some());
        assert!(entity.add_component::<Transform>().is_none());

        let id = scene.add_entity(entity);
        let found = scene.get_components::<Transform>();
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(transform.as_ref().unwrap()));

        assert!(scene.entity(id).unwrap().remove_component::<Transform>());
        assert_eq!(scene.get_components::<Transform>().len(), 1);

        scene.entity_mut(id).unwrap().remove_all_marked_for_removal();
        assert!(scene.get_components::<Transform>().is_empty());
    }

    #[test]
    fn test_index_follows_entity_mutation() {
        let mut scene = Scene::default();
        let a = scene.add_entity(Entity::new("a"));
        let b = scene.add_entity(Entity::new("b"));

        scene.entity_mut(b).unwrap().add_component::<Mesh>();
        scene.entity_mut(a).unwrap().add_component::<Mesh>();
        scene.entity_mut(a).unwrap().add_component::<Transform>();
        assert_eq!(owners::<Mesh>(&scene), vec![b, a]);
        assert_eq!(owners::<Transform>(&scene), vec![a]);

        scene.entity_mut(b).unwrap().remove_component_immediate::<Mesh>();
        assert_eq!(owners::<Mesh>(&scene), vec![a]);
        assert_eq!(scene.entities_with::<Mesh>(), vec![a]);

        {
            let mut entity = scene.entity_mut(a).unwrap();
            entity.remove_component_immediate::<Transform>();
            entity.add_component::<Transform>();
        }
        assert_eq!(owners::<Transform>(&scene), vec![a]);
    }

    #[test]
    fn test_add_entity_indexes_existing_components() {
        let mut scene = Scene::default();
        let mut entity = Entity::new("prefilled");
        entity.add_component::<Mesh>();
        entity.add_component::<Transform>();
        let id = scene.add_entity(entity);

        assert_eq!(owners::<Mesh>(&scene), vec![id]);
        assert_eq!(owners::<Transform>(&scene), vec![id]);
    }

    #[test]
    fn test_remove_entity_clears_index_and_keeps_order() {
        let mut scene = Scene::default();
        let ids: Vec<_> = (0..4)
            .map(|i| {
                let mut entity = Entity::new(format!("e{i}"));
                entity.add_component::<Mesh>();
                scene.add_entity(entity)
            })
            .collect();

        let removed = scene.remove_entity(ids[1]).unwrap();
        assert!(removed.has_component::<Mesh>());
        assert_eq!(owners::<Mesh>(&scene), vec![ids[0], ids[2], ids[3]]);
        assert!(scene.entity(ids[1]).is_none());
        assert_eq!(scene.entity(ids[3]).unwrap().id(), ids[3]);

        let names: Vec<_> = scene.entities().map(Entity::name).collect();
        assert_eq!(names, vec!["e0", "e2", "e3"]);
        assert!(scene.remove_entity(ids[1]).is_none());
    }

    #[test]
    fn test_parallel_cleanup_updates_index() {
        let mut scene = Scene::default();
        let ids: Vec<_> = (0..16)
            .map(|i| {
                let mut entity = Entity::new(format!("e{i}"));
                entity.add_component::<Mesh>();
                scene.add_entity(entity)
            })
            .collect();

        for id in ids.iter().step_by(2) {
            scene.entity(*id).unwrap().remove_component::<Mesh>();
        }
        assert_eq!(scene.get_components::<Mesh>().len(), 16);

        assert_eq!(scene.remove_all_marked_for_removal(), 8);
        let expected: Vec<_> = ids.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(owners::<Mesh>(&scene), expected);
    }

    #[test]
    fn test_systems_are_unique_per_type() {
        let mut scene = Scene::default();
        assert!(scene.add_system::<Rotator>().is_some());
        assert!(scene.add_system::<Rotator>().is_none());
        scene.insert_system(Mover { speed: 2.0 }).unwrap();
        assert!(scene.insert_system(Mover { speed: 5.0 }).is_none());

        assert_eq!(scene.system_count(), 2);
        assert_eq!(scene.get_system::<Mover>().unwrap().speed, 2.0);
        scene.get_system_mut::<Mover>().unwrap().speed = 3.0;

        let names: Vec<_> = scene.system_names().collect();
        assert!(names[0].ends_with("Rotator"));
        assert!(names[1].ends_with("Mover"));

        let mover = scene.remove_system::<Mover>().unwrap();
        assert_eq!(mover.speed, 3.0);
        assert!(scene.remove_system::<Mover>().is_none());
        assert!(scene.get_system::<Mover>().is_none());
        assert!(scene.add_system::<Mover>().is_some());
    }
}
