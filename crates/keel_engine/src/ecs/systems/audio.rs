//! Audio system: keeps sources and the listener in step with their transforms
//!
//! Systems contain logic, components contain data. This one copies each
//! owner's [`TransformComponent`] into the spatial state of its 3D audio
//! sources and of the scene's listener, deriving velocity from the
//! displacement since the last sync.

use crate::ecs::components::{AudioListenerComponent, AudioSourceComponent, TransformComponent};
use crate::ecs::{Component, ComponentRef, SceneView, System, SystemContext, UpdateError};
use crate::foundation::math::Vec3;

/// Syncs audio emitters and the listener with their owner's transform
#[derive(Debug, Default)]
pub struct AudioSystem;

impl System for AudioSystem {
    fn on_enable(&mut self, scene: &SceneView<'_>) {
        sync(scene, 0.0);
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
        sync(ctx.scene(), ctx.delta_time());
        Ok(())
    }
}

struct Pose {
    position: Vec3,
    up: Vec3,
    forward: Vec3,
}

fn pose_of<T: Component>(scene: &SceneView<'_>, component: &ComponentRef<T>) -> Option<Pose> {
    let transform = scene
        .entity(component.owner())?
        .get_component::<TransformComponent>()?;
    let transform = transform.read();
    Some(Pose {
        position: transform.position,
        up: transform.up(),
        forward: transform.forward(),
    })
}

fn velocity(current: Vec3, previous: Vec3, delta_time: f32) -> Vec3 {
    if delta_time > 0.0 {
        (current - previous) / delta_time
    } else {
        Vec3::zeros()
    }
}

fn sync(scene: &SceneView<'_>, delta_time: f32) {
    for source in scene.get_components::<AudioSourceComponent>() {
        if !source.read().is_3d {
            continue;
        }
        // Transform lock is released before the source is written.
        let Some(pose) = pose_of(scene, &source) else {
            continue;
        };
        let mut source = source.write();
        source.velocity = velocity(pose.position, source.position, delta_time);
        source.position = pose.position;
        source.set_orientation(pose.up, pose.forward);
    }

    let listeners = scene.get_components::<AudioListenerComponent>();
    if listeners.len() > 1 {
        log::warn!(
            "Scene has {} audio listeners, only the first one is used",
            listeners.len()
        );
    }
    if let Some(listener) = listeners.first() {
        if let Some(pose) = pose_of(scene, listener) {
            let mut listener = listener.write();
            listener.velocity = velocity(pose.position, listener.position, delta_time);
            listener.position = pose.position;
            listener.set_orientation(pose.up, pose.forward);
        }
    }
}
