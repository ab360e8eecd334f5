//! Orbit demo application
//!
//! Runs a small scene headlessly: a ring of emitters orbits a listener, a
//! camera follows window resizes and one short-lived entity removes its own
//! component after a few frames.
//!
//! Usage: `orbit_demo [config.toml|config.ron] [frames]`

use keel_engine::prelude::*;
use keel_engine::foundation::logging;
use std::f32::consts::TAU;
use thiserror::Error;

const DEFAULT_FRAMES: u64 = 300;
const EMITTERS: usize = 8;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] keel_engine::config::ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid frame count '{0}'")]
    FrameCount(String),
}

/// Moves its entity around a circle in the XZ plane
struct Orbit {
    radius: f32,
    speed: f32,
    angle: f32,
}

impl Component for Orbit {
    fn update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        self.angle = (self.angle + self.speed * ctx.delta_time()) % TAU;
        let transform = ctx
            .entity()
            .get_component::<TransformComponent>()
            .ok_or(UpdateError::MissingComponent {
                entity: ctx.owner(),
                component: "TransformComponent",
            })?;
        let mut transform = transform.write();
        transform.position = Vec3::new(self.angle.cos(), 0.0, self.angle.sin()) * self.radius;
        Ok(())
    }
}

/// Counts down and then asks for its own removal
struct Fuse {
    frames_left: u32,
}

impl Component for Fuse {
    fn on_disable(&mut self, owner: EntityId) {
        log::info!("Fuse on {owner} burnt out");
    }

    fn update(&mut self, ctx: &ComponentContext<'_>) -> Result<(), UpdateError> {
        if self.frames_left == 0 {
            ctx.entity().remove_component::<Self>();
        } else {
            self.frames_left -= 1;
        }
        Ok(())
    }
}

fn build_scene() -> Scene {
    let mut scene = Scene::new("orbits");

    let mut listener = Entity::new("listener");
    listener.add_component::<TransformComponent>();
    listener.add_component::<AudioListenerComponent>();
    listener.add_component::<CameraComponent>();
    scene.add_entity(listener);

    for index in 0..EMITTERS {
        let mut emitter = Entity::new(format!("emitter-{index}"));
        emitter.add_component::<TransformComponent>();
        emitter.add_component::<AudioSourceComponent>();
        emitter.insert_component(Orbit {
            radius: 2.0 + index as f32,
            speed: 1.0 / (1.0 + index as f32),
            angle: TAU * index as f32 / EMITTERS as f32,
        });
        scene.add_entity(emitter);
    }

    let mut fuse = Entity::new("fuse");
    fuse.insert_component(Fuse { frames_left: 10 });
    scene.add_entity(fuse);

    scene.add_system::<AudioSystem>();
    scene.add_system::<AutoCameraResolution>();
    scene
}

fn main() -> Result<(), DemoError> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load_from_file(&path)?,
        None => EngineConfig::default(),
    };
    let frames = match args.next() {
        Some(raw) => raw.parse().map_err(|_| DemoError::FrameCount(raw))?,
        None => DEFAULT_FRAMES,
    };
    logging::init_with_level(&config.log_level);

    let mut engine = Engine::create(config, |window| {
        let mut platform = HeadlessPlatform::from_config(window)?.with_frame_budget(frames);
        platform.push_event(PlatformEvent::Resized {
            width: window.width / 2,
            height: window.height / 2,
        });
        Ok(platform)
    })?;
    engine.load_scene(build_scene());
    engine.run();

    if let Some(scene) = engine.active_scene() {
        for source in scene.get_components::<AudioSourceComponent>() {
            let name = scene.entity(source.owner()).map_or("?", Entity::name);
            let source = source.read();
            log::info!(
                "{name} at ({:.2}, {:.2}, {:.2}) moving {:.2} u/s",
                source.position.x,
                source.position.y,
                source.position.z,
                source.velocity.norm()
            );
        }
        for camera in scene.get_components::<CameraComponent>() {
            let (width, height) = camera.read().resolution;
            log::info!("Camera resolution {width}x{height}");
        }
    }
    log::info!(
        "Presented {} of {} frames",
        engine.platform().frames_presented(),
        engine.frame_count()
    );
    Ok(())
}
