//! Core engine implementation
//!
//! The engine owns the platform, the worker pool, the modules and at most one
//! active scene, and drives them through the frame loop:
//!
//! 1. pump platform events and update modules
//! 2. acquire the frame (on failure presentation is skipped)
//! 3. run early, main and late update phases of the active scene, each one a
//!    parallel fan-out over all systems and components joined before the next
//! 4. present
//! 5. detach components marked for removal, reporting failing `on_disable`
//!    hooks alongside the update failures
//! 6. wait out the frame limiter and advance the timer

use crate::config::{ConfigError, EngineConfig, WindowConfig};
use crate::ecs::scheduler::panic_message;
use crate::ecs::{FrameContext, Scene, TaskFailure, TaskTiming, UpdatePhase};
use crate::foundation::time::{FrameLimiter, Timer};
use crate::module::{Module, ModuleSlot};
use crate::platform::{Platform, PlatformError};
use std::any::{type_name, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;

/// Whether the engine currently has a scene to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No scene loaded; frames only pump events and present
    Idle,
    /// A scene is loaded and updated every frame
    Running,
}

/// What happened during one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Index of the frame
    pub frame: u64,
    /// Delta time the frame's updates saw
    pub delta_time: f32,
    /// Every update task that failed or panicked, then every failing
    /// `on_disable` of the deferred removals
    pub failures: Vec<TaskFailure>,
    /// How long each update task took, phase by phase
    pub timings: Vec<TaskTiming>,
    /// Whether the frame reached the screen
    pub presented: bool,
}

impl FrameReport {
    /// Whether every task succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The update task that took longest this frame
    pub fn slowest_task(&self) -> Option<&TaskTiming> {
        self.timings.iter().max_by_key(|timing| timing.elapsed)
    }

    /// Summed task time of one phase
    pub fn phase_time(&self, phase: UpdatePhase) -> Duration {
        self.timings
            .iter()
            .filter(|timing| timing.phase == phase)
            .map(|timing| timing.elapsed)
            .sum()
    }
}

/// Main engine struct
///
/// Constructed once by the process entry point and passed around explicitly.
pub struct Engine<P: Platform> {
    platform: P,
    config: EngineConfig,
    pool: rayon::ThreadPool,
    timer: Timer,
    limiter: FrameLimiter,
    active_scene: Option<Scene>,
    modules: Vec<ModuleSlot>,
}

impl<P: Platform> Engine<P> {
    /// Create a new engine instance
    pub fn new(config: EngineConfig, platform: P) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        config
            .validate()
            .map_err(|reason| EngineError::Config(ConfigError::Invalid(reason)))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("keel-worker-{index}"))
            .build()
            .map_err(|e| EngineError::InitializationFailed(format!("Worker pool: {e}")))?;
        log::info!("Update pool running on {} threads", pool.current_num_threads());

        Ok(Self {
            platform,
            limiter: FrameLimiter::new(config.max_loops_per_second),
            config,
            pool,
            timer: Timer::new(),
            active_scene: None,
            modules: Vec::new(),
        })
    }

    /// Validate `config`, then build the platform from its window settings
    /// and create the engine around it.
    pub fn create<F>(config: EngineConfig, platform: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&WindowConfig) -> Result<P, PlatformError>,
    {
        config
            .validate()
            .map_err(|reason| EngineError::Config(ConfigError::Invalid(reason)))?;
        let platform = platform(&config.window)?;
        Self::new(config, platform)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The platform the engine presents to
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the platform
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Number of frames completed so far
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        if self.active_scene.is_some() {
            EngineState::Running
        } else {
            EngineState::Idle
        }
    }

    /// Make `scene` the active scene and enable its systems in registration order.
    ///
    /// A previously active scene is unloaded first (its systems disabled) and
    /// handed back.
    pub fn load_scene(&mut self, mut scene: Scene) -> Option<Scene> {
        let previous = self.unload_scene();
        log::info!("Loading scene '{}'", scene.name());
        scene.sync_index();
        scene.enable_systems();
        self.active_scene = Some(scene);
        previous
    }

    /// Disable the active scene's systems and hand the scene back
    pub fn unload_scene(&mut self) -> Option<Scene> {
        let mut scene = self.active_scene.take()?;
        log::info!("Unloading scene '{}'", scene.name());
        scene.disable_systems();
        Some(scene)
    }

    /// The active scene
    pub fn active_scene(&self) -> Option<&Scene> {
        self.active_scene.as_ref()
    }

    /// Mutable access to the active scene
    pub fn active_scene_mut(&mut self) -> Option<&mut Scene> {
        self.active_scene.as_mut()
    }

    /// Add a default-constructed module. Returns `false` if one of that type exists.
    pub fn add_module<T: Module + Default>(&mut self) -> bool {
        self.insert_module(T::default())
    }

    /// Add an already constructed module and initialise it.
    /// Returns `false` if one of that type exists.
    pub fn insert_module<T: Module>(&mut self, mut module: T) -> bool {
        if self.has_module::<T>() {
            log::debug!("Module {} already added", type_name::<T>());
            return false;
        }
        log::debug!("Initializing module {}", type_name::<T>());
        module.init();
        self.modules.push(ModuleSlot {
            key: TypeId::of::<T>(),
            name: type_name::<T>(),
            module: Box::new(module),
        });
        true
    }

    /// Destroy and remove a module. Returns `false` if there was none.
    pub fn remove_module<T: Module>(&mut self) -> bool {
        let key = TypeId::of::<T>();
        let Some(position) = self.modules.iter().position(|slot| slot.key == key) else {
            return false;
        };
        let mut slot = self.modules.remove(position);
        log::debug!("Destroying module {}", slot.name);
        slot.module.destroy();
        true
    }

    /// Whether a module of type `T` was added
    pub fn has_module<T: Module>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.modules.iter().any(|slot| slot.key == key)
    }

    /// Look up a module by type
    pub fn get_module<T: Module>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        self.modules
            .iter()
            .find(|slot| slot.key == key)
            .and_then(|slot| slot.module.as_any().downcast_ref::<T>())
    }

    /// Look up a module by type for mutation
    pub fn get_module_mut<T: Module>(&mut self) -> Option<&mut T> {
        let key = TypeId::of::<T>();
        self.modules
            .iter_mut()
            .find(|slot| slot.key == key)
            .and_then(|slot| slot.module.as_any_mut().downcast_mut::<T>())
    }

    /// Run the main loop until the platform stops existing
    pub fn run(&mut self) {
        log::info!("Starting main loop...");
        while self.platform.exists() {
            if let Err(error) = self.tick() {
                log::error!("{error}");
            }
        }
        self.platform.wait_idle();
        log::info!(
            "Main loop finished after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
    }

    /// Run a single frame.
    ///
    /// Failures of individual update tasks are part of the report. An error is
    /// returned only when the frame itself could not complete; the engine
    /// stays usable and the next call starts a new frame.
    pub fn tick(&mut self) -> Result<FrameReport, FrameError> {
        let frame = self.timer.frame_count();
        match panic::catch_unwind(AssertUnwindSafe(|| self.frame())) {
            Ok(report) => Ok(report),
            Err(payload) => {
                self.timer.tick();
                Err(FrameError::Panicked {
                    frame,
                    message: panic_message(payload.as_ref()),
                })
            }
        }
    }

    fn frame(&mut self) -> FrameReport {
        let frame = FrameContext {
            frame: self.timer.frame_count(),
            delta_time: self.timer.delta_time(),
            total_time: self.timer.total_time(),
        };

        // Components attached between frames reach the index before anything queries it.
        if let Some(scene) = self.active_scene.as_mut() {
            scene.sync_index();
        }

        let events = self.platform.pump_events();
        for slot in &mut self.modules {
            slot.module.update(&frame, &events);
        }

        let acquired = match self.platform.acquire_frame() {
            Ok(()) => true,
            Err(error) => {
                log::warn!("Frame {}: {error}, skipping presentation", frame.frame);
                false
            }
        };

        let mut failures = Vec::new();
        let mut timings = Vec::new();
        if let Some(scene) = self.active_scene.as_mut() {
            self.pool.install(|| {
                for phase in UpdatePhase::ALL {
                    let outcome = scene.run_phase(phase, &frame, &events);
                    failures.extend(outcome.failures);
                    timings.extend(outcome.timings);
                }
            });
        }
        for failure in &failures {
            log::error!("Frame {}: {failure}", frame.frame);
        }

        let presented = acquired
            && match self.platform.present() {
                Ok(()) => true,
                Err(error) => {
                    log::error!("Frame {}: {error}", frame.frame);
                    false
                }
            };

        if let Some(scene) = self.active_scene.as_mut() {
            let (removed, cleanup_failures) = self.pool.install(|| scene.detach_marked());
            if removed > 0 {
                log::trace!("Frame {}: detached {removed} components", frame.frame);
            }
            for failure in &cleanup_failures {
                log::error!("Frame {}: {failure}", frame.frame);
            }
            failures.extend(cleanup_failures);
        }

        self.limiter.wait();
        self.timer.tick();

        let report = FrameReport {
            frame: frame.frame,
            delta_time: frame.delta_time,
            failures,
            timings,
            presented,
        };
        if let Some(slowest) = report.slowest_task() {
            log::trace!(
                "Frame {}: slowest task {} in {} ({:?})",
                frame.frame,
                slowest.owner,
                slowest.phase.name(),
                slowest.elapsed
            );
        }
        report
    }
}

impl<P: Platform> Drop for Engine<P> {
    fn drop(&mut self) {
        self.unload_scene();
        for mut slot in self.modules.drain(..).rev() {
            log::debug!("Destroying module {}", slot.name);
            slot.module.destroy();
        }
        log::info!("Engine shutdown complete");
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization failed
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Platform error
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// A frame that could not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Code outside the isolated update tasks panicked
    #[error("Frame {frame} panicked: {message}")]
    Panicked {
        /// Index of the frame
        frame: u64,
        /// Panic payload
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{System, SystemContext, UpdateError};
    use crate::platform::{HeadlessPlatform, PlatformEvent};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn engine(platform: HeadlessPlatform) -> Engine<HeadlessPlatform> {
        let config = EngineConfig::default()
            .with_worker_threads(2)
            .with_max_loops_per_second(0);
        Engine::new(config, platform).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        log: Log,
        panic_on_update: bool,
    }

    impl Module for Recorder {
        fn init(&mut self) {
            self.log.lock().unwrap().push("init".into());
        }

        fn update(&mut self, frame: &FrameContext, events: &[PlatformEvent]) {
            assert!(!self.panic_on_update, "module exploded");
            self.log
                .lock()
                .unwrap()
                .push(format!("update {} ({} events)", frame.frame, events.len()));
        }

        fn destroy(&mut self) {
            self.log.lock().unwrap().push("destroy".into());
        }
    }

    #[derive(Default)]
    struct Noop;
    impl System for Noop {
        fn update(&mut self, _ctx: &SystemContext<'_>) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig::default().with_log_level("");
        let result = Engine::new(config, HeadlessPlatform::default());
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_create_builds_platform_from_window() {
        let config = EngineConfig::default().with_max_loops_per_second(0);
        let engine = Engine::create(config, HeadlessPlatform::from_config).unwrap();
        assert_eq!(engine.platform().window_size(), (1280, 720));
    }

    #[test]
    fn test_create_reports_platform_failure() {
        let result = Engine::create(EngineConfig::default(), |_: &WindowConfig| {
            Err::<HeadlessPlatform, _>(PlatformError::CreationFailed("no display".into()))
        });
        assert!(matches!(
            result,
            Err(EngineError::Platform(PlatformError::CreationFailed(reason))) if reason == "no display"
        ));
    }

    #[test]
    fn test_create_validates_before_building_platform() {
        let config = EngineConfig::default().with_log_level("");
        let result = Engine::create(config, |_: &WindowConfig| -> Result<HeadlessPlatform, PlatformError> {
            panic!("platform built from an invalid config")
        });
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_state_follows_active_scene() {
        let mut engine = engine(HeadlessPlatform::default());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.load_scene(Scene::new("first")).is_none());
        assert_eq!(engine.state(), EngineState::Running);

        let previous = engine.load_scene(Scene::new("second")).unwrap();
        assert_eq!(previous.name(), "first");
        assert_eq!(engine.active_scene().map(Scene::name), Some("second"));

        assert_eq!(engine.unload_scene().unwrap().name(), "second");
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.unload_scene().is_none());
    }

    #[test]
    fn test_idle_frames_still_present() {
        let mut engine = engine(HeadlessPlatform::default());
        let report = engine.tick().unwrap();
        assert_eq!(report.frame, 0);
        assert!(report.presented && report.is_clean());
        assert_eq!(engine.tick().unwrap().frame, 1);
        assert_eq!(engine.platform().frames_presented(), 2);
    }

    #[test]
    fn test_acquire_failure_skips_present() {
        let mut platform = HeadlessPlatform::default();
        platform.fail_next_acquires(1);
        let mut engine = engine(platform);
        engine.load_scene(Scene::new("scene"));
        engine.active_scene_mut().unwrap().add_system::<Noop>();

        assert!(!engine.tick().unwrap().presented);
        assert!(engine.tick().unwrap().presented);
        assert_eq!(engine.platform().frames_presented(), 1);
    }

    #[test]
    fn test_module_lifecycle() {
        let log = Log::default();
        {
            let mut engine = engine(HeadlessPlatform::default());
            assert!(engine.insert_module(Recorder {
                log: log.clone(),
                panic_on_update: false,
            }));
            assert!(!engine.add_module::<Recorder>());
            assert!(engine.has_module::<Recorder>());

            engine.platform_mut().push_event(PlatformEvent::Resized { width: 1, height: 1 });
            engine.tick().unwrap();
            engine.tick().unwrap();
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec!["init", "update 0 (1 events)", "update 1 (0 events)", "destroy"]
        );
    }

    #[test]
    fn test_remove_module_destroys_it() {
        let log = Log::default();
        let mut engine = engine(HeadlessPlatform::default());
        engine.insert_module(Recorder {
            log: log.clone(),
            panic_on_update: false,
        });
        assert!(engine.remove_module::<Recorder>());
        assert!(!engine.remove_module::<Recorder>());
        assert!(engine.get_module::<Recorder>().is_none());
        assert_eq!(*log.lock().unwrap(), vec!["init", "destroy"]);
    }

    #[test]
    fn test_panicking_frame_is_contained() {
        let mut engine = engine(HeadlessPlatform::default());
        engine.insert_module(Recorder {
            log: Log::default(),
            panic_on_update: true,
        });

        let error = engine.tick().unwrap_err();
        assert_eq!(
            error,
            FrameError::Panicked {
                frame: 0,
                message: "module exploded".into()
            }
        );

        engine.get_module_mut::<Recorder>().unwrap().panic_on_update = false;
        assert_eq!(engine.tick().unwrap().frame, 1);
    }

    #[test]
    fn test_run_stops_with_platform() {
        let mut engine = engine(HeadlessPlatform::default().with_frame_budget(5));
        engine.load_scene(Scene::new("scene"));
        engine.run();
        assert_eq!(engine.frame_count(), 5);
        assert_eq!(engine.platform().idle_waits(), 1);
    }

    #[test]
    fn test_close_request_ends_run() {
        let mut platform = HeadlessPlatform::default().with_frame_budget(100);
        platform.push_event(PlatformEvent::CloseRequested);
        let mut engine = engine(platform);
        engine.run();
        assert_eq!(engine.frame_count(), 1);
    }
}
