//! # Platform Module
//!
//! The window/surface boundary the frame loop talks to. The engine core only
//! needs a liveness query, an event pump and a frame slot it can acquire and
//! present; everything behind those calls (SDL, Vulkan swapchains, ...) is a
//! backend concern.
//!
//! ## Contract
//!
//! - All calls are synchronous and may block without a timeout
//! - `acquire_frame`/`present` failures are non-fatal: the engine logs them
//!   and skips presentation for that frame
//! - Failing to create a platform is fatal and surfaces from the backend
//!   constructor, before an [`Engine`](crate::Engine) exists

pub mod headless;

pub use headless::HeadlessPlatform;

use thiserror::Error;

/// Events produced by [`Platform::pump_events`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The window surface changed size
    Resized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// The user asked to close the window
    CloseRequested,
}

/// Window/surface backend driven by the frame loop
pub trait Platform {
    /// Whether the window/surface still exists; the loop stops once it doesn't
    fn exists(&self) -> bool;

    /// Process pending OS events and return the ones the engine cares about
    fn pump_events(&mut self) -> Vec<PlatformEvent>;

    /// Acquire the next frame slot of the presentation surface
    fn acquire_frame(&mut self) -> Result<(), PlatformError>;

    /// Present the acquired frame
    fn present(&mut self) -> Result<(), PlatformError>;

    /// Block until in-flight device work has completed
    fn wait_idle(&mut self) {}

    /// Current surface size in pixels
    fn window_size(&self) -> (u32, u32);
}

/// Platform-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Window or device could not be created
    #[error("Platform creation failed: {0}")]
    CreationFailed(String),

    /// No frame slot could be acquired
    #[error("Frame acquisition failed: {0}")]
    AcquireFailed(String),

    /// The acquired frame could not be presented
    #[error("Frame presentation failed: {0}")]
    PresentFailed(String),

    /// The surface is gone
    #[error("Surface lost")]
    SurfaceLost,
}
