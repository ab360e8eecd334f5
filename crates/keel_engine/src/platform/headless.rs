//! Headless platform backend
//!
//! Drives the frame loop without a window: it exists for a fixed number of
//! frames (or until closed), replays queued events and can be told to fail
//! frame acquisition or presentation.

use super::{Platform, PlatformError, PlatformEvent};
use crate::config::WindowConfig;
use std::collections::VecDeque;

/// In-process platform with no OS window behind it
#[derive(Debug)]
pub struct HeadlessPlatform {
    width: u32,
    height: u32,
    frame_budget: Option<u64>,
    frames_pumped: u64,
    frames_presented: u64,
    closed: bool,
    pending: VecDeque<PlatformEvent>,
    fail_acquire: u32,
    fail_present: u32,
    idle_waits: u32,
}

impl HeadlessPlatform {
    /// Create a headless surface of the given size that lives until closed
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_budget: None,
            frames_pumped: 0,
            frames_presented: 0,
            closed: false,
            pending: VecDeque::new(),
            fail_acquire: 0,
            fail_present: 0,
            idle_waits: 0,
        }
    }

    /// Create a headless surface matching a window configuration
    pub fn from_config(config: &WindowConfig) -> Result<Self, PlatformError> {
        if config.width == 0 || config.height == 0 {
            return Err(PlatformError::CreationFailed(format!(
                "invalid surface size {}x{}",
                config.width, config.height
            )));
        }
        log::info!(
            "Created headless surface '{}' ({}x{})",
            config.title,
            config.width,
            config.height
        );
        Ok(Self::new(config.width, config.height))
    }

    /// Stop existing after `frames` event pumps
    pub fn with_frame_budget(mut self, frames: u64) -> Self {
        self.frame_budget = Some(frames);
        self
    }

    /// Queue an event for the next pump
    pub fn push_event(&mut self, event: PlatformEvent) {
        self.pending.push_back(event);
    }

    /// Make the next `count` frame acquisitions fail
    pub fn fail_next_acquires(&mut self, count: u32) {
        self.fail_acquire = count;
    }

    /// Make the next `count` presentations fail
    pub fn fail_next_presents(&mut self, count: u32) {
        self.fail_present = count;
    }

    /// Close the surface; `exists` turns false
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of event pumps so far
    pub fn frames_pumped(&self) -> u64 {
        self.frames_pumped
    }

    /// Number of successful presentations
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Number of times the engine waited for the device to go idle
    pub fn idle_waits(&self) -> u32 {
        self.idle_waits
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Platform for HeadlessPlatform {
    fn exists(&self) -> bool {
        !self.closed
            && self
                .frame_budget
                .map_or(true, |budget| self.frames_pumped < budget)
    }

    fn pump_events(&mut self) -> Vec<PlatformEvent> {
        self.frames_pumped += 1;
        let events: Vec<_> = self.pending.drain(..).collect();
        for event in &events {
            match *event {
                PlatformEvent::Resized { width, height } => {
                    self.width = width;
                    self.height = height;
                }
                PlatformEvent::CloseRequested => self.closed = true,
            }
        }
        events
    }

    fn acquire_frame(&mut self) -> Result<(), PlatformError> {
        if self.closed {
            return Err(PlatformError::SurfaceLost);
        }
        if self.fail_acquire > 0 {
            self.fail_acquire -= 1;
            return Err(PlatformError::AcquireFailed("swapchain out of date".to_string()));
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), PlatformError> {
        if self.fail_present > 0 {
            self.fail_present -= 1;
            return Err(PlatformError::PresentFailed("queue submission rejected".to_string()));
        }
        self.frames_presented += 1;
        Ok(())
    }

    fn wait_idle(&mut self) {
        self.idle_waits += 1;
    }

    fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
