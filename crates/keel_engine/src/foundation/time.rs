//! Frame timing utilities

use std::time::{Duration, Instant};

/// Measures the time between engine frames
#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a timer; the first frame is measured from now
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Close the current frame and return its length in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_tick).as_secs_f32();
        self.total_time += self.delta_time;
        self.last_tick = now;
        self.frame_count += 1;
        self.delta_time
    }

    /// Length of the last completed frame in seconds, `0.0` before the first tick
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds accumulated over all completed frames
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of completed frames
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Stopwatch for measuring elapsed time
#[derive(Debug, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    accumulated: Duration,
}

impl Stopwatch {
    /// Create a stopped stopwatch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stopwatch that is already running
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start or resume
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Pause, keeping the time measured so far
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    /// Reset to zero and start again
    pub fn restart(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started = Some(Instant::now());
    }

    /// Total measured time
    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.started.map_or(Duration::ZERO, |started| started.elapsed())
    }

    /// Whether the stopwatch is running
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }
}

/// Caps the loop rate by sleeping away the rest of each frame's time slice
#[derive(Debug)]
pub struct FrameLimiter {
    slice: Option<Duration>,
    stopwatch: Stopwatch,
}

impl FrameLimiter {
    /// Limit to `max_loops_per_second`; `0` disables limiting
    pub fn new(max_loops_per_second: u32) -> Self {
        let slice = (max_loops_per_second > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(max_loops_per_second)));
        Self {
            slice,
            stopwatch: Stopwatch::start_new(),
        }
    }

    /// Time slice per frame, if limiting
    pub fn slice(&self) -> Option<Duration> {
        self.slice
    }

    /// Sleep until the current slice is used up, then begin the next one
    pub fn wait(&mut self) {
        if let Some(slice) = self.slice {
            let spent = self.stopwatch.elapsed();
            if spent < slice {
                std::thread::sleep(slice - spent);
            }
        }
        self.stopwatch.restart();
    }
}
