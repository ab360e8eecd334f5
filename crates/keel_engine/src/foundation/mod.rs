//! Foundation module - Core utilities and types
//!
//! - Math aliases over nalgebra
//! - Frame timing
//! - Logging initialisation

pub mod logging;
pub mod math;
pub mod time;
