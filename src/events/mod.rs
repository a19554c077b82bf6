// src/events/mod.rs

pub mod contact;
pub mod swing;

pub use contact::ContactDetector;
pub use swing::{SwingDetector, SwingEvent, SwingState};
