//! Motion control
//!
//! Single-axis, open-loop, step-counted positioning with backlash pre-roll
//! and a post-move settle window.

pub mod controller;

pub use controller::{MotionController, MotionEvent, MotionState, MoveOutcome};
