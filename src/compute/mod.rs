//! Compute module - field storage, the update model and the GPU engine.

pub mod gray_scott;
pub mod pingpong;
pub mod pixels;
pub mod propagator;
pub mod uniforms;

pub mod gpu;

pub use gray_scott::*;
pub use pingpong::*;
pub use pixels::*;
pub use propagator::*;
pub use uniforms::*;
