//! Schema module - Configuration and seeding types for reaction-diffusion runs.

mod config;
mod seed;

pub use config::*;
pub use seed::*;
