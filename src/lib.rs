//! Reaction-Diffusion - GPU ping-pong simulation of Gray-Scott and other
//! per-pixel stencil models.
//!
//! The field lives in two float textures on the device. Each update pass
//! reads one and writes the other, then the roles swap. A separate present
//! program maps the current field to a displayable surface.
//!
//! # Architecture
//!
//! - `schema`: Configuration types and seeding
//! - `compute`: Pixel buffers, uniforms, the ping-pong schedule, the CPU
//!   reference stepper and the wgpu engine (`compute::gpu`)
//! - `driver`: Fixed-rate `tick()` loop
//! - `animation`: Recording readback frames to `.rdfa` archives
//!
//! # Example
//!
//! ```rust,no_run
//! use reaction_diffusion::{
//!     compute::gpu::{DeviceContext, ProgramDescription, Simulation},
//!     schema::{Seed, SimulationConfig},
//! };
//!
//! let config = SimulationConfig::default();
//! let ctx = pollster::block_on(DeviceContext::headless()).unwrap();
//! let mut sim = Simulation::new(
//!     ctx,
//!     &config,
//!     &ProgramDescription::gray_scott(),
//!     &ProgramDescription::present(),
//! )
//! .unwrap();
//!
//! let seed = Seed::default()
//!     .generate(config.width as usize, config.height as usize)
//!     .unwrap();
//! sim.seed_all(&seed).unwrap();
//! sim.step(100).unwrap();
//! sim.render().unwrap();
//!
//! let field = sim.readback_field(0, 0, config.width, config.height).unwrap();
//! println!("Mean B after 100 steps: {}", field.channel_stats(1).mean);
//! ```

pub mod animation;
pub mod compute;
pub mod driver;
pub mod schema;

// Re-export commonly used types
pub use compute::gpu::{DeviceContext, EngineError, ProgramDescription, Simulation};
pub use compute::{CpuPropagator, GrayScottParams, PixelBuffer};
pub use driver::{FixedRateDriver, Tick};
pub use schema::{Seed, SimulationConfig};
