//! GPU backend for the double-buffered stencil engine.
//!
//! Runs per-pixel update programs over an `Rgba32Float` field using WebGPU
//! (wgpu) render passes, ping-ponging between two textures.

mod context;
mod engine;
mod factory;
mod field;
pub mod program;
mod readback;
pub mod reflect;
mod surface;

use std::fmt;

pub use context::{DeviceContext, FIELD_FORMAT, field_usages};
pub use engine::Simulation;
pub use factory::{FieldTexture, Framebuffer, ResourceFactory};
pub use field::FieldStore;
pub use program::{CompiledProgram, Program, ProgramDescription};
pub use readback::padded_bytes_per_row;
pub use reflect::{CompileError, ShaderStage};
pub use surface::PresentSurface;

use crate::compute::{FieldSlot, PixelError};
use crate::schema::ConfigError;

/// A colour target a pass can draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Field(FieldSlot),
    Surface,
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTarget::Field(slot) => write!(f, "field {slot}"),
            RenderTarget::Surface => write!(f, "present surface"),
        }
    }
}

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackAborted,

    #[error("Adapter does not support {format:?} with usages {missing:?}")]
    DeviceCapability {
        format: wgpu::TextureFormat,
        missing: wgpu::TextureUsages,
    },

    #[error("Shader program failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Framebuffer for {target} is incomplete: {reason}")]
    FramebufferIncomplete { target: RenderTarget, reason: String },

    #[error("Surface format {actual:?} does not match program target {expected:?}")]
    SurfaceFormatMismatch {
        expected: wgpu::TextureFormat,
        actual: wgpu::TextureFormat,
    },

    #[error("Field size {width}x{height} exceeds the device limit of {max} texels per side")]
    TextureLimit { width: u32, height: u32, max: u32 },

    #[error(transparent)]
    Pixel(#[from] PixelError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Open a headless device for tests, or `None` when the machine has no
/// usable adapter.
#[cfg(test)]
pub(crate) fn test_context() -> Option<DeviceContext> {
    match pollster::block_on(DeviceContext::headless()) {
        Ok(ctx) => Some(ctx),
        Err(EngineError::NoAdapter) => {
            eprintln!("Skipping GPU test: no adapter available");
            None
        }
        Err(e @ EngineError::DeviceCapability { .. }) => {
            eprintln!("Skipping GPU test: {e}");
            None
        }
        Err(e) => panic!("Failed to open GPU device: {e:?}"),
    }
}
