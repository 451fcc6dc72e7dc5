//! Offscreen presentation surface.

use super::factory::{FieldTexture, Framebuffer, ResourceFactory};

/// Colour target the present program draws into when no window surface is
/// supplied. Readable with `Simulation::readback_surface`.
pub struct PresentSurface {
    texture: FieldTexture,
    framebuffer: Framebuffer,
}

impl PresentSurface {
    pub fn new(
        factory: &ResourceFactory,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = factory.create_surface_texture(width, height, format);
        let framebuffer = factory.create_framebuffer(&texture);
        Self {
            texture,
            framebuffer,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.framebuffer.format()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        self.texture.texture()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }
}
