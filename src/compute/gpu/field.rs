//! Field store: the two field textures, their framebuffers, and which one
//! is current.

use super::EngineError;
use super::RenderTarget;
use super::context::FIELD_FORMAT;
use super::factory::{FieldTexture, Framebuffer, ResourceFactory};
use crate::compute::pingpong::{FieldSlot, PingPong};
use crate::compute::pixels::PixelBuffer;

/// Two equally sized field textures (A and B), each bound to exactly one
/// framebuffer.
pub struct FieldStore {
    textures: [FieldTexture; 2],
    framebuffers: [Framebuffer; 2],
    pingpong: PingPong,
}

impl FieldStore {
    /// Allocate both buffers. `initial` is uploaded into A, which starts
    /// current; B stays zeroed until first written.
    pub fn new(
        factory: &ResourceFactory,
        width: u32,
        height: u32,
        initial: Option<&PixelBuffer>,
    ) -> Result<Self, EngineError> {
        let a = factory.create_field_texture("Field A", width, height, initial)?;
        let b = factory.create_field_texture("Field B", width, height, None)?;
        let framebuffers = [factory.create_framebuffer(&a), factory.create_framebuffer(&b)];

        let store = Self {
            textures: [a, b],
            framebuffers,
            pingpong: PingPong::new(),
        };
        store.verify(FieldSlot::A)?;
        store.verify(FieldSlot::B)?;
        Ok(store)
    }

    pub fn width(&self) -> u32 {
        self.textures[0].width()
    }

    pub fn height(&self) -> u32 {
        self.textures[0].height()
    }

    pub fn current(&self) -> FieldSlot {
        self.pingpong.current()
    }

    pub fn generation(&self) -> u64 {
        self.pingpong.generation()
    }

    /// Snapshot of the ping-pong state, for scheduling a batch of passes.
    pub fn pingpong(&self) -> PingPong {
        self.pingpong
    }

    pub fn texture(&self, slot: FieldSlot) -> &FieldTexture {
        &self.textures[slot.index()]
    }

    pub fn framebuffer(&self, slot: FieldSlot) -> &Framebuffer {
        &self.framebuffers[slot.index()]
    }

    /// Completeness check for drawing into `slot`.
    pub fn verify(&self, slot: FieldSlot) -> Result<(), EngineError> {
        self.framebuffer(slot)
            .check_complete(RenderTarget::Field(slot), FIELD_FORMAT)
    }

    /// Adopt a ping-pong state once the passes it describes are submitted.
    pub fn commit(&mut self, state: PingPong) {
        self.pingpong = state;
    }
}
