//! Simulation engine - runs update passes over the ping-pong field and
//! presents the current generation.

use super::context::{DeviceContext, FIELD_FORMAT};
use super::factory::{QUAD_VERTEX_COUNT, ResourceFactory};
use super::field::FieldStore;
use super::program::{Program, ProgramDescription};
use super::readback::read_texture;
use super::surface::PresentSurface;
use super::{EngineError, RenderTarget};
use crate::compute::pingpong::FieldSlot;
use crate::compute::pixels::PixelBuffer;
use crate::compute::uniforms::{ParameterSet, UniformValue};
use crate::driver::Tick;
use crate::schema::SimulationConfig;

/// A program with one bind group per source field.
struct BoundProgram {
    program: Program,
    sources: [wgpu::BindGroup; 2],
}

impl BoundProgram {
    fn new(factory: &ResourceFactory, program: Program, field: &FieldStore) -> Self {
        let sources = [
            factory.create_bind_group(&program, field.texture(FieldSlot::A)),
            factory.create_bind_group(&program, field.texture(FieldSlot::B)),
        ];
        Self { program, sources }
    }

    fn reading(&self, slot: FieldSlot) -> &wgpu::BindGroup {
        &self.sources[slot.index()]
    }
}

/// GPU reaction-diffusion engine.
///
/// Owns every resource it draws with. Nothing is shared between instances.
pub struct Simulation {
    ctx: DeviceContext,
    factory: ResourceFactory,
    quad: wgpu::Buffer,
    field: FieldStore,
    update: BoundProgram,
    present: BoundProgram,
    surface: PresentSurface,
    parameters: ParameterSet,
    present_parameters: ParameterSet,
    resolution_uniform: Option<String>,
    iterations_per_frame: u64,
}

impl Simulation {
    /// Build programs, field buffers and the present surface.
    ///
    /// The field starts zeroed with A current; call [`Simulation::seed`]
    /// before stepping.
    pub fn new(
        ctx: DeviceContext,
        config: &SimulationConfig,
        update: &ProgramDescription,
        present: &ProgramDescription,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let max = ctx.device.limits().max_texture_dimension_2d;
        if config.width > max || config.height > max {
            return Err(EngineError::TextureLimit {
                width: config.width,
                height: config.height,
                max,
            });
        }

        let factory = ResourceFactory::new(&ctx);
        let surface_format: wgpu::TextureFormat = config.surface_format.into();

        let update_program = factory.create_program(update, FIELD_FORMAT)?;
        let present_program = factory.create_program(present, surface_format)?;

        let quad = factory.create_quad();
        let field = FieldStore::new(&factory, config.width, config.height, None)?;
        let surface = PresentSurface::new(&factory, config.width, config.height, surface_format);
        surface
            .framebuffer()
            .check_complete(RenderTarget::Surface, surface_format)?;

        let update = BoundProgram::new(&factory, update_program, &field);
        let present = BoundProgram::new(&factory, present_program, &field);

        let mut sim = Self {
            ctx,
            factory,
            quad,
            field,
            update,
            present,
            surface,
            parameters: ParameterSet::new(),
            present_parameters: ParameterSet::new(),
            resolution_uniform: config.resolution_uniform.clone(),
            iterations_per_frame: config.iterations_per_frame,
        };
        sim.apply_resolution();
        sim.set_parameters(&config.parameters);

        log::info!(
            "Simulation ready: {}x{} field, update `{}`, present `{}` ({:?})",
            config.width,
            config.height,
            sim.update.program.label(),
            sim.present.program.label(),
            surface_format
        );
        Ok(sim)
    }

    pub fn width(&self) -> u32 {
        self.field.width()
    }

    pub fn height(&self) -> u32 {
        self.field.height()
    }

    /// Buffer holding the newest generation.
    pub fn current(&self) -> FieldSlot {
        self.field.current()
    }

    /// Update iterations completed since construction.
    pub fn generation(&self) -> u64 {
        self.field.generation()
    }

    pub fn iterations_per_frame(&self) -> u64 {
        self.iterations_per_frame
    }

    pub fn set_iterations_per_frame(&mut self, iterations: u64) {
        self.iterations_per_frame = iterations;
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn update_program(&self) -> &Program {
        &self.update.program
    }

    pub fn present_program(&self) -> &Program {
        &self.present.program
    }

    /// Run `iterations` update passes.
    ///
    /// All passes are encoded into one command buffer and submitted together.
    /// If any target is incomplete nothing is submitted and the current
    /// buffer does not change.
    pub fn step(&mut self, iterations: u64) -> Result<(), EngineError> {
        if iterations == 0 {
            return Ok(());
        }

        let mut schedule = self.field.pingpong();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Update Encoder"),
            });

        for _ in 0..iterations {
            let pass = schedule.pass();
            debug_assert_ne!(pass.source, pass.target);
            self.field.verify(pass.target)?;

            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Update Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: self.field.framebuffer(pass.target).view(),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                self.draw_quad(&mut rpass, &self.update, pass.source);
            }

            schedule.advance();
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.field.commit(schedule);
        log::trace!(
            "Stepped {iterations} iteration(s); field {} current at generation {}",
            schedule.current(),
            schedule.generation()
        );
        Ok(())
    }

    /// Present the current field to the owned surface.
    pub fn render(&self) -> Result<(), EngineError> {
        let framebuffer = self.surface.framebuffer();
        framebuffer.check_complete(RenderTarget::Surface, self.present.program.target_format())?;
        self.present_into(framebuffer.view());
        Ok(())
    }

    /// Present the current field into a caller-owned view, such as a window
    /// surface texture. `format` must match the present program's target.
    pub fn render_to(
        &self,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
    ) -> Result<(), EngineError> {
        let expected = self.present.program.target_format();
        if format != expected {
            return Err(EngineError::SurfaceFormatMismatch {
                expected,
                actual: format,
            });
        }
        self.present_into(view);
        Ok(())
    }

    fn present_into(&self, view: &wgpu::TextureView) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.draw_quad(&mut rpass, &self.present, self.field.current());
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_quad(&self, rpass: &mut wgpu::RenderPass<'_>, bound: &BoundProgram, source: FieldSlot) {
        rpass.set_pipeline(&bound.program.pipeline);
        rpass.set_bind_group(0, bound.reading(source), &[]);
        for slot in 0..bound.program.vertex_buffer_count {
            rpass.set_vertex_buffer(slot, self.quad.slice(..));
        }
        rpass.draw(0..QUAD_VERTEX_COUNT, 0..1);
    }

    /// Apply parameters to the update program. Unknown names are ignored.
    ///
    /// Accepted values are remembered and re-applied if the update program
    /// is swapped. Returns how many entries the current program accepted.
    pub fn set_parameters(&mut self, params: &ParameterSet) -> usize {
        apply_remembered(
            &self.ctx.queue,
            &mut self.update.program,
            &mut self.parameters,
            params,
        )
    }

    /// Apply parameters to the present program, remembering the accepted
    /// ones for [`Simulation::set_present_program`].
    pub fn set_present_parameters(&mut self, params: &ParameterSet) -> usize {
        apply_remembered(
            &self.ctx.queue,
            &mut self.present.program,
            &mut self.present_parameters,
            params,
        )
    }

    /// Update-program parameters re-applied on the next swap.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Present-program parameters re-applied on the next swap.
    pub fn present_parameters(&self) -> &ParameterSet {
        &self.present_parameters
    }

    fn apply_resolution(&mut self) {
        if let Some(name) = &self.resolution_uniform {
            let value = UniformValue::Vec2([self.field.width() as f32, self.field.height() as f32]);
            self.update
                .program
                .set_parameter(&self.ctx.queue, name, value);
        }
    }

    /// Replace the update program. On failure the old program stays.
    pub fn set_update_program(&mut self, desc: &ProgramDescription) -> Result<(), EngineError> {
        let program = self.factory.create_program(desc, FIELD_FORMAT)?;
        self.update = BoundProgram::new(&self.factory, program, &self.field);
        self.apply_resolution();
        self.update
            .program
            .set_parameters(&self.ctx.queue, &self.parameters);
        log::info!("Update program is now `{}`", desc.label);
        Ok(())
    }

    /// Replace the present program. On failure the old program stays.
    pub fn set_present_program(&mut self, desc: &ProgramDescription) -> Result<(), EngineError> {
        let program = self.factory.create_program(desc, self.surface.format())?;
        self.present = BoundProgram::new(&self.factory, program, &self.field);
        self.present
            .program
            .set_parameters(&self.ctx.queue, &self.present_parameters);
        log::info!("Present program is now `{}`", desc.label);
        Ok(())
    }

    /// Overwrite the current buffer, so the next step reads `pixels`.
    pub fn seed(&mut self, pixels: &PixelBuffer) -> Result<(), EngineError> {
        let slot = self.field.current();
        self.factory.write_field(self.field.texture(slot), pixels)?;
        log::debug!("Seeded field {slot}");
        Ok(())
    }

    /// Overwrite both buffers.
    pub fn seed_all(&mut self, pixels: &PixelBuffer) -> Result<(), EngineError> {
        for slot in [FieldSlot::A, FieldSlot::B] {
            self.factory.write_field(self.field.texture(slot), pixels)?;
        }
        log::debug!("Seeded both fields");
        Ok(())
    }

    /// Copy a region of the current field back to the host. Blocks until the
    /// device is idle.
    pub fn readback_field(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, EngineError> {
        let texture = self.field.texture(self.field.current()).texture();
        let bytes = read_texture(&self.ctx.device, &self.ctx.queue, texture, x, y, width, height)?;
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(PixelBuffer::from_raw(width as usize, height as usize, data)?)
    }

    /// Copy a region of the present surface back to the host, as raw texels
    /// of the surface format. Blocks until the device is idle.
    pub fn readback_surface(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, EngineError> {
        read_texture(
            &self.ctx.device,
            &self.ctx.queue,
            self.surface.texture(),
            x,
            y,
            width,
            height,
        )
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface.format()
    }
}

fn apply_remembered(
    queue: &wgpu::Queue,
    program: &mut Program,
    remembered: &mut ParameterSet,
    params: &ParameterSet,
) -> usize {
    let mut applied = 0;
    for (name, value) in params {
        if program.set_parameter(queue, name, *value) {
            remembered.insert(name.clone(), *value);
            applied += 1;
        }
    }
    applied
}

impl Tick for Simulation {
    type Error = EngineError;

    /// One display frame: `iterations_per_frame` updates, then present.
    fn tick(&mut self) -> Result<(), EngineError> {
        self.step(self.iterations_per_frame)?;
        self.render()
    }
}
