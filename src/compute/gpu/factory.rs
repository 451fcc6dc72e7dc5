//! Resource factory: programs, buffers, textures and framebuffers built from
//! declarative descriptions.
//!
//! Every call takes the objects it works on as arguments. Nothing depends
//! on state left bound by an earlier call.

use std::collections::HashMap;

use super::context::{DeviceContext, FIELD_FORMAT, field_usages};
use super::program::{CompiledProgram, Program, ProgramDescription, resolve_uniforms};
use super::reflect::{
    CompileError, FIELD_BINDING, PARAMS_BINDING, SAMPLER_BINDING, StageModule, link,
};
use super::{EngineError, RenderTarget};
use crate::compute::pixels::{PixelBuffer, PixelError};
use crate::compute::uniforms::UniformSpec;

/// Full-surface quad as a 4-vertex triangle strip.
pub const QUAD_VERTICES: [f32; 8] = [-1.0, 1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0];
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Byte stride of one `vec2<f32>` vertex.
const VERTEX_STRIDE: u64 = 8;

/// A 2D field texture and its sampling view.
#[derive(Debug)]
pub struct FieldTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl FieldTexture {
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

/// Render-target view of exactly one texture.
#[derive(Debug)]
pub struct Framebuffer {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    sample_count: u32,
}

impl Framebuffer {
    pub fn from_texture(texture: &wgpu::Texture) -> Self {
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Framebuffer View"),
                ..Default::default()
            }),
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            usage: texture.usage(),
            sample_count: texture.sample_count(),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Check the attachment can receive a draw from a pipeline targeting
    /// `format`.
    pub fn check_complete(
        &self,
        target: RenderTarget,
        format: wgpu::TextureFormat,
    ) -> Result<(), EngineError> {
        let reason = if !self.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            Some("texture lacks RENDER_ATTACHMENT usage".to_string())
        } else if self.width == 0 || self.height == 0 {
            Some(format!("attachment is {}x{}", self.width, self.height))
        } else if self.format != format {
            Some(format!(
                "attachment format {:?} differs from pipeline target {:?}",
                self.format, format
            ))
        } else if self.sample_count != 1 {
            Some(format!("attachment has {} samples", self.sample_count))
        } else {
            None
        };
        match reason {
            None => Ok(()),
            Some(reason) => Err(EngineError::FramebufferIncomplete { target, reason }),
        }
    }
}

/// Creates device objects against one fixed bind-group layout.
pub struct ResourceFactory {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl ResourceFactory {
    pub fn new(ctx: &DeviceContext) -> Self {
        let device = ctx.device.clone();
        let bind_group_layout = create_program_bind_group_layout(&device);
        // Nearest filtering with repeat wrap on both axes.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            device,
            queue: ctx.queue.clone(),
            bind_group_layout,
            sampler,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Compile both stages and link them. Nothing is created on the device
    /// unless both stages validate and link.
    pub fn compile_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<CompiledProgram, CompileError> {
        let vertex = StageModule::compile_vertex(vertex_source)?;
        let fragment = StageModule::compile_fragment(fragment_source)?;
        let interface = link(&vertex, &fragment)?;

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(vertex.source().to_owned().into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Shader"),
            source: wgpu::ShaderSource::Wgsl(fragment.source().to_owned().into()),
        });
        log::debug!(
            "Compiled program ({} -> {})",
            vertex.entry_point(),
            fragment.entry_point()
        );

        Ok(CompiledProgram {
            vertex,
            fragment,
            vertex_module,
            fragment_module,
            interface,
        })
    }

    /// Resolve attribute and uniform names and build the pipeline.
    ///
    /// Names the program does not declare are accepted and left unusable.
    /// Every vertex input must be fed by one of `attributes`.
    pub fn declare_bindings(
        &self,
        compiled: CompiledProgram,
        label: &str,
        attributes: &[String],
        uniforms: &[UniformSpec],
        target_format: wgpu::TextureFormat,
    ) -> Result<Program, CompileError> {
        let interface = &compiled.interface;

        let mut attribute_locations = HashMap::new();
        for name in attributes {
            let location = interface.vertex_input(name).map(|v| v.location);
            if location.is_none() {
                log::debug!("Program `{label}` has no vertex input `{name}`");
            }
            attribute_locations.insert(name.clone(), location);
        }

        let mut vertex_attributes = Vec::with_capacity(interface.vertex_inputs.len());
        for input in &interface.vertex_inputs {
            let fed = input
                .name
                .as_ref()
                .is_some_and(|n| attribute_locations.get(n).copied().flatten().is_some());
            if !fed {
                return Err(CompileError::link(format!(
                    "vertex input {} at @location({}) is not fed by any declared attribute",
                    input.name.as_deref().unwrap_or("<unnamed>"),
                    input.location
                )));
            }
            vertex_attributes.push([wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: input.location,
            }]);
        }
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = vertex_attributes
            .iter()
            .map(|attrs| wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let block = resolve_uniforms(interface.uniforms.as_ref(), uniforms);
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Program Uniforms"),
            size: block.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&uniform_buffer, 0, block.as_bytes());

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program Pipeline Layout"),
                bind_group_layouts: &[&self.bind_group_layout],
                ..Default::default()
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &compiled.vertex_module,
                    entry_point: Some(compiled.vertex.entry_point()),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &compiled.fragment_module,
                    entry_point: Some(compiled.fragment.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!(
            "Declared program `{label}`: {} attribute(s), {} uniform(s) resolved",
            vertex_buffers.len(),
            block.names().count()
        );

        Ok(Program {
            label: label.to_owned(),
            pipeline,
            target_format,
            attribute_locations,
            vertex_buffer_count: vertex_buffers.len() as u32,
            uniforms: block,
            uniform_buffer,
        })
    }

    /// Compile, link and declare in one call.
    pub fn create_program(
        &self,
        desc: &ProgramDescription,
        target_format: wgpu::TextureFormat,
    ) -> Result<Program, CompileError> {
        let compiled = self.compile_program(&desc.vertex_source, &desc.fragment_source)?;
        self.declare_bindings(
            compiled,
            &desc.label,
            &desc.attributes,
            &desc.uniforms,
            target_format,
        )
    }

    /// Upload immutable vertex data.
    pub fn create_vertex_buffer(&self, vertices: &[f32]) -> wgpu::Buffer {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Buffer"),
            size: std::mem::size_of_val(vertices) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&buffer, 0, bytemuck::cast_slice(vertices));
        buffer
    }

    /// The shared full-surface quad.
    pub fn create_quad(&self) -> wgpu::Buffer {
        self.create_vertex_buffer(&QUAD_VERTICES)
    }

    /// Allocate an `Rgba32Float` field texture, optionally uploading
    /// `initial` into it.
    pub fn create_field_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        initial: Option<&PixelBuffer>,
    ) -> Result<FieldTexture, PixelError> {
        let texture = self.allocate_texture(label, width, height, FIELD_FORMAT, field_usages());
        if let Some(pixels) = initial {
            self.write_field(&texture, pixels)?;
        }
        Ok(texture)
    }

    fn allocate_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> FieldTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Created {width}x{height} {format:?} texture `{label}`");
        FieldTexture { texture, view }
    }

    /// Colour target texture for presentation.
    pub(crate) fn create_surface_texture(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> FieldTexture {
        self.allocate_texture(
            "Present Surface",
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )
    }

    /// Overwrite a field texture with `pixels`. Sizes must match exactly.
    pub fn write_field(
        &self,
        texture: &FieldTexture,
        pixels: &PixelBuffer,
    ) -> Result<(), PixelError> {
        let (width, height) = (texture.width(), texture.height());
        if pixels.width() != width as usize || pixels.height() != height as usize {
            return Err(PixelError::SizeMismatch {
                expected_width: width as usize,
                expected_height: height as usize,
                actual_width: pixels.width(),
                actual_height: pixels.height(),
            });
        }
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.queue.write_texture(
            texture.texture.as_image_copy(),
            pixels.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 16),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Bind `texture` as the sole colour target of a new framebuffer.
    /// Callers check completeness before drawing.
    pub fn create_framebuffer(&self, texture: &FieldTexture) -> Framebuffer {
        Framebuffer::from_texture(&texture.texture)
    }

    /// Bind group reading `source` with `program`'s parameter block.
    pub fn create_bind_group(&self, program: &Program, source: &FieldTexture) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Program Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: FIELD_BINDING,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: PARAMS_BINDING,
                    resource: program.uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }
}

fn create_program_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Program Bind Group Layout"),
        entries: &[
            // Source field
            wgpu::BindGroupLayoutEntry {
                binding: FIELD_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            // Nearest sampler
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
            // Parameters
            wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}
