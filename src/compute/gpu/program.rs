//! Program descriptions and linked programs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::reflect::{Interface, StageModule, UniformLayout};
use crate::compute::uniforms::{
    ParameterSet, UniformBlock, UniformData, UniformShape, UniformSlot, UniformSpec, UniformValue,
};

// Embed shader sources at compile time
pub const QUAD_VERTEX_SHADER: &str = include_str!("shaders/quad.wgsl");
pub const GRAY_SCOTT_SHADER: &str = include_str!("shaders/gray_scott.wgsl");
pub const PRESENT_SHADER: &str = include_str!("shaders/present.wgsl");
pub const IDENTITY_SHADER: &str = include_str!("shaders/identity.wgsl");

/// Name of the quad's position attribute in the bundled vertex stage.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Declarative description of a program: sources plus the attribute and
/// uniform names the caller intends to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDescription {
    #[serde(default)]
    pub label: String,
    pub vertex_source: String,
    pub fragment_source: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub uniforms: Vec<UniformSpec>,
}

impl ProgramDescription {
    pub fn new(
        label: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn with_uniform(mut self, name: impl Into<String>, shape: UniformShape) -> Self {
        self.uniforms.push(UniformSpec::new(name, shape));
        self
    }

    /// Full-surface quad vertex stage with a custom fragment stage.
    pub fn fullscreen(label: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self::new(label, QUAD_VERTEX_SHADER, fragment_source).with_attribute(POSITION_ATTRIBUTE)
    }

    /// Gray-Scott update program.
    pub fn gray_scott() -> Self {
        Self::fullscreen("gray-scott", GRAY_SCOTT_SHADER)
            .with_uniform("res", UniformShape::Vec2Float)
            .with_uniform("Da", UniformShape::Float)
            .with_uniform("Db", UniformShape::Float)
            .with_uniform("Feed", UniformShape::Float)
            .with_uniform("Kill", UniformShape::Float)
            .with_uniform("dt", UniformShape::Float)
    }

    /// Greyscale presentation of A - B.
    pub fn present() -> Self {
        Self::fullscreen("present", PRESENT_SHADER)
    }

    /// Update program that copies the field unchanged.
    pub fn identity() -> Self {
        Self::fullscreen("identity", IDENTITY_SHADER)
    }

    /// Presentation program that writes the field's raw channels.
    pub fn present_raw() -> Self {
        Self::fullscreen("present-raw", IDENTITY_SHADER)
    }
}

/// Both stages compiled and linked, not yet bound to names or a target.
///
/// Dropping it releases the shader modules; nothing else refers to them.
#[derive(Debug)]
pub struct CompiledProgram {
    pub(crate) vertex: StageModule,
    pub(crate) fragment: StageModule,
    pub(crate) vertex_module: wgpu::ShaderModule,
    pub(crate) fragment_module: wgpu::ShaderModule,
    pub(crate) interface: Interface,
}

impl CompiledProgram {
    pub fn interface(&self) -> &Interface {
        &self.interface
    }
}

/// A linked program with resolved attribute and uniform bindings.
#[derive(Debug)]
pub struct Program {
    pub(crate) label: String,
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) target_format: wgpu::TextureFormat,
    pub(crate) attribute_locations: HashMap<String, Option<u32>>,
    pub(crate) vertex_buffer_count: u32,
    pub(crate) uniforms: UniformBlock,
    pub(crate) uniform_buffer: wgpu::Buffer,
}

impl Program {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Colour format the program's pipeline renders into.
    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Vertex location of a declared attribute; `None` if the name was not
    /// declared or the vertex stage has no such input.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attribute_locations.get(name).copied().flatten()
    }

    pub fn uniform_slot(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.slot(name)
    }

    /// Last value written to a uniform, as held in the host shadow.
    pub fn uniform_value(&self, name: &str) -> Option<UniformData> {
        self.uniforms.get(name)
    }

    /// Apply `params` and upload the block if anything changed.
    ///
    /// Returns how many entries were applied.
    pub fn set_parameters(&mut self, queue: &wgpu::Queue, params: &ParameterSet) -> usize {
        let applied = self.uniforms.apply_all(params);
        if applied > 0 {
            queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.as_bytes());
        }
        applied
    }

    pub fn set_parameter(&mut self, queue: &wgpu::Queue, name: &str, value: UniformValue) -> bool {
        let applied = self.uniforms.apply(name, value);
        if applied {
            queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.as_bytes());
        }
        applied
    }
}

/// Resolve declared uniforms against the reflected block.
///
/// Names the shader does not declare, and declarations whose shape does not
/// match the shader's member type, stay unresolved: setting them later is a
/// no-op.
pub fn resolve_uniforms(layout: Option<&UniformLayout>, specs: &[UniformSpec]) -> UniformBlock {
    let mut block = UniformBlock::new(layout.map_or(0, |l| l.size as usize));
    for spec in specs {
        let Some(member) = layout.and_then(|l| l.member(&spec.name)) else {
            log::debug!("Uniform `{}` is not used by the program", spec.name);
            continue;
        };
        match member.shape {
            Some(shape) if shape == spec.shape => {
                block.bind(
                    spec.name.clone(),
                    UniformSlot {
                        offset: member.offset as usize,
                        shape,
                    },
                );
            }
            actual => log::warn!(
                "Uniform `{}` declared as {:?} but the shader member is {:?}; leaving it unbound",
                spec.name,
                spec.shape,
                actual
            ),
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::gpu::reflect::link;

    fn gray_scott_layout() -> UniformLayout {
        let vs = StageModule::compile_vertex(QUAD_VERTEX_SHADER).unwrap();
        let fs = StageModule::compile_fragment(GRAY_SCOTT_SHADER).unwrap();
        link(&vs, &fs).unwrap().uniforms.unwrap()
    }

    #[test]
    fn test_gray_scott_uniforms_resolve() {
        let desc = ProgramDescription::gray_scott();
        let block = resolve_uniforms(Some(&gray_scott_layout()), &desc.uniforms);

        assert_eq!(block.size(), 32);
        assert_eq!(
            block.slot("Feed"),
            Some(UniformSlot {
                offset: 16,
                shape: UniformShape::Float
            })
        );
        assert_eq!(block.names().count(), desc.uniforms.len());
    }

    #[test]
    fn test_feed_round_trip_exact() {
        let desc = ProgramDescription::gray_scott();
        let mut block = resolve_uniforms(Some(&gray_scott_layout()), &desc.uniforms);

        let params = ParameterSet::from([("Feed".to_string(), UniformValue::Scalar(0.055))]);
        assert_eq!(block.apply_all(&params), 1);
        assert_eq!(block.get("Feed"), Some(UniformData::Float(0.055)));
    }

    #[test]
    fn test_undeclared_uniform_unresolved() {
        let specs = [UniformSpec::new("tex", UniformShape::Int)];
        let mut block = resolve_uniforms(Some(&gray_scott_layout()), &specs);
        assert!(block.slot("tex").is_none());
        assert!(!block.apply("tex", 0.0.into()));
    }

    #[test]
    fn test_shape_mismatch_unresolved() {
        let specs = [
            UniformSpec::new("Feed", UniformShape::Int),
            UniformSpec::new("res", UniformShape::Float),
        ];
        let block = resolve_uniforms(Some(&gray_scott_layout()), &specs);
        assert!(block.slot("Feed").is_none());
        assert!(block.slot("res").is_none());
    }

    #[test]
    fn test_program_without_uniforms_gets_minimal_block() {
        let specs = [UniformSpec::new("Feed", UniformShape::Float)];
        let block = resolve_uniforms(None, &specs);
        assert_eq!(block.size(), 16);
        assert!(block.slot("Feed").is_none());
    }

    #[test]
    fn test_description_json() {
        let json = r#"{
            "label": "custom",
            "vertex_source": "v",
            "fragment_source": "f",
            "attributes": ["position"],
            "uniforms": [{"name": "res", "type": "2f"}, {"name": "tex", "type": "1i"}]
        }"#;
        let desc: ProgramDescription = serde_json::from_str(json).unwrap();
        assert_eq!(desc.attributes, vec!["position".to_string()]);
        assert_eq!(desc.uniforms[0].shape, UniformShape::Vec2Float);
        assert_eq!(desc.uniforms[1].shape, UniformShape::Int);
    }
}
