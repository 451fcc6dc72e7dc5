//! Shader compilation and reflection.
//!
//! Each WGSL stage is parsed and validated with naga before any device object
//! exists, so a bad program never reaches the GPU. Reflection extracts the
//! entry point, the stage's user-defined interface locations, and the layout
//! of the parameter uniform block; [`link`] then checks the two stages
//! against each other.

use std::fmt;

use naga::{
    AddressSpace, Binding, Handle, ImageClass, ImageDimension, Scalar, ScalarKind, Type,
    TypeInner, VectorSize,
};

use crate::compute::uniforms::UniformShape;

/// Bind group shared by every program.
pub const BIND_GROUP: u32 = 0;
/// `texture_2d<f32>` holding the source field.
pub const FIELD_BINDING: u32 = 0;
/// Nearest, repeat-wrapped sampler for the source field.
pub const SAMPLER_BINDING: u32 = 1;
/// `var<uniform>` parameter block.
pub const PARAMS_BINDING: u32 = 2;

/// Where a compile error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
            ShaderStage::Link => write!(f, "link"),
        }
    }
}

/// A stage failed to compile, or the two stages failed to link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage failed:\n{log}")]
pub struct CompileError {
    pub stage: ShaderStage,
    pub log: String,
}

impl CompileError {
    pub fn new(stage: ShaderStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: log.into(),
        }
    }

    pub fn link(log: impl Into<String>) -> Self {
        Self::new(ShaderStage::Link, log)
    }
}

/// A user-defined (`@location`) input or output of an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceVar {
    pub name: Option<String>,
    pub location: u32,
    pub is_float: bool,
    /// 1 for scalars, 2 to 4 for vectors, 0 for anything else.
    pub components: u32,
}

/// One member of the parameter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    /// `None` for member types no [`UniformShape`] can address.
    pub shape: Option<UniformShape>,
}

/// Reflected layout of the `@binding(2)` uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub members: Vec<UniformMember>,
    pub size: u32,
}

impl UniformLayout {
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// A validated, reflected shader stage.
#[derive(Debug, Clone)]
pub struct StageModule {
    stage: ShaderStage,
    source: String,
    entry_point: String,
    inputs: Vec<InterfaceVar>,
    outputs: Vec<InterfaceVar>,
    uniforms: Option<UniformLayout>,
}

impl StageModule {
    pub fn compile_vertex(source: &str) -> Result<Self, CompileError> {
        Self::compile(ShaderStage::Vertex, naga::ShaderStage::Vertex, source)
    }

    pub fn compile_fragment(source: &str) -> Result<Self, CompileError> {
        Self::compile(ShaderStage::Fragment, naga::ShaderStage::Fragment, source)
    }

    fn compile(
        stage: ShaderStage,
        naga_stage: naga::ShaderStage,
        source: &str,
    ) -> Result<Self, CompileError> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| CompileError::new(stage, e.emit_to_string(source)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| CompileError::new(stage, e.emit_to_string(source)))?;

        let mut candidates = module.entry_points.iter().filter(|ep| ep.stage == naga_stage);
        let entry = match (candidates.next(), candidates.next()) {
            (Some(ep), None) => ep,
            (None, _) => {
                return Err(CompileError::new(
                    stage,
                    format!("no @{stage} entry point found"),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(CompileError::new(
                    stage,
                    format!("more than one @{stage} entry point"),
                ));
            }
        };

        let mut inputs = Vec::new();
        for arg in &entry.function.arguments {
            collect_locations(
                &module,
                arg.name.as_deref(),
                arg.ty,
                arg.binding.as_ref(),
                &mut inputs,
            );
        }
        let mut outputs = Vec::new();
        if let Some(result) = &entry.function.result {
            collect_locations(&module, None, result.ty, result.binding.as_ref(), &mut outputs);
        }

        let uniforms = reflect_resources(&module)?;

        Ok(Self {
            stage,
            source: source.to_owned(),
            entry_point: entry.name.clone(),
            inputs,
            outputs,
            uniforms,
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn inputs(&self) -> &[InterfaceVar] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[InterfaceVar] {
        &self.outputs
    }

    pub fn uniforms(&self) -> Option<&UniformLayout> {
        self.uniforms.as_ref()
    }
}

/// Result of linking a vertex and a fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub vertex_inputs: Vec<InterfaceVar>,
    pub uniforms: Option<UniformLayout>,
}

impl Interface {
    pub fn vertex_input(&self, name: &str) -> Option<&InterfaceVar> {
        self.vertex_inputs
            .iter()
            .find(|v| v.name.as_deref() == Some(name))
    }
}

/// Check that `vertex` feeds every input of `fragment`, that the fragment
/// stage writes exactly one float colour, and that both stages agree on the
/// parameter block.
///
/// Vertex inputs are fed from two-float quad corners, so each one must be a
/// float vector of at least two components.
pub fn link(vertex: &StageModule, fragment: &StageModule) -> Result<Interface, CompileError> {
    if let Some(input) = vertex
        .inputs
        .iter()
        .find(|i| !i.is_float || i.components < 2)
    {
        return Err(CompileError::link(format!(
            "vertex input {} at @location({}) must be a float vector of 2 to 4 components",
            input.name.as_deref().unwrap_or("<unnamed>"),
            input.location
        )));
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|o| o.location == input.location) {
            None => {
                return Err(CompileError::link(format!(
                    "fragment input @location({}) is not written by the vertex stage",
                    input.location
                )));
            }
            Some(output) if output.is_float != input.is_float => {
                return Err(CompileError::link(format!(
                    "@location({}) has a different scalar kind in each stage",
                    input.location
                )));
            }
            Some(_) => {}
        }
    }

    let colour_ok = !fragment.outputs.is_empty()
        && fragment
            .outputs
            .iter()
            .all(|o| o.location == 0 && o.is_float);
    if !colour_ok {
        return Err(CompileError::link(
            "fragment stage must write a single float colour to @location(0)",
        ));
    }

    let uniforms = match (&vertex.uniforms, &fragment.uniforms) {
        (Some(v), Some(f)) if v != f => {
            return Err(CompileError::link(
                "vertex and fragment stages declare different parameter blocks",
            ));
        }
        (v, f) => f.clone().or_else(|| v.clone()),
    };

    Ok(Interface {
        vertex_inputs: vertex.inputs.clone(),
        uniforms,
    })
}

fn collect_locations(
    module: &naga::Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<InterfaceVar>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => out.push(InterfaceVar {
            name: name.map(str::to_owned),
            location: *location,
            is_float: scalar_of(inner).is_some_and(|s| s.kind == ScalarKind::Float),
            components: component_count(inner),
        }),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    collect_locations(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn reflect_resources(module: &naga::Module) -> Result<Option<UniformLayout>, CompileError> {
    let mut uniforms = None;
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let inner = &module.types[var.ty].inner;

        if binding.group != BIND_GROUP {
            return Err(CompileError::link(format!(
                "`{name}` is in group {}; only group {BIND_GROUP} is bound",
                binding.group
            )));
        }

        match binding.binding {
            FIELD_BINDING => {
                let is_field = matches!(
                    inner,
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class: ImageClass::Sampled {
                            kind: ScalarKind::Float,
                            multi: false,
                        },
                    }
                );
                if !is_field {
                    return Err(CompileError::link(format!(
                        "`{name}` at @binding({FIELD_BINDING}) must be a texture_2d<f32>"
                    )));
                }
            }
            SAMPLER_BINDING => {
                if !matches!(inner, TypeInner::Sampler { comparison: false }) {
                    return Err(CompileError::link(format!(
                        "`{name}` at @binding({SAMPLER_BINDING}) must be a non-comparison sampler"
                    )));
                }
            }
            PARAMS_BINDING => {
                if !matches!(var.space, AddressSpace::Uniform) {
                    return Err(CompileError::link(format!(
                        "`{name}` at @binding({PARAMS_BINDING}) must be var<uniform>"
                    )));
                }
                uniforms = Some(uniform_layout(module, name, inner));
            }
            other => {
                return Err(CompileError::link(format!(
                    "`{name}` uses @binding({other}); programs may only bind 0 (field), 1 (sampler) and 2 (parameters)"
                )));
            }
        }
    }
    Ok(uniforms)
}

/// A struct block exposes its members; a bare `var<uniform> x: f32` exposes
/// itself as a single member at offset 0.
fn uniform_layout(module: &naga::Module, var_name: &str, inner: &TypeInner) -> UniformLayout {
    match inner {
        TypeInner::Struct { members, span } => UniformLayout {
            members: members
                .iter()
                .filter_map(|m| {
                    Some(UniformMember {
                        name: m.name.clone()?,
                        offset: m.offset,
                        shape: uniform_shape(&module.types[m.ty].inner),
                    })
                })
                .collect(),
            size: *span,
        },
        other => UniformLayout {
            members: vec![UniformMember {
                name: var_name.to_owned(),
                offset: 0,
                shape: uniform_shape(other),
            }],
            size: other.size(module.to_ctx()),
        },
    }
}

fn component_count(inner: &TypeInner) -> u32 {
    match *inner {
        TypeInner::Scalar(_) => 1,
        TypeInner::Vector { size, .. } => match size {
            VectorSize::Bi => 2,
            VectorSize::Tri => 3,
            VectorSize::Quad => 4,
        },
        _ => 0,
    }
}

fn scalar_of(inner: &TypeInner) -> Option<Scalar> {
    match *inner {
        TypeInner::Scalar(scalar) => Some(scalar),
        TypeInner::Vector { scalar, .. } => Some(scalar),
        _ => None,
    }
}

fn uniform_shape(inner: &TypeInner) -> Option<UniformShape> {
    let (components, scalar) = match *inner {
        TypeInner::Scalar(scalar) => (1, scalar),
        TypeInner::Vector { size, scalar } => match size {
            VectorSize::Bi => (2, scalar),
            VectorSize::Quad => (4, scalar),
            _ => return None,
        },
        _ => return None,
    };
    if scalar.width != 4 {
        return None;
    }
    match (components, scalar.kind) {
        (1, ScalarKind::Float) => Some(UniformShape::Float),
        (1, ScalarKind::Sint) => Some(UniformShape::Int),
        (1, ScalarKind::Uint) => Some(UniformShape::UInt),
        (2, ScalarKind::Float) => Some(UniformShape::Vec2Float),
        (2, ScalarKind::Sint) => Some(UniformShape::Vec2Int),
        (4, ScalarKind::Float) => Some(UniformShape::Vec4Float),
        _ => None,
    }
}
