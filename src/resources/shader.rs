//! Shader programs and their reflected interface.
//!
//! WGSL sources are parsed with `naga` once at load time to find out which named
//! vertex inputs a program reads (and at which `@location`) and how its uniform
//! block at `@group(0) @binding(0)` is laid out. Scene code talks to shaders by
//! name only: [`ShaderProgram::attribute_location`] and
//! [`UniformBlock::set_uniform`].

use std::{collections::HashMap, path::Path, rc::Rc};

use anyhow::Context as _;
use cgmath::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use naga::{AddressSpace, Binding, ScalarKind, ShaderStage, TypeInner, VectorSize};

use crate::{context::DeviceContext, resources::load_string};

/// Entry point names every program has to provide.
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Per-vertex Blinn-Phong shading, reads `position`, `color` and `normal`.
pub const LIT_SHADER: &str = "lit";
/// Unshaded vertex colours, reads `position` and `color`.
pub const FLAT_SHADER: &str = "flat";

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader `{name}` failed to parse:\n{message}")]
    Parse { name: String, message: String },
    #[error("shader `{name}` failed validation:\n{message}")]
    Validation { name: String, message: String },
    #[error("shader `{name}` has no {stage} entry point `{entry}`")]
    MissingEntryPoint {
        name: String,
        stage: &'static str,
        entry: &'static str,
    },
    #[error("shader `{name}` declares `{variable}` at group {group} binding {binding}, only a uniform block at group 0 binding 0 is supported")]
    UnsupportedBinding {
        name: String,
        variable: String,
        group: u32,
        binding: u32,
    },
    #[error("no shader named `{0}` is registered")]
    NotFound(String),
}

/// A named vertex input of the vertex entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    pub format: wgpu::VertexFormat,
}

impl VertexInput {
    pub fn is_float(&self) -> bool {
        matches!(
            self.format,
            wgpu::VertexFormat::Float32
                | wgpu::VertexFormat::Float32x2
                | wgpu::VertexFormat::Float32x3
                | wgpu::VertexFormat::Float32x4
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Bytes written for a value of this kind. `mat3x3` columns are padded to 16 bytes.
    pub fn size(self) -> usize {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// What a program reads: vertex inputs and the uniform block layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderInterface {
    pub inputs: Vec<VertexInput>,
    pub uniforms: Vec<UniformField>,
    /// Size of the uniform block in bytes, 0 when the program has none.
    pub uniform_size: u64,
}

impl ShaderInterface {
    /// Parses, validates and reflects a WGSL source.
    pub fn reflect(name: &str, source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
            name: name.to_string(),
            message: e.emit_to_string(source),
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        );
        validator
            .validate(&module)
            .map_err(|e| ShaderError::Validation {
                name: name.to_string(),
                message: e.emit_to_string(source),
            })?;

        let vertex = find_entry_point(&module, name, ShaderStage::Vertex, VERTEX_ENTRY, "vertex")?;
        find_entry_point(&module, name, ShaderStage::Fragment, FRAGMENT_ENTRY, "fragment")?;

        let mut inputs = Vec::new();
        for argument in &vertex.function.arguments {
            match &argument.binding {
                Some(Binding::Location { location, .. }) => {
                    if let (Some(arg_name), Some(format)) = (
                        argument.name.as_ref(),
                        vertex_format(&module.types[argument.ty].inner),
                    ) {
                        inputs.push(VertexInput {
                            name: arg_name.clone(),
                            location: *location,
                            format,
                        });
                    }
                }
                Some(Binding::BuiltIn(_)) => {}
                None => {
                    if let TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                        for member in members {
                            if let (
                                Some(Binding::Location { location, .. }),
                                Some(member_name),
                                Some(format),
                            ) = (
                                &member.binding,
                                member.name.as_ref(),
                                vertex_format(&module.types[member.ty].inner),
                            ) {
                                inputs.push(VertexInput {
                                    name: member_name.clone(),
                                    location: *location,
                                    format,
                                });
                            }
                        }
                    }
                }
            }
        }
        inputs.sort_by_key(|input| input.location);

        let mut uniforms = Vec::new();
        let mut uniform_size = 0;
        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let variable = global.name.clone().unwrap_or_default();
            if global.space != AddressSpace::Uniform || binding.group != 0 || binding.binding != 0
            {
                return Err(ShaderError::UnsupportedBinding {
                    name: name.to_string(),
                    variable,
                    group: binding.group,
                    binding: binding.binding,
                });
            }
            match &module.types[global.ty].inner {
                TypeInner::Struct { members, span } => {
                    uniform_size = *span as u64;
                    for member in members {
                        let (Some(member_name), Some(kind)) = (
                            member.name.as_ref(),
                            uniform_kind(&module.types[member.ty].inner),
                        ) else {
                            log::debug!(
                                "Uniform member {:?} of shader `{}` has no settable type, skipping.",
                                member.name,
                                name
                            );
                            continue;
                        };
                        uniforms.push(UniformField {
                            name: member_name.clone(),
                            offset: member.offset,
                            kind,
                        });
                    }
                }
                inner => {
                    if let Some(kind) = uniform_kind(inner) {
                        uniform_size = kind.size() as u64;
                        uniforms.push(UniformField {
                            name: variable,
                            offset: 0,
                            kind,
                        });
                    }
                }
            }
        }

        Ok(Self {
            inputs,
            uniforms,
            uniform_size,
        })
    }

    pub fn input(&self, name: &str) -> Option<&VertexInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.input(name).map(|input| input.location)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformField> {
        self.uniforms.iter().find(|field| field.name == name)
    }

    pub fn has_uniform_block(&self) -> bool {
        self.uniform_size > 0
    }

    /// A zeroed host copy of the uniform block, rounded up to 16 bytes.
    pub fn new_uniform_block(&self) -> UniformBlock {
        let size = (self.uniform_size as usize).div_ceil(16) * 16;
        UniformBlock {
            fields: self.uniforms.clone(),
            data: vec![0; size],
        }
    }
}

fn find_entry_point<'m>(
    module: &'m naga::Module,
    name: &str,
    stage: ShaderStage,
    entry: &'static str,
    stage_name: &'static str,
) -> Result<&'m naga::EntryPoint, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == entry)
        .ok_or_else(|| ShaderError::MissingEntryPoint {
            name: name.to_string(),
            stage: stage_name,
            entry,
        })
}

fn vertex_format(inner: &TypeInner) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let (kind, width, components) = match inner {
        TypeInner::Scalar(scalar) => (scalar.kind, scalar.width, 1),
        TypeInner::Vector { size, scalar } => (scalar.kind, scalar.width, *size as u8),
        _ => return None,
    };
    if width != 4 {
        return None;
    }
    let format = match (kind, components) {
        (ScalarKind::Float, 1) => F::Float32,
        (ScalarKind::Float, 2) => F::Float32x2,
        (ScalarKind::Float, 3) => F::Float32x3,
        (ScalarKind::Float, 4) => F::Float32x4,
        (ScalarKind::Uint, 1) => F::Uint32,
        (ScalarKind::Uint, 2) => F::Uint32x2,
        (ScalarKind::Uint, 3) => F::Uint32x3,
        (ScalarKind::Uint, 4) => F::Uint32x4,
        (ScalarKind::Sint, 1) => F::Sint32,
        (ScalarKind::Sint, 2) => F::Sint32x2,
        (ScalarKind::Sint, 3) => F::Sint32x3,
        (ScalarKind::Sint, 4) => F::Sint32x4,
        _ => return None,
    };
    Some(format)
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    let is_f32 = |scalar: &naga::Scalar| scalar.kind == ScalarKind::Float && scalar.width == 4;
    match inner {
        TypeInner::Scalar(scalar) if is_f32(scalar) => Some(UniformKind::Float),
        TypeInner::Vector { size, scalar } if is_f32(scalar) => Some(match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        }),
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar,
        } if is_f32(scalar) => Some(UniformKind::Mat3),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if is_f32(scalar) => Some(UniformKind::Mat4),
        _ => None,
    }
}

/// A value that can be written into a uniform block by name.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat3(Matrix3<f32>),
    Mat4(Matrix4<f32>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => {
                let raw: [f32; 2] = (*v).into();
                out.copy_from_slice(bytemuck::cast_slice(&raw));
            }
            UniformValue::Vec3(v) => {
                let raw: [f32; 3] = (*v).into();
                out.copy_from_slice(bytemuck::cast_slice(&raw));
            }
            UniformValue::Vec4(v) => {
                let raw: [f32; 4] = (*v).into();
                out.copy_from_slice(bytemuck::cast_slice(&raw));
            }
            UniformValue::Mat3(m) => {
                // every column occupies a full vec4 slot
                let raw: [[f32; 4]; 3] = [m.x.extend(0.0).into(), m.y.extend(0.0).into(), m.z.extend(0.0).into()];
                out.copy_from_slice(bytemuck::cast_slice(&raw));
            }
            UniformValue::Mat4(m) => {
                let raw: [[f32; 4]; 4] = (*m).into();
                out.copy_from_slice(bytemuck::cast_slice(&raw));
            }
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(m: Matrix3<f32>) -> Self {
        UniformValue::Mat3(m)
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(m: Matrix4<f32>) -> Self {
        UniformValue::Mat4(m)
    }
}

/// Host copy of a program's uniform block, uploaded once per draw.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlock {
    fields: Vec<UniformField>,
    data: Vec<u8>,
}

impl UniformBlock {
    /**
     * Writes `value` at the reflected offset of `name`.
     *
     * Returns whether anything was written. Names the program does not declare
     * are ignored, values of the wrong kind are rejected with a warning.
     */
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        let Some(field) = self.fields.iter().find(|field| field.name == name) else {
            log::trace!("Uniform `{}` is not declared, ignoring.", name);
            return false;
        };
        if field.kind != value.kind() {
            log::warn!(
                "Uniform `{}` is a {:?}, refusing to write a {:?}.",
                name,
                field.kind,
                value.kind()
            );
            return false;
        }
        let start = field.offset as usize;
        let end = start + field.kind.size();
        match self.data.get_mut(start..end) {
            Some(out) => {
                value.write(out);
                true
            }
            None => {
                log::warn!("Uniform `{}` lies outside of the uniform block.", name);
                false
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A compiled shader module plus its reflected interface.
#[derive(Debug)]
pub struct ShaderProgram {
    name: String,
    module: wgpu::ShaderModule,
    interface: ShaderInterface,
}

impl ShaderProgram {
    pub fn new(gpu: &DeviceContext, name: &str, source: &str) -> Result<Self, ShaderError> {
        let interface = ShaderInterface::reflect(name, source)?;
        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} Shader", name)),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        log::debug!(
            "Loaded shader `{}` with inputs {:?}",
            name,
            interface.inputs.iter().map(|i| &i.name).collect::<Vec<_>>()
        );
        Ok(Self {
            name: name.to_string(),
            module,
            interface,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub fn interface(&self) -> &ShaderInterface {
        &self.interface
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.interface.attribute_location(name)
    }
}

/// Name to program map owned by whoever builds the scene.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    programs: HashMap<String, Rc<ShaderProgram>>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the [`LIT_SHADER`] and [`FLAT_SHADER`] programs.
    pub fn with_builtin(gpu: &DeviceContext) -> Result<Self, ShaderError> {
        let mut registry = Self::new();
        registry.load(gpu, LIT_SHADER, include_str!("../pipelines/lit.wgsl"))?;
        registry.load(gpu, FLAT_SHADER, include_str!("../pipelines/flat.wgsl"))?;
        Ok(registry)
    }

    /// Compiles `source` and registers it under `name`, replacing any previous program.
    pub fn load(
        &mut self,
        gpu: &DeviceContext,
        name: &str,
        source: &str,
    ) -> Result<Rc<ShaderProgram>, ShaderError> {
        let program = Rc::new(ShaderProgram::new(gpu, name, source)?);
        self.programs.insert(name.to_string(), program.clone());
        Ok(program)
    }

    pub async fn load_file(
        &mut self,
        gpu: &DeviceContext,
        name: &str,
        path: impl AsRef<Path>,
    ) -> anyhow::Result<Rc<ShaderProgram>> {
        let path = path.as_ref();
        let source = load_string(path).await?;
        let program = self
            .load(gpu, name, &source)
            .with_context(|| format!("while loading {}", path.display()))?;
        Ok(program)
    }

    pub fn get(&self, name: &str) -> Result<Rc<ShaderProgram>, ShaderError> {
        self.programs
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;

    use super::*;

    const LIT: &str = include_str!("../pipelines/lit.wgsl");
    const FLAT: &str = include_str!("../pipelines/flat.wgsl");

    fn read_f32(block: &UniformBlock, offset: usize) -> f32 {
        let bytes: [u8; 4] = block.as_bytes()[offset..offset + 4].try_into().unwrap();
        f32::from_le_bytes(bytes)
    }

    #[test]
    fn lit_shader_exposes_all_three_attributes() {
        let interface = ShaderInterface::reflect(LIT_SHADER, LIT).unwrap();
        assert_eq!(interface.attribute_location("position"), Some(0));
        assert_eq!(interface.attribute_location("color"), Some(1));
        assert_eq!(interface.attribute_location("normal"), Some(2));
        assert!(interface.inputs.iter().all(VertexInput::is_float));
        for name in [
            "mvp",
            "model_view",
            "normal_matrix",
            "ambient",
            "diffuse",
            "specular",
            "shininess",
            "light_dir",
        ] {
            assert!(interface.uniform(name).is_some(), "missing uniform {}", name);
        }
        assert_eq!(interface.uniform("mvp").unwrap().offset, 0);
        assert_eq!(interface.uniform("model_view").unwrap().offset, 64);
        assert_eq!(interface.uniform("light_dir").unwrap().kind, UniformKind::Vec3);
    }

    #[test]
    fn flat_shader_has_no_normal_input() {
        let interface = ShaderInterface::reflect(FLAT_SHADER, FLAT).unwrap();
        assert_eq!(interface.attribute_location("position"), Some(0));
        assert_eq!(interface.attribute_location("color"), Some(1));
        assert_eq!(interface.attribute_location("normal"), None);
        assert_eq!(interface.uniform_size, 64);
    }

    #[test]
    fn loose_arguments_and_plain_uniforms_are_reflected() {
        let src = r#"
            @group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;

            @vertex
            fn vs_main(@location(3) position: vec3<f32>, @builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
                return mvp * vec4<f32>(position, 1.0);
            }

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        let interface = ShaderInterface::reflect("loose", src).unwrap();
        assert_eq!(interface.inputs.len(), 1);
        assert_eq!(interface.attribute_location("position"), Some(3));
        assert_eq!(interface.uniform("mvp").unwrap().kind, UniformKind::Mat4);
        assert_eq!(interface.uniform_size, 64);
    }

    #[test]
    fn texture_bindings_are_rejected() {
        let src = r#"
            @group(0) @binding(1) var tex: texture_2d<f32>;

            @vertex
            fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 1.0);
            }

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return textureLoad(tex, vec2<i32>(0, 0), 0);
            }
        "#;
        let err = ShaderInterface::reflect("textured", src).unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedBinding { binding: 1, .. }));
    }

    #[test]
    fn missing_fragment_entry_point_is_an_error() {
        let src = r#"
            @vertex
            fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 1.0);
            }
        "#;
        let err = ShaderInterface::reflect("no_fs", src).unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { entry: FRAGMENT_ENTRY, .. }));
    }

    #[test]
    fn syntax_errors_are_reported_with_source_context() {
        let err = ShaderInterface::reflect("broken", "fn vs_main( {").unwrap_err();
        match err {
            ShaderError::Parse { name, message } => {
                assert_eq!(name, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn uniform_block_writes_at_reflected_offsets() {
        let interface = ShaderInterface::reflect(LIT_SHADER, LIT).unwrap();
        let mut block = interface.new_uniform_block();
        assert_eq!(block.len() % 16, 0);

        assert!(block.set_uniform("shininess", 32.0));
        let offset = interface.uniform("shininess").unwrap().offset as usize;
        assert_eq!(read_f32(&block, offset), 32.0);

        assert!(block.set_uniform("mvp", Matrix4::<f32>::identity()));
        assert_eq!(read_f32(&block, 0), 1.0);
        assert_eq!(read_f32(&block, 4), 0.0);
        assert_eq!(read_f32(&block, 20), 1.0);

        let light = interface.uniform("light_dir").unwrap().offset as usize;
        assert!(block.set_uniform("light_dir", Vector3::new(0.0, 2.0, 3.0)));
        assert_eq!(read_f32(&block, light + 4), 2.0);
        assert_eq!(read_f32(&block, light + 8), 3.0);
    }

    #[test]
    fn unknown_and_mistyped_uniforms_are_ignored() {
        let interface = ShaderInterface::reflect(FLAT_SHADER, FLAT).unwrap();
        let mut block = interface.new_uniform_block();
        let before = block.clone();
        assert!(!block.set_uniform("shininess", 32.0));
        assert!(!block.set_uniform("mvp", 1.0));
        assert_eq!(block, before);
    }

    #[test]
    fn mat3_columns_are_padded() {
        let mut block = UniformBlock {
            fields: vec![UniformField {
                name: "m".into(),
                offset: 0,
                kind: UniformKind::Mat3,
            }],
            data: vec![0; 48],
        };
        assert!(block.set_uniform("m", Matrix3::<f32>::identity()));
        assert_eq!(read_f32(&block, 0), 1.0);
        assert_eq!(read_f32(&block, 12), 0.0);
        assert_eq!(read_f32(&block, 16 + 4), 1.0);
        assert_eq!(read_f32(&block, 32 + 8), 1.0);
    }

    #[test]
    fn registry_reports_unknown_names() {
        let registry = ShaderRegistry::new();
        assert!(registry.is_empty());
        let err = registry.get("default").unwrap_err();
        assert!(matches!(err, ShaderError::NotFound(name) if name == "default"));
    }
}
