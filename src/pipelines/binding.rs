//! Attribute wiring between a mesh and a shader program.
//!
//! A [`RenderBinding`] is the draw state for one (mesh, program) pair: a render
//! pipeline whose vertex layouts connect the mesh's buffers to the program's
//! named inputs, plus a private uniform buffer. It is rebuilt from scratch
//! whenever either side changes.

use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::{
    context::DeviceContext,
    data_structures::texture::Texture,
    pipelines::mk_render_pipeline,
    resources::{
        mesh::GpuMesh,
        shader::{ShaderInterface, ShaderProgram, UniformBlock},
    },
};

/// Mesh attributes in the order they are wired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshAttribute {
    Position,
    Color,
    Normal,
}

impl MeshAttribute {
    pub const ALL: [MeshAttribute; 3] = [MeshAttribute::Position, MeshAttribute::Color, MeshAttribute::Normal];

    /// Shader input name this attribute binds to.
    pub fn name(self) -> &'static str {
        match self {
            MeshAttribute::Position => "position",
            MeshAttribute::Color => "color",
            MeshAttribute::Normal => "normal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeSource {
    Mesh(MeshAttribute),
    /// A single zero element repeated for every vertex.
    Constant,
}

/// One vertex buffer slot of a binding.
#[derive(Clone, Debug, PartialEq)]
pub struct WiringSlot {
    pub input: String,
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub source: AttributeSource,
}

/// Bytes of the shared zero element, large enough for any 4 component input.
const CONSTANT_STRIDE: u64 = 16;

/**
 * Decides which buffer feeds which program input.
 *
 * `position`, `color` and `normal` are taken from the mesh in that order when the
 * program reads them and the mesh has them. Every other input the program reads
 * is fed a constant zero. Returns `None` when the program has no float
 * `position` input, since nothing could be drawn.
 */
pub fn plan_wiring(interface: &ShaderInterface, mesh_has_normals: bool) -> Option<Vec<WiringSlot>> {
    let mut slots = Vec::with_capacity(interface.inputs.len());
    for attribute in MeshAttribute::ALL {
        let Some(input) = interface.input(attribute.name()) else {
            if attribute == MeshAttribute::Position {
                log::warn!("Program reads no `position` input, the binding stays empty.");
                return None;
            }
            continue;
        };
        if !input.is_float() {
            log::warn!(
                "Input `{}` is declared as {:?}, mesh attributes are float vectors.",
                input.name,
                input.format
            );
            if attribute == MeshAttribute::Position {
                return None;
            }
            continue;
        }
        if attribute == MeshAttribute::Normal && !mesh_has_normals {
            log::debug!("Mesh has no normals, `normal` is fed a constant.");
            continue;
        }
        slots.push(WiringSlot {
            input: input.name.clone(),
            location: input.location,
            format: wgpu::VertexFormat::Float32x3,
            source: AttributeSource::Mesh(attribute),
        });
    }
    for input in &interface.inputs {
        if slots.iter().any(|slot| slot.location == input.location) {
            continue;
        }
        slots.push(WiringSlot {
            input: input.name.clone(),
            location: input.location,
            format: input.format,
            source: AttributeSource::Constant,
        });
    }
    Some(slots)
}

#[derive(Debug)]
pub struct RenderBinding {
    pipeline: wgpu::RenderPipeline,
    slots: Vec<WiringSlot>,
    mesh: Rc<GpuMesh>,
    program: Rc<ShaderProgram>,
    constant: Option<wgpu::Buffer>,
    uniform_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

impl RenderBinding {
    /// Wires `mesh` to `program`.
    ///
    /// `None` when the mesh is unusable, the program lacks `position`, or the
    /// device rejects the resulting pipeline.
    pub fn new(
        gpu: &DeviceContext,
        mesh: &Rc<GpuMesh>,
        program: &Rc<ShaderProgram>,
        label: &str,
    ) -> Option<Self> {
        if !mesh.is_usable() {
            return None;
        }
        let interface = program.interface();
        let slots = plan_wiring(interface, mesh.has_normals())?;
        let max_vertex_buffers = gpu.device.limits().max_vertex_buffers;
        if slots.len() > max_vertex_buffers as usize {
            log::warn!(
                "Program `{}` reads {} inputs but the device has only {} vertex buffer slots, the binding stays empty.",
                program.name(),
                slots.len(),
                max_vertex_buffers
            );
            return None;
        }

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = slots
            .iter()
            .map(|slot| {
                [wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: slot.location,
                    format: slot.format,
                }]
            })
            .collect();
        let layouts: Vec<wgpu::VertexBufferLayout> = slots
            .iter()
            .zip(&attributes)
            .map(|(slot, attribute)| match slot.source {
                AttributeSource::Mesh(_) => wgpu::VertexBufferLayout {
                    array_stride: slot.format.size(),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: attribute,
                },
                // Stepping per instance keeps the one element in range for every vertex.
                AttributeSource::Constant => wgpu::VertexBufferLayout {
                    array_stride: CONSTANT_STRIDE,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: attribute,
                },
            })
            .collect();

        let constant = slots
            .iter()
            .any(|slot| slot.source == AttributeSource::Constant)
            .then(|| {
                gpu.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{:?} Constant Attribute Buffer", label)),
                        contents: &[0u8; CONSTANT_STRIDE as usize],
                        usage: wgpu::BufferUsages::VERTEX,
                    })
            });

        // Target and output mismatches only show up as validation errors.
        let scope = gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = interface.has_uniform_block().then(|| {
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform_bind_group_layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                })
        });
        let (uniform_buffer, bind_group) = match &bind_group_layout {
            Some(layout) => {
                let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{:?} Uniform Buffer", label)),
                    size: interface.new_uniform_block().len() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{:?} Uniform Bind Group", label)),
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                (Some(buffer), Some(bind_group))
            }
            None => (None, None),
        };

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{:?} Pipeline Layout", label)),
                bind_group_layouts: &bind_group_layout.iter().collect::<Vec<_>>(),
                immediate_size: 0,
            });

        let pipeline = mk_render_pipeline(
            &gpu.device,
            &pipeline_layout,
            gpu.color_format,
            Some(wgpu::BlendState::REPLACE),
            Some(Texture::DEPTH_FORMAT),
            &layouts,
            program.module(),
            mesh.topology().to_wgpu(),
            gpu.polygon_mode(),
            label,
        );

        if let Some(error) = futures::executor::block_on(scope.pop()) {
            log::warn!(
                "Could not bind {:?} to program `{}`, the binding stays empty: {}",
                label,
                program.name(),
                error
            );
            return None;
        }

        log::debug!(
            "Bound {:?} to program `{}`: {:?}",
            label,
            program.name(),
            slots.iter().map(|s| (&s.input, s.source)).collect::<Vec<_>>()
        );

        Some(Self {
            pipeline,
            slots,
            mesh: mesh.clone(),
            program: program.clone(),
            constant,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn slots(&self) -> &[WiringSlot] {
        &self.slots
    }

    /// Whether `input` is fed from a mesh buffer (constant-fed inputs do not count).
    pub fn is_wired(&self, input: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.input == input && matches!(slot.source, AttributeSource::Mesh(_)))
    }

    pub fn mesh(&self) -> &Rc<GpuMesh> {
        &self.mesh
    }

    pub fn program(&self) -> &Rc<ShaderProgram> {
        &self.program
    }

    /// A zeroed uniform block laid out for this binding's program.
    pub fn new_uniforms(&self) -> UniformBlock {
        self.program.interface().new_uniform_block()
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &UniformBlock) {
        if let Some(buffer) = &self.uniform_buffer {
            queue.write_buffer(buffer, 0, uniforms.as_bytes());
        }
    }

    /// Records one indexed draw of the whole mesh.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffers) = self.mesh.buffers() else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        if let Some(bind_group) = &self.bind_group {
            render_pass.set_bind_group(0, bind_group, &[]);
        }
        for (slot_index, slot) in self.slots.iter().enumerate() {
            let buffer = match slot.source {
                AttributeSource::Mesh(MeshAttribute::Position) => Some(&buffers.position),
                AttributeSource::Mesh(MeshAttribute::Color) => Some(&buffers.color),
                AttributeSource::Mesh(MeshAttribute::Normal) => buffers.normal.as_ref(),
                AttributeSource::Constant => self.constant.as_ref(),
            };
            if let Some(buffer) = buffer {
                render_pass.set_vertex_buffer(slot_index as u32, buffer.slice(..));
            }
        }
        render_pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.mesh.index_count(), 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::shader::{FLAT_SHADER, LIT_SHADER};

    fn lit() -> ShaderInterface {
        ShaderInterface::reflect(LIT_SHADER, include_str!("lit.wgsl")).unwrap()
    }

    fn flat() -> ShaderInterface {
        ShaderInterface::reflect(FLAT_SHADER, include_str!("flat.wgsl")).unwrap()
    }

    fn sources(slots: &[WiringSlot]) -> Vec<AttributeSource> {
        slots.iter().map(|s| s.source).collect()
    }

    #[test]
    fn wires_position_color_normal_in_order() {
        let slots = plan_wiring(&lit(), true).unwrap();
        assert_eq!(
            sources(&slots),
            vec![
                AttributeSource::Mesh(MeshAttribute::Position),
                AttributeSource::Mesh(MeshAttribute::Color),
                AttributeSource::Mesh(MeshAttribute::Normal),
            ]
        );
        assert_eq!(slots[0].location, 0);
        assert_eq!(slots[2].location, 2);
    }

    #[test]
    fn missing_mesh_normals_fall_back_to_a_constant() {
        let slots = plan_wiring(&lit(), false).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].input, "normal");
        assert_eq!(slots[2].source, AttributeSource::Constant);
    }

    #[test]
    fn undeclared_inputs_are_skipped() {
        let slots = plan_wiring(&flat(), true).unwrap();
        assert_eq!(
            sources(&slots),
            vec![
                AttributeSource::Mesh(MeshAttribute::Position),
                AttributeSource::Mesh(MeshAttribute::Color),
            ]
        );
    }

    #[test]
    fn program_without_position_gets_no_binding() {
        let src = r#"
            @vertex
            fn vs_main(@location(0) color: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(color, 1.0);
            }

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        let interface = ShaderInterface::reflect("no_position", src).unwrap();
        assert_eq!(plan_wiring(&interface, true), None);
    }

    #[test]
    fn unknown_inputs_are_fed_constants_with_their_own_format() {
        let src = r#"
            struct VertexInput {
                @location(0) position: vec3<f32>,
                @location(4) uv: vec2<f32>,
                @location(5) id: u32,
            }

            @vertex
            fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
                return vec4<f32>(in.position + vec3<f32>(in.uv, f32(in.id)), 1.0);
            }

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        let interface = ShaderInterface::reflect("extra_inputs", src).unwrap();
        let slots = plan_wiring(&interface, true).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].source, AttributeSource::Mesh(MeshAttribute::Position));
        assert_eq!(slots[1].input, "uv");
        assert_eq!(slots[1].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(slots[1].source, AttributeSource::Constant);
        assert_eq!(slots[2].format, wgpu::VertexFormat::Uint32);
        assert!(slots.iter().all(|s| s.format.size() <= CONSTANT_STRIDE));
    }
}
