use cgmath::Vector3;
use wgpu::util::DeviceExt;

use crate::{
    context::DeviceContext,
    data_structures::mesh::{MeshBuffer, Topology},
};

/// Device buffers of an uploaded mesh.
#[derive(Debug)]
pub struct MeshBuffers {
    pub position: wgpu::Buffer,
    pub color: wgpu::Buffer,
    pub normal: Option<wgpu::Buffer>,
    pub index: wgpu::Buffer,
}

/**
 * Immutable GPU copy of a [`MeshBuffer`].
 *
 * A mesh that is empty, malformed, or larger than the device allows is still
 * constructed but holds no buffers and reports an index count of 0. Nodes using
 * such a mesh are never drawn.
 */
#[derive(Debug)]
pub struct GpuMesh {
    label: String,
    buffers: Option<MeshBuffers>,
    index_count: u32,
    vertex_count: u32,
    topology: Topology,
}

impl GpuMesh {
    pub fn new(gpu: &DeviceContext, mesh: &MeshBuffer, label: &str) -> Self {
        let unusable = |reason: &str| {
            log::warn!("Mesh {:?} cannot be uploaded: {}.", label, reason);
            Self {
                label: label.to_string(),
                buffers: None,
                index_count: 0,
                vertex_count: 0,
                topology: mesh.topology,
            }
        };

        if mesh.is_empty() {
            return unusable("it has no vertices or indices");
        }
        if !mesh.is_well_formed() {
            return unusable("its arrays disagree in length or an index is out of range");
        }
        let vertex_bytes = (mesh.vertices.len() * std::mem::size_of::<[f32; 3]>()) as u64;
        let index_bytes = (mesh.indices.len() * std::mem::size_of::<u16>()) as u64;
        let max_buffer_size = gpu.device.limits().max_buffer_size;
        if vertex_bytes > max_buffer_size || index_bytes > max_buffer_size {
            return unusable("it exceeds the maximum buffer size of the device");
        }

        let vertex_buffer = |suffix: &str, data: &[Vector3<f32>]| {
            let raw: Vec<[f32; 3]> = data.iter().map(|&v| v.into()).collect();
            gpu.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} {} Buffer", label, suffix)),
                    contents: bytemuck::cast_slice(&raw),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        };

        let position = vertex_buffer("Position", &mesh.vertices);
        let color = vertex_buffer("Color", &mesh.colors);
        let normal = mesh
            .has_normals()
            .then(|| vertex_buffer("Normal", &mesh.normals));
        let index = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Index Buffer", label)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        log::debug!(
            "Uploaded mesh {:?}: {} vertices, {} indices",
            label,
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Self {
            label: label.to_string(),
            buffers: Some(MeshBuffers {
                position,
                color,
                normal,
                index,
            }),
            index_count: mesh.indices.len() as u32,
            vertex_count: mesh.vertices.len() as u32,
            topology: mesh.topology,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_usable(&self) -> bool {
        self.index_count > 0 && self.buffers.is_some()
    }

    pub fn buffers(&self) -> Option<&MeshBuffers> {
        self.buffers.as_ref()
    }

    pub fn has_normals(&self) -> bool {
        self.buffers.as_ref().is_some_and(|b| b.normal.is_some())
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }
}
