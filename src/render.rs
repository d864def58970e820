//! Frame rendering.
//!
//! A frame is a single forward pass: clear colour and depth, then one indexed
//! draw per bound node in [`DrawOrder`]. Each draw gets its own uniform values,
//! written by name so programs only receive what they declare.

use cgmath::{InnerSpace, Matrix, Matrix4, SquareMatrix, Vector3};

use crate::{
    context::{Context, DeviceContext},
    data_structures::{
        scene_graph::{DrawOrder, SceneGraph},
        texture::Texture,
    },
    resources::shader::UniformBlock,
};

/// Scale of the node colour used as ambient term.
pub const AMBIENT_FACTOR: f32 = 0.2;
pub const SPECULAR: Vector3<f32> = Vector3::new(0.6, 0.6, 0.6);
pub const SHININESS: f32 = 32.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub clear_colour: wgpu::Color,
    pub draw_order: DrawOrder,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.2,
                a: 1.0,
            },
            draw_order: DrawOrder::default(),
        }
    }
}

/// Uniform values of one draw, named as the built-in programs declare them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawUniforms {
    pub mvp: Matrix4<f32>,
    pub model_view: Matrix4<f32>,
    pub normal_matrix: Matrix4<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub shininess: f32,
    pub light_dir: Vector3<f32>,
}

impl DrawUniforms {
    /// Writes every value the block declares. Returns how many were written.
    pub fn apply(&self, block: &mut UniformBlock) -> usize {
        [
            block.set_uniform("mvp", self.mvp),
            block.set_uniform("model_view", self.model_view),
            block.set_uniform("normal_matrix", self.normal_matrix),
            block.set_uniform("ambient", self.ambient),
            block.set_uniform("diffuse", self.diffuse),
            block.set_uniform("specular", self.specular),
            block.set_uniform("shininess", self.shininess),
            block.set_uniform("light_dir", self.light_dir),
        ]
        .into_iter()
        .filter(|written| *written)
        .count()
    }
}

pub fn draw_uniforms(
    model: Matrix4<f32>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    color: Vector3<f32>,
    light_dir: Vector3<f32>,
) -> DrawUniforms {
    let model_view = view * model;
    // singular for zero scales, lighting is meaningless there anyway
    let normal_matrix = model_view
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(model_view);
    DrawUniforms {
        mvp: projection * model_view,
        model_view,
        normal_matrix,
        ambient: color * AMBIENT_FACTOR,
        diffuse: color,
        specular: SPECULAR,
        shininess: SHININESS,
        light_dir: if light_dir.magnitude2() > 0.0 {
            light_dir.normalize()
        } else {
            light_dir
        },
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
    pub settings: RenderSettings,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /**
     * Records one pass that clears both targets and draws every bound node.
     *
     * Uniforms are uploaded with the queue before the pass is recorded, so the
     * encoder has to be submitted before the next call. Returns the number of draws.
     */
    pub fn encode(
        &self,
        gpu: &DeviceContext,
        graph: &SceneGraph,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) -> usize {
        let view = graph.camera.view_matrix();
        let projection = graph.camera.projection();
        let light_dir = graph.light_direction_in_view(&view);

        let draws = graph.draw_list(self.settings.draw_order);
        let mut bindings = Vec::with_capacity(draws.len());
        for visit in &draws {
            let Some(binding) = visit.node.binding() else {
                continue;
            };
            let mut uniforms = binding.new_uniforms();
            draw_uniforms(visit.model, view, projection, visit.node.color, light_dir).apply(&mut uniforms);
            binding.write_uniforms(&gpu.queue, &uniforms);
            bindings.push(binding);
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.settings.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });
        for binding in &bindings {
            binding.draw(&mut render_pass);
        }
        log::trace!("Recorded {} draws", bindings.len());
        bindings.len()
    }

    /// Renders a frame into the window surface and presents it.
    pub fn render_to_surface(&self, ctx: &Context, graph: &SceneGraph) -> Result<usize, wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = ctx
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let draws = self.encode(&ctx.gpu, graph, &mut encoder, &view, &ctx.depth_texture.view);
        ctx.gpu.queue.submit(std::iter::once(encoder.finish()));
        ctx.window.pre_present_notify();
        output.present();
        Ok(draws)
    }

    /// Renders a frame into a new colour target of `size` pixels.
    pub fn render_offscreen(&self, gpu: &DeviceContext, graph: &SceneGraph, size: [u32; 2]) -> (Texture, usize) {
        let target = Texture::create_color_target(&gpu.device, size, gpu.color_format, "offscreen_target");
        let depth = Texture::create_depth_texture(&gpu.device, size, "offscreen_depth");
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Encoder"),
            });
        let draws = self.encode(gpu, graph, &mut encoder, &target.view, &depth.view);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        (target, draws)
    }
}
