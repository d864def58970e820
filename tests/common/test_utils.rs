use orrery::{
    context::DeviceContext,
    data_structures::texture::Texture,
    resources::shader::ShaderRegistry,
};

/// Offscreen frame size. 64 RGBA8 pixels fill exactly one 256 byte copy row.
pub(crate) const FRAME: [u32; 2] = [64, 64];

pub(crate) fn headless() -> DeviceContext {
    futures::executor::block_on(DeviceContext::headless())
        .expect("Failed to open a headless GPU device for integration test.")
}

pub(crate) fn builtin_shaders(gpu: &DeviceContext) -> ShaderRegistry {
    ShaderRegistry::with_builtin(gpu).expect("Built-in shaders have to compile.")
}

/// Row-major RGBA8 pixels of an offscreen target of [`FRAME`] size.
pub(crate) fn read_pixels(gpu: &DeviceContext, target: &Texture) -> Vec<[u8; 4]> {
    let [width, height] = FRAME;
    let u32_size = std::mem::size_of::<u32>() as u32;
    let output_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        size: (u32_size * width * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        label: Some("test readback buffer"),
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(u32_size * width),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    // the mapping has to be requested before polling, otherwise the wait never ends
    let buffer_slice = output_buffer.slice(..);
    let (tx, rx) = futures::channel::oneshot::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .unwrap();
    futures::executor::block_on(rx).unwrap().unwrap();

    let data = buffer_slice.get_mapped_range();
    let pixels = data
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect();
    drop(data);
    output_buffer.unmap();
    pixels
}

pub(crate) fn pixel(pixels: &[[u8; 4]], x: u32, y: u32) -> [u8; 4] {
    pixels[(y * FRAME[0] + x) as usize]
}

pub(crate) fn center(pixels: &[[u8; 4]]) -> [u8; 4] {
    pixel(pixels, FRAME[0] / 2, FRAME[1] / 2)
}
