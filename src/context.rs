//! GPU and window context.
//!
//! [`DeviceContext`] bundles what resource creation needs (device, queue, the
//! colour target format) and can be created headless. [`Context`] adds the
//! window surface and depth buffer on top of it.

use std::sync::Arc;

use winit::window::Window;

use crate::data_structures::texture;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("could not create a surface for the window: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("could not open the GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("the surface reports no supported texture formats")]
    NoSurfaceFormat,
}

/// Colour target format used when no surface dictates one.
pub const HEADLESS_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
pub struct DeviceContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub color_format: wgpu::TextureFormat,
    features: wgpu::Features,
    wireframe: bool,
}

impl DeviceContext {
    /// Opens a device that renders into offscreen textures of [`HEADLESS_COLOR_FORMAT`].
    pub async fn headless() -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        Self::from_adapter(&adapter, HEADLESS_COLOR_FORMAT).await
    }

    pub(crate) async fn from_adapter(
        adapter: &wgpu::Adapter,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, ContextError> {
        // Line rasterization is optional, everything else runs on default limits.
        let features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orrery device"),
                required_features: features,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;
        log::debug!(
            "Opened device on {:?} (wireframe support: {})",
            adapter.get_info().backend,
            features.contains(wgpu::Features::POLYGON_MODE_LINE)
        );
        Ok(Self {
            device,
            queue,
            color_format,
            features,
            wireframe: false,
        })
    }

    pub fn supports_wireframe(&self) -> bool {
        self.features.contains(wgpu::Features::POLYGON_MODE_LINE)
    }

    /// Bindings created after this call rasterize triangles as outlines.
    pub fn set_wireframe(&mut self, enabled: bool) {
        if enabled && !self.supports_wireframe() {
            log::warn!("The adapter cannot rasterize polygons as lines, keeping filled polygons.");
            self.wireframe = false;
            return;
        }
        self.wireframe = enabled;
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn polygon_mode(&self) -> wgpu::PolygonMode {
        if self.wireframe {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub gpu: DeviceContext,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> Result<Self, ContextError> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Vertex colours are authored in sRGB, prefer a surface that converts for us.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(ContextError::NoSurfaceFormat)?;

        let gpu = DeviceContext::from_adapter(&adapter, surface_format).await?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&gpu.device, &config);

        let depth_texture = texture::Texture::create_depth_texture(
            &gpu.device,
            [config.width, config.height],
            "depth_texture",
        );

        Ok(Self {
            window,
            depth_texture,
            surface,
            config,
            gpu,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures surface and depth buffer. Returns false for a zero-sized window.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.gpu.device, &self.config);
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.gpu.device, [width, height], "depth_texture");
        true
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }
}
