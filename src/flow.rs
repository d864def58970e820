//! Flow control and application event loop.
//!
//! A "flow" owns the behaviour of a scene: it builds the [`SceneGraph`] once the
//! GPU is ready, reacts to window input and animates nodes every frame. The
//! event loop owns the window, the GPU context, the scene and the renderer.
//!
//! # Lifecycle Flow
//!
//! 1. `resumed` opens the window and the GPU context, then calls `on_init`
//! 2. Window events are forwarded to `on_window_events`
//! 3. On every redraw `on_update` runs, then the scene is rendered and presented
//! 4. A new redraw is requested right away

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::scene_graph::SceneGraph,
    render::{RenderSettings, Renderer},
};

/// Trait for implementing an animated scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the GPU is ready; create meshes, shaders and nodes here
/// 2. `on_window_events()` is called for each winit window event
/// 3. `on_update()` is called every frame before rendering
pub trait SceneFlow {
    /// Populate the scene. An error aborts the application.
    fn on_init(&mut self, ctx: &mut Context, scene: &mut SceneGraph) -> anyhow::Result<()>;

    /// Advance the animation. `elapsed` is the time since `on_init`, `dt` since the last frame.
    fn on_update(&mut self, ctx: &Context, scene: &mut SceneGraph, elapsed: Duration, dt: Duration);

    fn on_window_events(&mut self, _ctx: &mut Context, _scene: &mut SceneGraph, _event: &WindowEvent) {}

    /// Frame settings, read once after `on_init`.
    fn render_settings(&self) -> RenderSettings {
        RenderSettings::default()
    }
}

struct AppState {
    ctx: Context,
    scene: SceneGraph,
    renderer: Renderer,
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.scene.camera.resize(width, height);
        }
    }
}

struct App {
    title: String,
    flow: Box<dyn SceneFlow>,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
    start_time: Instant,
    last_time: Instant,
}

impl App {
    fn new(flow: Box<dyn SceneFlow>, title: &str) -> Self {
        Self {
            title: title.to_string(),
            flow,
            state: None,
            error: None,
            start_time: Instant::now(),
            last_time: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attributes = Window::default_attributes().with_title(self.title.clone());
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let mut ctx = futures::executor::block_on(Context::new(window))?;

        let mut scene = SceneGraph::default();
        let size = ctx.window().inner_size();
        scene.camera.resize(size.width, size.height);
        self.flow.on_init(&mut ctx, &mut scene)?;
        let renderer = Renderer::new(self.flow.render_settings());

        self.start_time = Instant::now();
        self.last_time = self.start_time;
        ctx.window().request_redraw();
        Ok(AppState { ctx, scene, renderer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        self.flow
            .on_window_events(&mut state.ctx, &mut state.scene, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                let elapsed = self.start_time.elapsed();

                self.flow
                    .on_update(&state.ctx, &mut state.scene, elapsed, dt);

                match state.renderer.render_to_surface(&state.ctx, &state.scene) {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window().inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("Surface timed out, skipping frame.");
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                        event_loop.exit();
                        return;
                    }
                }
                state.ctx.window().request_redraw();
            }
            _ => {}
        }
    }
}

/// Opens a window titled `title` and drives `flow` until the window is closed.
pub fn run(flow: impl SceneFlow + 'static, title: &str) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(Box::new(flow), title);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
