//! Winit-based Application Shell
//!
//! Opens a window, creates a [`WgpuBackend`] and a [`Compositor`] for it,
//! and drives one frame per redraw.
//!
//! - [`App`]: builder for configuring and launching the application
//! - [`AppHandler`]: trait implemented by the application to build its scene
//!   and react to events
//! - [`AppState`]: scene, camera and compositor handed to the handler
//!
//! # Default controls
//!
//! | Key           | Action                                   |
//! |---------------|------------------------------------------|
//! | `B`           | toggle blur                              |
//! | `Up` / `Down` | blur intensity ± 0.1                     |
//! | `1` `2` `3`   | blur-only / masked focus / additive focus |
//! | `Esc`         | quit                                     |
//!
//! # Example
//!
//! ```rust,ignore
//! use myth_postfx::app::winit::{App, AppHandler, AppState};
//!
//! struct Viewer;
//!
//! impl AppHandler for Viewer {
//!     fn init(state: &mut AppState, _window: &Arc<Window>) -> Self {
//!         state.scene.add(SceneObject::new("box", Arc::new(Mesh::cuboid(Vec3::ONE))));
//!         Viewer
//!     }
//! }
//!
//! fn main() -> myth_postfx::errors::Result<()> {
//!     App::new().with_title("Viewer").run::<Viewer>()
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
pub use winit::window::{Window, WindowId};

use crate::errors::{PostFxError, Result};
use crate::renderer::{Compositor, WgpuBackend};
use crate::scene::{Camera, Scene};
use crate::settings::{CompositorSettings, PipelineVariant};

/// Blur intensity change per key press.
const INTENSITY_STEP: f32 = 0.1;

/// Timing of the current frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    /// Seconds since start.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
    pub frame_count: u64,
}

/// Everything a handler may touch.
pub struct AppState {
    pub scene: Scene,
    pub camera: Camera,
    pub compositor: Compositor<WgpuBackend>,
}

/// Application behavior.
///
/// # Lifecycle
///
/// 1. [`init`](Self::init): once, after the window and compositor exist
/// 2. [`on_event`](Self::on_event): for each window event
/// 3. [`update`](Self::update): once per frame, before rendering
pub trait AppHandler: Sized + 'static {
    fn init(state: &mut AppState, window: &Arc<Window>) -> Self;

    /// Return `true` to suppress the default handling of `event`.
    #[allow(unused_variables)]
    fn on_event(&mut self, state: &mut AppState, window: &Arc<Window>, event: &WindowEvent) -> bool {
        false
    }

    #[allow(unused_variables)]
    fn update(&mut self, state: &mut AppState, window: &Arc<Window>, frame: &FrameState) {}
}

/// Application builder.
pub struct App {
    title: String,
    settings: CompositorSettings,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: "Myth PostFX".into(),
            settings: CompositorSettings::default(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CompositorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs the event loop until the window closes.
    pub fn run<H: AppHandler>(self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut runner = AppRunner::<H>::new(self.title, self.settings);
        event_loop.run_app(&mut runner).map_err(PostFxError::from)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

struct AppRunner<H: AppHandler> {
    title: String,
    settings: CompositorSettings,

    window: Option<Arc<Window>>,
    state: Option<AppState>,
    handler: Option<H>,

    start_time: Instant,
    last_loop_time: Instant,
    frame_count: u64,
}

impl<H: AppHandler> AppRunner<H> {
    fn new(title: String, settings: CompositorSettings) -> Self {
        let now = Instant::now();
        Self {
            title,
            settings,
            window: None,
            state: None,
            handler: None,
            start_time: now,
            last_loop_time: now,
            frame_count: 0,
        }
    }

    fn create_state(&self, window: &Arc<Window>) -> Result<AppState> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let backend = WgpuBackend::new(window.clone(), &self.settings, width, height)?;
        let compositor = Compositor::new(backend, self.settings.clone(), width, height)?;
        let camera = Camera::new_perspective(75.0, width as f32 / height as f32, 0.1, 10_000.0)
            .with_position(Vec3::new(0.0, 1.0, 5.0));

        Ok(AppState {
            scene: Scene::new(),
            camera,
            compositor,
        })
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let frame = FrameState {
            time: now.duration_since(self.start_time).as_secs_f32(),
            dt: now.duration_since(self.last_loop_time).as_secs_f32(),
            frame_count: self.frame_count,
        };
        self.last_loop_time = now;

        let (Some(window), Some(state), Some(handler)) =
            (&self.window, &mut self.state, &mut self.handler)
        else {
            return;
        };

        handler.update(state, window, &frame);
        state.scene.poll_assets();

        match state.compositor.render_frame(&state.scene, &state.camera) {
            Ok(report) => {
                if report.resize_failed {
                    log::debug!("Frame {} kept the previous target size", report.frame_index);
                }
            }
            Err(PostFxError::SurfaceUnavailable(reason)) => {
                log::debug!("Skipped frame: {reason}");
            }
            Err(e) => log::error!("Render error: {e}"),
        }
        self.frame_count += 1;
    }
}

/// Built-in key bindings. Returns `true` if the key was handled.
fn handle_key(state: &mut AppState, event_loop: &ActiveEventLoop, key: &KeyEvent) -> bool {
    if key.state != ElementState::Pressed || key.repeat {
        return false;
    }
    let PhysicalKey::Code(code) = key.physical_key else {
        return false;
    };

    let compositor = &mut state.compositor;
    match code {
        KeyCode::KeyB => {
            compositor.toggle_blur();
        }
        KeyCode::ArrowUp | KeyCode::ArrowDown => {
            let step = if code == KeyCode::ArrowUp {
                INTENSITY_STEP
            } else {
                -INTENSITY_STEP
            };
            let intensity = compositor.settings().blur.intensity + step;
            compositor.set_blur_intensity(intensity);
            log::info!(
                "Blur intensity {:.1}",
                compositor.settings().blur.intensity
            );
        }
        KeyCode::Digit1 => compositor.set_variant(PipelineVariant::BlurOnly),
        KeyCode::Digit2 => compositor.set_variant(PipelineVariant::MaskedFocus),
        KeyCode::Digit3 => compositor.set_variant(PipelineVariant::AdditiveFocus),
        KeyCode::Escape => event_loop.exit(),
        _ => return false,
    }
    true
}

impl<H: AppHandler> ApplicationHandler for AppRunner<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        log::info!("Initializing compositor...");
        let mut state = match self.create_state(&window) {
            Ok(state) => state,
            Err(e) => {
                log::error!("Fatal renderer error: {e}");
                event_loop.exit();
                return;
            }
        };

        self.handler = Some(H::init(&mut state, &window));
        self.state = Some(state);
        self.window = Some(window);

        let now = Instant::now();
        self.start_time = now;
        self.last_loop_time = now;
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(state), Some(handler)) =
            (&self.window, &mut self.state, &mut self.handler)
        else {
            return;
        };

        if handler.on_event(state, window, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                state.compositor.request_resize(size.width, size.height);
                state.camera.set_viewport(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                handle_key(state, event_loop, &event);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
