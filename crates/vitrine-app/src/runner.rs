//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ash::vk;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vitrine_gpu::command::{begin_command_buffer, end_command_buffer};
use vitrine_gpu::DeviceContextBuilder;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::VitrineApp;
use crate::context::AppContext;
use crate::frame::FrameContext;

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Vitrine".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            validation: cfg!(debug_assertions),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

/// Run a `VitrineApp` with the given configuration.
///
/// This function initializes logging, creates the window and device
/// context, and runs the event loop until the application exits.
pub fn run_app<A: VitrineApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: VitrineApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

/// Internal application state.
struct AppState<A: VitrineApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: VitrineApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e}");
                        // A frame that failed between acquire and submit
                        // leaves a pending signal on the slot's acquire
                        // semaphore; recreation replaces the slot
                        // semaphores before the slot runs again
                        state.ctx.presenter.request_recreate();
                    }
                    state.ctx.window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize error: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: VitrineApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        // Create window
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // Create device context against the window's surface
        let (gpu, surface) = DeviceContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build(window.as_ref())?;

        info!("GPU: {}", gpu.info().summary());

        // Create app context
        // SAFETY: The surface was just created from this context's instance
        let mut ctx = unsafe { AppContext::new(window, gpu, surface)? };

        // Initialize the application
        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / fps as u64));

        Ok(AppState {
            ctx,
            app,
            target_frame_time,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }
}

impl<A: VitrineApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        // Calculate delta time
        let now = Instant::now();
        let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
        self.ctx.last_frame_time = now;

        // Update FPS tracking
        if dt > 0.0 {
            let fps = 1.0 / dt as f64;
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }

        // Update the application
        self.app.update(&self.ctx, dt);

        let size = self.ctx.window.inner_size();

        // Begin the frame. A skipped frame (minimized window, stale
        // surface at acquire) keeps its slot and tries again on the
        // next redraw.
        let frame = {
            let mut dependents = self.app.regenerables();
            // SAFETY: Context and surface are valid
            unsafe {
                self.ctx.presenter.begin_frame(
                    &self.ctx.gpu,
                    &self.ctx.surface,
                    size.width,
                    size.height,
                    &mut dependents,
                )?
            }
        };

        let Some(frame) = frame else {
            return Ok(());
        };

        // Record: the slot's fence has retired, so its buffer is free
        let cmd = self.ctx.command_buffers[frame.slot()];
        {
            let device = self.ctx.gpu.device();
            // SAFETY: Device and command buffer are valid and not in use
            unsafe {
                device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
                begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
            }
        }

        let mut frame_ctx = FrameContext {
            command_buffer: cmd,
            image_index: frame.image_index(),
            swapchain_image: frame.image(),
            swapchain_view: frame.view(),
            extent: self.ctx.presenter.extent(),
            dt,
            frame_number: self.ctx.frame_count,
            slot: frame.slot(),
        };

        // Render the frame
        self.app.render(&self.ctx, &mut frame_ctx)?;

        // SAFETY: Recording began above and the app has finished
        unsafe {
            end_command_buffer(self.ctx.gpu.device(), cmd)?;
        }

        // Submit and present
        {
            let mut dependents = self.app.regenerables();
            // SAFETY: The command buffer is fully recorded and the frame
            // comes from this frame's begin call
            unsafe {
                self.ctx.presenter.submit_and_present(
                    &self.ctx.gpu,
                    &self.ctx.surface,
                    frame,
                    cmd,
                    size.width,
                    size.height,
                    &mut dependents,
                )?;
            }
        }

        self.ctx.frame_count += 1;

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        // The swapchain rebuild happens at the next frame boundary,
        // when no slot is mid-recording
        self.ctx.presenter.request_recreate();

        if width == 0 || height == 0 {
            // Minimized; frames skip until the window has size again
            return Ok(());
        }

        // Notify the application
        self.app.on_resize(&mut self.ctx, width, height)?;

        info!("Resized to {}x{}", width, height);
        Ok(())
    }

    fn cleanup(&mut self) {
        // Print FPS statistics
        if self.ctx.frame_count > 0 {
            let avg_fps = self.fps_sum / self.ctx.frame_count as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_count);
        }

        info!("Starting cleanup...");
        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        // Let the app cleanup first
        self.app.cleanup(&mut self.ctx);

        // Then cleanup context resources
        // SAFETY: The device is idle
        unsafe {
            self.ctx.cleanup();
        }

        info!("Cleanup complete");
    }
}
