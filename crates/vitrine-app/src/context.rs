//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use vitrine_gpu::command::CommandPool;
use vitrine_gpu::{DeviceContext, Presenter, SurfaceContext, FRAMES_IN_FLIGHT};
use winit::window::Window;

/// Application context shared across all app methods.
///
/// Provides access to the device context, window, and presenter, plus
/// the command buffers the framework records into.
pub struct AppContext {
    /// The window handle.
    pub window: Arc<Window>,
    /// Device context with instance, device, and queues.
    pub gpu: DeviceContext,
    /// Surface the device presents to.
    pub surface: SurfaceContext,
    /// Swapchain and frame pacing.
    pub presenter: Presenter,
    /// Command pool the per-slot buffers come from.
    pub(crate) command_pool: CommandPool,
    /// One command buffer per frame slot.
    pub(crate) command_buffers: Vec<vk::CommandBuffer>,
    /// Total frames presented.
    pub frame_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    /// Create a new application context.
    ///
    /// # Safety
    /// The surface must have been created against the given device
    /// context's instance.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        gpu: DeviceContext,
        surface: SurfaceContext,
    ) -> anyhow::Result<Self> {
        // Get window size
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // SAFETY: Caller guarantees the surface belongs to this context
        let presenter = unsafe { Presenter::new(&gpu, &surface, width, height)? };

        tracing::info!(
            "Swapchain created: {}x{} ({} images)",
            presenter.extent().width,
            presenter.extent().height,
            presenter.image_count()
        );

        // Command pool and one resettable buffer per frame slot
        // SAFETY: Device is valid
        let command_pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };
        // SAFETY: Device and command pool are valid
        let command_buffers = unsafe {
            command_pool.allocate_command_buffers(
                gpu.device(),
                vk::CommandBufferLevel::PRIMARY,
                FRAMES_IN_FLIGHT as u32,
            )?
        };

        Ok(Self {
            window,
            gpu,
            surface,
            presenter,
            command_pool,
            command_buffers,
            frame_count: 0,
            last_frame_time: Instant::now(),
        })
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.presenter.extent()
    }

    /// Get the swapchain width.
    pub fn width(&self) -> u32 {
        self.presenter.extent().width
    }

    /// Get the swapchain height.
    pub fn height(&self) -> u32 {
        self.presenter.extent().height
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.presenter.extent();
        extent.width as f32 / extent.height as f32
    }

    /// Get the number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.command_buffers.len()
    }

    /// Cleanup all resources.
    ///
    /// The device context itself is torn down by its `Drop` once this
    /// struct goes away.
    ///
    /// # Safety
    /// The device must be idle and all resources must not be in use.
    pub(crate) unsafe fn cleanup(&mut self) {
        // SAFETY: Caller guarantees the device is idle
        unsafe {
            // Frame slots and swapchain first, then the pool that backs
            // the in-flight command buffers, then the surface
            self.presenter.destroy(&self.gpu);
            self.command_pool.destroy(self.gpu.device());
            self.surface.destroy();
        }
    }
}
