//! `VitrineApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use vitrine_gpu::Regenerable;
use winit::event::WindowEvent;

/// Trait for Vitrine applications.
///
/// Implement this trait to create a new application on top of the
/// framework. The framework handles window creation, device
/// initialization, swapchain management, frame synchronization, and the
/// event loop.
pub trait VitrineApp: Sized {
    /// Initialize the application.
    ///
    /// Called once when the application starts, after the device context
    /// and window have been created.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before rendering. Use this to update animation
    /// or other time-dependent state.
    ///
    /// # Arguments
    /// * `ctx` - Application context with device and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Render a frame.
    ///
    /// Called every frame after `update()`, with a command buffer that
    /// is already recording. Record rendering commands into it.
    ///
    /// The framework handles:
    /// - Acquiring swapchain images
    /// - Submitting command buffers
    /// - Presenting to the screen
    ///
    /// You are responsible for:
    /// - Recording rendering commands
    /// - Blitting/copying your output to the swapchain image
    /// - Leaving the swapchain image in `PRESENT_SRC_KHR` layout
    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()>;

    /// Size-dependent GPU resources the framework rebuilds alongside
    /// the swapchain.
    ///
    /// Whenever the swapchain is recreated, every returned dependent is
    /// handed the new extent and format. The default has none.
    fn regenerables(&mut self) -> Vec<&mut dyn Regenerable> {
        Vec::new()
    }

    /// Handle window resize.
    ///
    /// Called when the window is resized to a nonzero size. The
    /// framework rebuilds the swapchain at the next frame boundary on
    /// its own; implement [`regenerables`] for GPU resources that must
    /// follow it, and use this hook for application-level state such as
    /// camera aspect ratios.
    ///
    /// Default implementation does nothing.
    ///
    /// [`regenerables`]: VitrineApp::regenerables
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Called for each window event. Return `true` if the event was
    /// handled and should not be processed further.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown.
    ///
    /// Called when the application is about to exit. The device will be
    /// idle when this is called, so it's safe to destroy GPU resources.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
