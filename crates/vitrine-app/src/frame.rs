//! Per-frame context for rendering.

use ash::vk;

/// Context for the current frame being rendered.
///
/// Provides access to the command buffer and swapchain image for this
/// frame. The command buffer is already recording when the app sees it.
pub struct FrameContext {
    /// Command buffer for recording rendering commands.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// The swapchain image for this frame.
    pub swapchain_image: vk::Image,
    /// View over the swapchain image.
    pub swapchain_view: vk::ImageView,
    /// Current swapchain extent.
    pub extent: vk::Extent2D,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Current frame number.
    pub frame_number: u64,
    /// Frame slot this frame runs in, for indexing per-slot resources.
    pub slot: usize,
}
