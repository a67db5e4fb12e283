//! Regeneration hook for swapchain-derived resources.

use crate::context::DeviceContext;
use crate::error::Result;
use ash::vk;

/// A resource derived from the swapchain.
///
/// Anything sized to the swapchain extent or encoding its surface format
/// (offscreen targets, pipelines baking the color format, cached render
/// areas) implements this and is rebuilt through it after the swapchain
/// is replaced, instead of being re-wired by hand at every call site.
pub trait Regenerable {
    /// Rebuild against the new extent and surface format.
    ///
    /// Called after swapchain recreation, with the device idle.
    fn regenerate(
        &mut self,
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<()>;
}
