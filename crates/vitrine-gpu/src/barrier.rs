//! Image layout transition helpers.
//!
//! Thin wrappers over `synchronization2` image barriers for the common
//! single-mip, single-layer color images this crate deals in.

use ash::vk;

/// Full subresource range of a single-mip, single-layer color image.
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Build a layout transition barrier for a color image.
#[allow(clippy::too_many_arguments)]
pub fn image_barrier(
    image: vk::Image,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    old_layout: vk::ImageLayout,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
    new_layout: vk::ImageLayout,
) -> vk::ImageMemoryBarrier2<'static> {
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .old_layout(old_layout)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
        .new_layout(new_layout)
        .image(image)
        .subresource_range(color_subresource_range())
}

/// Record a batch of image barriers in one dependency.
///
/// # Safety
/// The device and command buffer must be valid and the buffer must be
/// in the recording state.
pub unsafe fn pipeline_barriers(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    barriers: &[vk::ImageMemoryBarrier2],
) {
    let dependency_info = vk::DependencyInfo::default().image_memory_barriers(barriers);
    device.cmd_pipeline_barrier2(cmd, &dependency_info);
}
