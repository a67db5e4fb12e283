//! Offscreen render target.

use ash::vk;
use gpu_allocator::MemoryLocation;
use vitrine_gpu::memory::GpuImage;
use vitrine_gpu::{DeviceContext, Regenerable, Result};

/// Offscreen image the viewer composes each frame before blitting it to
/// the swapchain. Tracks the swapchain's extent and format across
/// recreations.
pub struct OffscreenTarget {
    image: GpuImage,
    extent: vk::Extent2D,
}

impl OffscreenTarget {
    /// Allocate the target at the given extent and format.
    pub fn new(gpu: &DeviceContext, extent: vk::Extent2D, format: vk::Format) -> Result<Self> {
        let image = gpu.allocator().lock().create_image(
            &image_info(extent, format),
            MemoryLocation::GpuOnly,
            "viewer offscreen target",
        )?;

        Ok(Self { image, extent })
    }

    /// The image handle.
    pub fn image(&self) -> vk::Image {
        self.image.image
    }

    /// Extent the target was allocated at.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Free the image. The device must be idle.
    pub fn destroy(&mut self, gpu: &DeviceContext) -> Result<()> {
        gpu.allocator().lock().free_image(&mut self.image)
    }
}

impl Regenerable for OffscreenTarget {
    fn regenerate(
        &mut self,
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<()> {
        let mut allocator = ctx.allocator().lock();
        allocator.free_image(&mut self.image)?;
        self.image = allocator.create_image(
            &image_info(extent, format),
            MemoryLocation::GpuOnly,
            "viewer offscreen target",
        )?;
        self.extent = extent;

        Ok(())
    }
}

fn image_info(extent: vk::Extent2D, format: vk::Format) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}
