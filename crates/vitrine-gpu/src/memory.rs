//! GPU memory allocation.
//!
//! Wraps `gpu_allocator` for the image allocations the substrate hands
//! out (offscreen targets sized to the swapchain, mostly). The wrapper
//! must be shut down before the device it allocates from is destroyed;
//! [`crate::context::DeviceContext`] enforces that ordering in its Drop.

use crate::error::{GpuError, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

/// An image together with the allocation backing it.
///
/// Freed explicitly through [`GpuAllocator::free_image`]; the allocation
/// slot goes `None` once returned so a double free is a no-op.
pub struct GpuImage {
    pub image: vk::Image,
    pub allocation: Option<Allocation>,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

/// Device memory allocator.
///
/// The inner allocator lives in an `Option` so [`shutdown`] can drop it
/// (returning all device memory) while the device is still alive.
///
/// [`shutdown`]: GpuAllocator::shutdown
pub struct GpuAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl GpuAllocator {
    /// Create an allocator for the device.
    ///
    /// # Safety
    /// The instance, device, and physical device must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let debug_settings = gpu_allocator::AllocatorDebugSettings {
            log_leaks_on_shutdown: true,
            log_memory_information: cfg!(debug_assertions),
            store_stack_traces: cfg!(debug_assertions),
            ..Default::default()
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings,
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    fn allocator(&mut self) -> Result<&mut Allocator> {
        self.allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Allocator already shut down".to_string()))
    }

    /// Create an image and bind fresh memory from `location` to it.
    pub fn create_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuImage> {
        let device = self.device.clone();
        let image = unsafe { device.create_image(create_info, None) }?;
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let allocation = match self.allocator()?.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(GpuError::AllocationFailed(e.to_string()));
            }
        };

        unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }?;

        Ok(GpuImage {
            image,
            allocation: Some(allocation),
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    /// Destroy an image and return its memory to the allocator.
    pub fn free_image(&mut self, image: &mut GpuImage) -> Result<()> {
        if let Some(allocation) = image.allocation.take() {
            self.allocator()?
                .free(allocation)
                .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;
        }

        unsafe { self.device.destroy_image(image.image, None) };
        image.image = vk::Image::null();

        Ok(())
    }

    /// Release the allocator and with it every outstanding allocation.
    ///
    /// Must run before the device is destroyed. Allocations still live
    /// at this point are reported as leaks by `gpu_allocator`.
    pub fn shutdown(&mut self) {
        self.allocator.take();
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
