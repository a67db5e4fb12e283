//! Device context management.

use crate::device::{select_physical_device, GpuInfo, QueueFamilyIndices, SelectedDevice};
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

/// Main device context holding the instance, logical device, and queues.
///
/// Owns no swapchain or surface; those are destroyed by their own owners
/// before this drops. Not `Clone`: exactly one owner drives destruction.
pub struct DeviceContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) info: GpuInfo,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) graphics_queue_family: u32,
    pub(crate) present_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl DeviceContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the selected device's identity.
    pub fn info(&self) -> &GpuInfo {
        &self.info
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    ///
    /// May be the same handle as the graphics queue when both roles
    /// resolved to one family.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the present queue family index.
    pub fn present_queue_family(&self) -> u32 {
        self.present_queue_family
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Shutdown allocator BEFORE destroying device
            // This frees all VkDeviceMemory allocations
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a device context.
pub struct DeviceContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Vitrine".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl DeviceContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the device context and the surface it was selected against.
    ///
    /// Device selection runs against the window's surface, so the surface
    /// is created mid-build and returned alongside the context. The caller
    /// must destroy the surface before dropping the context.
    pub fn build<W>(self, window: &W) -> Result<(DeviceContext, SurfaceContext)>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }?;

        // Create Vulkan instance
        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        // The surface must exist before selection can probe against it
        let surface = unsafe { SurfaceContext::from_window(&entry, &instance, window) }?;

        // Pick the first suitable physical device
        let extensions = required_device_extensions();
        let selected = unsafe {
            select_physical_device(
                &instance,
                &surface.surface_loader,
                surface.surface,
                &extensions,
            )
        }?;

        // Create logical device
        let (device, graphics_queue, present_queue) =
            unsafe { create_device(&instance, &selected)? };

        let device = Arc::new(device);

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        // Create GPU allocator
        let allocator =
            unsafe { GpuAllocator::new(&instance, device.clone(), selected.physical_device) }?;

        let context = DeviceContext {
            entry,
            instance,
            physical_device: selected.physical_device,
            device,
            swapchain_loader,
            info: selected.info,
            allocator: Mutex::new(allocator),
            graphics_queue_family: selected.graphics_family,
            present_queue_family: selected.present_family,
            graphics_queue,
            present_queue,
        };

        Ok((context, surface))
    }
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and selected device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    // One queue create info per distinct family
    let families = QueueFamilyIndices {
        graphics: Some(selected.graphics_family),
        present: Some(selected.present_family),
    };

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    // Verify the extensions about to be enabled before asking the driver
    let mut extensions = required_device_extensions();
    let missing = selected.info.missing_extensions(&extensions);
    if !missing.is_empty() {
        return Err(GpuError::ExtensionNotSupported(missing.join(", ")));
    }

    // Portability implementations (MoltenVK) must opt in explicitly
    if selected
        .info
        .available_extensions
        .contains("VK_KHR_portability_subset")
    {
        extensions.push(ash::khr::portability_subset::NAME);
    }

    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Enable the Vulkan 1.3 features the frame loop relies on
    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    let mut features2 =
        vk::PhysicalDeviceFeatures2::default().push_next(&mut vulkan_1_3_features);

    // Create the device
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = instance
        .create_device(selected.physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    // Get queue handles
    let graphics_queue = device.get_device_queue(selected.graphics_family, 0);
    let present_queue = device.get_device_queue(selected.present_family, 0);

    Ok((device, graphics_queue, present_queue))
}
