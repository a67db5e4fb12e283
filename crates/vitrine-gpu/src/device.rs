//! Physical device selection and queue family resolution.

use crate::error::{GpuError, Result};
use crate::swapchain::SwapchainSupport;
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// Queue family indices resolved against a presentation surface.
///
/// Each role is resolved independently to the first family that supports
/// it, in family enumeration order. The graphics and present roles may
/// land on the same family or on different ones; on most hardware they
/// coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    /// First family with `GRAPHICS` support.
    pub graphics: Option<u32>,
    /// First family that can present to the surface.
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both roles resolved.
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Distinct resolved family indices, first occurrence order.
    pub fn unique(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        [self.graphics, self.present]
            .into_iter()
            .flatten()
            .filter(|family| seen.insert(*family))
            .collect()
    }
}

/// Resolve queue family roles from enumerated family properties.
///
/// `present_support` answers whether a family index can present to the
/// target surface. Resolution stops as soon as both roles are filled.
pub(crate) fn resolve_from_properties(
    families: &[vk::QueueFamilyProperties],
    mut present_support: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && present_support(index)? {
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Resolve queue families for a device and surface.
///
/// # Safety
/// The instance, physical device, and surface must be valid.
pub unsafe fn resolve_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);

    resolve_from_properties(&families, |index| {
        let supported = surface_loader.get_physical_device_surface_support(
            physical_device,
            index,
            surface,
        )?;
        Ok(supported)
    })
}

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Identity and extension inventory of a physical device.
#[derive(Debug, Clone)]
pub struct GpuInfo {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Device type (discrete, integrated, ...)
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Available device extension names
    pub available_extensions: HashSet<String>,
}

impl GpuInfo {
    /// Query device identity from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .unwrap_or_default();

        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| {
                CStr::from_ptr(ext.extension_name.as_ptr())
                    .to_str()
                    .ok()
                    .map(String::from)
            })
            .collect();

        let vendor = GpuVendor::from_vendor_id(properties.vendor_id);
        let device_name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        Self {
            vendor,
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            available_extensions,
        }
    }

    /// Whether the device advertises Vulkan 1.3 or newer.
    pub fn supports_vulkan_1_3(&self) -> bool {
        let major = vk::api_version_major(self.api_version);
        let minor = vk::api_version_minor(self.api_version);
        major > 1 || (major == 1 && minor >= 3)
    }

    /// Names from `required` that this device does not advertise.
    pub fn missing_extensions(&self, required: &[&CStr]) -> Vec<String> {
        required
            .iter()
            .filter_map(|ext| ext.to_str().ok())
            .filter(|name| !self.available_extensions.contains(*name))
            .map(String::from)
            .collect()
    }

    /// Get a human-readable device summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{}",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

/// A physical device that passed selection, with its resolved families.
pub struct SelectedDevice {
    /// The chosen physical device.
    pub physical_device: vk::PhysicalDevice,
    /// Resolved graphics queue family.
    pub graphics_family: u32,
    /// Resolved present queue family.
    pub present_family: u32,
    /// Device identity.
    pub info: GpuInfo,
}

/// Select the first physical device that can drive the surface.
///
/// Candidates are checked in enumeration order and the first one passing
/// every requirement wins, so the choice is deterministic for a fixed
/// device list. A device qualifies when it reports Vulkan 1.3, resolves
/// both queue family roles, advertises every required extension, and the
/// surface reports at least one format and one present mode for it.
///
/// # Safety
/// The instance, surface loader, and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> Result<SelectedDevice> {
    let devices = instance.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    for physical_device in devices {
        let info = GpuInfo::query(instance, physical_device);

        if !info.supports_vulkan_1_3() {
            tracing::debug!("Skipping {}: no Vulkan 1.3 support", info.device_name);
            continue;
        }

        let missing = info.missing_extensions(required_extensions);
        if !missing.is_empty() {
            tracing::debug!(
                "Skipping {}: missing extensions {}",
                info.device_name,
                missing.join(", ")
            );
            continue;
        }

        let indices =
            resolve_queue_families(instance, surface_loader, physical_device, surface)?;
        let (Some(graphics_family), Some(present_family)) = (indices.graphics, indices.present)
        else {
            tracing::debug!("Skipping {}: incomplete queue families", info.device_name);
            continue;
        };

        let support = SwapchainSupport::query(surface_loader, physical_device, surface)?;
        if !support.is_adequate() {
            tracing::debug!("Skipping {}: inadequate surface support", info.device_name);
            continue;
        }

        tracing::info!("Selected GPU: {}", info.summary());

        return Ok(SelectedDevice {
            physical_device,
            graphics_family,
            present_family,
            info,
        });
    }

    Err(GpuError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn incomplete_without_both_roles() {
        let none = QueueFamilyIndices::default();
        assert!(!none.is_complete());

        let graphics_only = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };
        assert!(!graphics_only.is_complete());

        let both = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(1),
        };
        assert!(both.is_complete());
    }

    #[test]
    fn unique_deduplicates_shared_family() {
        let shared = QueueFamilyIndices {
            graphics: Some(2),
            present: Some(2),
        };
        assert_eq!(shared.unique(), vec![2]);

        let split = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(3),
        };
        assert_eq!(split.unique(), vec![0, 3]);
    }

    #[test]
    fn resolution_takes_first_match_per_role() {
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];

        let indices = resolve_from_properties(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn resolution_finds_late_present_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];

        let indices = resolve_from_properties(&families, |index| Ok(index == 2)).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(2));
    }

    #[test]
    fn resolution_without_graphics_stays_incomplete() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)];

        let indices = resolve_from_properties(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics, None);
        assert_eq!(indices.present, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    fn info_with(api_version: u32, extensions: &[&str]) -> GpuInfo {
        GpuInfo {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version,
            available_extensions: extensions.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn vulkan_1_3_version_gate() {
        assert!(info_with(vk::make_api_version(0, 1, 3, 0), &[]).supports_vulkan_1_3());
        assert!(info_with(vk::make_api_version(0, 1, 4, 250), &[]).supports_vulkan_1_3());
        assert!(!info_with(vk::make_api_version(0, 1, 2, 189), &[]).supports_vulkan_1_3());
    }

    #[test]
    fn missing_extensions_reports_only_absent_names() {
        let info = info_with(
            vk::make_api_version(0, 1, 3, 0),
            &["VK_KHR_swapchain", "VK_KHR_maintenance1"],
        );

        assert!(info.missing_extensions(&[ash::khr::swapchain::NAME]).is_empty());

        let missing = info.missing_extensions(&[
            ash::khr::swapchain::NAME,
            c"VK_KHR_imaginary_extension",
        ]);
        assert_eq!(missing, vec!["VK_KHR_imaginary_extension".to_string()]);
    }
}
