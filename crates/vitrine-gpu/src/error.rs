//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Only unrecoverable conditions surface here. A stale swapchain
/// (`ERROR_OUT_OF_DATE_KHR` or a suboptimal surface) is reported through
/// the return values of acquire and present instead, since the caller is
/// expected to recreate and continue.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan library could not be loaded.
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// No physical device satisfies the presentation requirements.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Required device extension not supported.
    #[error("Required device extensions not supported: {0}")]
    ExtensionNotSupported(String),

    /// The surface reports no usable formats or present modes.
    #[error("Surface reports no compatible formats or present modes")]
    InadequateSurface,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
