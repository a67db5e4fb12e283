//! Vulkan presentation substrate for Vitrine.
//!
//! This crate owns everything between "a window exists" and "a correctly
//! synchronized image reached the screen":
//! - Vulkan instance and logical device management
//! - Physical device selection against a presentation surface
//! - Swapchain negotiation, creation, and recreation
//! - Frame pacing with a fixed ring of frames in flight
//! - Memory allocation via gpu-allocator
//! - Command buffer management

pub mod barrier;
pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod memory;
pub mod regen;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{DeviceContext, DeviceContextBuilder};
pub use device::{GpuInfo, GpuVendor, QueueFamilyIndices, SelectedDevice};
pub use error::{GpuError, Result};
pub use frame::{AcquiredFrame, Presenter, FRAMES_IN_FLIGHT};
pub use memory::{GpuAllocator, GpuImage};
pub use regen::Regenerable;
pub use surface::SurfaceContext;
pub use swapchain::{ImageAcquire, Swapchain, SwapchainSupport};
pub use sync::{create_fence, create_semaphore, FrameSlot};
