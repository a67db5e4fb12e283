//! Command pools, recording, and submission.

use crate::error::Result;
use ash::vk;

/// A command pool bound to one queue family.
///
/// The substrate allocates one resettable primary buffer per frame slot
/// from a pool like this; consumers can create their own for transfer
/// or compute work on other families.
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a command pool on `queue_family`.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(
        device: &ash::Device,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let pool = device.create_command_pool(
            &vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(flags),
            None,
        )?;

        Ok(Self { pool, queue_family })
    }

    /// The raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Queue family the pool's buffers submit to.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate `count` command buffers of the given level.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate_command_buffers(
        &self,
        device: &ash::Device,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(level)
            .command_buffer_count(count);

        Ok(device.allocate_command_buffers(&alloc_info)?)
    }

    /// Destroy the pool and every buffer allocated from it.
    ///
    /// # Safety
    /// The device must be valid and no buffer from this pool may be
    /// pending execution.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_command_pool(self.pool, None);
    }
}

/// Put a command buffer into the recording state.
///
/// # Safety
/// The device and command buffer must be valid.
pub unsafe fn begin_command_buffer(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
) -> Result<()> {
    device.begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default().flags(flags))?;
    Ok(())
}

/// Finish recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid and recording.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    device.end_command_buffer(cmd)?;
    Ok(())
}

/// Submit recorded command buffers to a queue.
///
/// Each wait semaphore is paired positionally with a stage in
/// `wait_stages`; `fence` is signaled when the whole submission retires
/// and may be null.
///
/// # Safety
/// All handles must be valid and the buffers fully recorded.
pub unsafe fn submit_command_buffers(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffers: &[vk::CommandBuffer],
    wait_semaphores: &[vk::Semaphore],
    wait_stages: &[vk::PipelineStageFlags],
    signal_semaphores: &[vk::Semaphore],
    fence: vk::Fence,
) -> Result<()> {
    debug_assert_eq!(wait_semaphores.len(), wait_stages.len());

    let submit_info = vk::SubmitInfo::default()
        .command_buffers(command_buffers)
        .wait_semaphores(wait_semaphores)
        .wait_dst_stage_mask(wait_stages)
        .signal_semaphores(signal_semaphores);

    device.queue_submit(queue, &[submit_info], fence)?;
    Ok(())
}
