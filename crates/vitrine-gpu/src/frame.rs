//! Frame pacing and presentation.
//!
//! The [`Presenter`] owns the swapchain and drives the per-frame
//! protocol: wait out the current slot's fence, acquire an image, hand
//! it to the caller for recording, then submit and present. Frames that
//! cannot present (minimized window, stale surface at acquire) are
//! skipped without consuming a slot.

use crate::command::submit_command_buffers;
use crate::context::DeviceContext;
use crate::error::Result;
use crate::regen::Regenerable;
use crate::surface::SurfaceContext;
use crate::swapchain::{ImageAcquire, Swapchain, SwapchainSupport};
use crate::sync::{wait_for_fence, FrameSlot};
use ash::vk;

/// Number of frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Fixed ring of frame slots and the cursor over them.
struct FrameSlots {
    slots: Vec<FrameSlot>,
    cursor: usize,
}

impl FrameSlots {
    unsafe fn new(device: &ash::Device) -> Result<Self> {
        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for _ in 0..FRAMES_IN_FLIGHT {
            slots.push(FrameSlot::new(device)?);
        }
        Ok(Self { slots, cursor: 0 })
    }

    fn current(&self) -> &FrameSlot {
        &self.slots[self.cursor]
    }

    /// Move the cursor to the next slot. Called only for frames that
    /// reached presentation; skipped frames keep their slot.
    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    unsafe fn replace_semaphores(&mut self, device: &ash::Device) -> Result<()> {
        for slot in &mut self.slots {
            slot.replace_semaphores(device)?;
        }
        Ok(())
    }

    unsafe fn destroy(&self, device: &ash::Device) {
        for slot in &self.slots {
            slot.destroy(device);
        }
    }
}

/// Tracks which slot fence last claimed each swapchain image.
///
/// A null entry means the image is unclaimed. With more slots cycling
/// than images backing the swapchain, acquisition can hand out an image
/// another slot is still rendering to; the stored fence is what the new
/// claimant has to wait out.
struct ImageFenceTable {
    fences: Vec<vk::Fence>,
}

impl ImageFenceTable {
    fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Drop all claims and resize for a fresh set of images.
    fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, vk::Fence::null());
    }

    /// Record `fence` as the claimant of `image_index`, returning the
    /// previous claimant when one is registered.
    fn claim(&mut self, image_index: u32, fence: vk::Fence) -> Option<vk::Fence> {
        let prior = std::mem::replace(&mut self.fences[image_index as usize], fence);
        (prior != vk::Fence::null()).then_some(prior)
    }
}

/// Image index to render to, if the acquisition left the surface fully
/// usable.
///
/// A suboptimal acquire is treated the same as out-of-date: no
/// submission happens against the image and the swapchain is recreated
/// before the next attempt.
fn usable_image(acquired: ImageAcquire) -> Option<u32> {
    match acquired {
        ImageAcquire::Ready {
            index,
            suboptimal: false,
        } => Some(index),
        ImageAcquire::Ready {
            suboptimal: true, ..
        }
        | ImageAcquire::OutOfDate => None,
    }
}

/// An acquired swapchain image, bound to the slot that acquired it.
///
/// Move-only: [`Presenter::submit_and_present`] consumes it, so a
/// presented frame cannot be submitted twice.
pub struct AcquiredFrame {
    image_index: u32,
    image: vk::Image,
    view: vk::ImageView,
    slot: usize,
}

impl AcquiredFrame {
    /// Index of the acquired image within the swapchain.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// The acquired swapchain image.
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// View over the acquired image.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Frame slot this acquisition is pinned to.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Owns the swapchain, the frame slot ring, and the per-image fence
/// table, and drives acquisition, submission, and presentation.
pub struct Presenter {
    swapchain: Swapchain,
    slots: FrameSlots,
    images_in_flight: ImageFenceTable,
    needs_recreate: bool,
}

impl Presenter {
    /// Build the swapchain and frame slots for a surface.
    ///
    /// # Safety
    /// The context and surface must be valid, and the surface must be
    /// the one the context's device was selected against.
    pub unsafe fn new(
        ctx: &DeviceContext,
        surface: &SurfaceContext,
        framebuffer_width: u32,
        framebuffer_height: u32,
    ) -> Result<Self> {
        let support = SwapchainSupport::query(
            &surface.surface_loader,
            ctx.physical_device(),
            surface.surface,
        )?;

        let swapchain = Swapchain::new(
            ctx.device(),
            ctx.swapchain_loader(),
            surface.surface,
            &support,
            framebuffer_width,
            framebuffer_height,
            ctx.graphics_queue_family(),
            ctx.present_queue_family(),
            None,
        )?;

        let slots = FrameSlots::new(ctx.device())?;
        let images_in_flight = ImageFenceTable::new(swapchain.image_count());

        Ok(Self {
            swapchain,
            slots,
            images_in_flight,
            needs_recreate: false,
        })
    }

    /// Get the swapchain.
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// Current swapchain format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format
    }

    /// Number of images backing the swapchain.
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Slot the next frame will run in.
    pub fn current_slot(&self) -> usize {
        self.slots.cursor
    }

    /// Whether a recreation is pending.
    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    /// Flag the swapchain for recreation before the next acquisition.
    /// Used on window resize, where the surface has changed even though
    /// Vulkan has not reported it yet.
    pub fn request_recreate(&mut self) {
        self.needs_recreate = true;
    }

    /// Start a frame: wait out the slot fence and acquire an image.
    ///
    /// Returns `Ok(None)` when the frame must be skipped: the
    /// framebuffer has zero area, or the surface went stale at acquire
    /// (in which case the swapchain is recreated here). A skipped frame
    /// does not consume the slot.
    ///
    /// # Safety
    /// The context and surface must be valid.
    pub unsafe fn begin_frame(
        &mut self,
        ctx: &DeviceContext,
        surface: &SurfaceContext,
        framebuffer_width: u32,
        framebuffer_height: u32,
        dependents: &mut [&mut dyn Regenerable],
    ) -> Result<Option<AcquiredFrame>> {
        // A zero-area framebuffer cannot back a swapchain; skip until
        // the window has size again
        if framebuffer_width == 0 || framebuffer_height == 0 {
            return Ok(None);
        }

        // Settle a pending recreation before acquiring from the
        // swapchain it condemned
        if self.needs_recreate {
            self.recreate(
                ctx,
                surface,
                framebuffer_width,
                framebuffer_height,
                dependents,
            )?;
        }

        let device = ctx.device();
        let slot = self.slots.current();
        slot.wait(device)?;

        let acquired = self.swapchain.acquire_next_image(
            ctx.swapchain_loader(),
            slot.image_available,
            u64::MAX,
        )?;

        let Some(image_index) = usable_image(acquired) else {
            // The surface changed under the swapchain; recreate now and
            // skip the frame. A suboptimal acquire did hand out an
            // image, but its semaphore signal is stranded either way
            // and recreation replaces the slot semaphores.
            self.recreate(
                ctx,
                surface,
                framebuffer_width,
                framebuffer_height,
                dependents,
            )?;
            return Ok(None);
        };

        // Another slot may still be rendering to this image
        let in_flight = self.slots.current().in_flight;
        if let Some(prior) = self.images_in_flight.claim(image_index, in_flight) {
            wait_for_fence(device, prior, u64::MAX)?;
        }

        Ok(Some(AcquiredFrame {
            image_index,
            image: self.swapchain.images[image_index as usize],
            view: self.swapchain.image_views[image_index as usize],
            slot: self.slots.cursor,
        }))
    }

    /// Submit the recorded commands and present the frame's image.
    ///
    /// The submission waits on the slot's acquire semaphore at color
    /// attachment output and signals its render semaphore and fence;
    /// presentation waits on the render semaphore. The slot cursor
    /// advances, then a stale or flagged surface is recreated.
    ///
    /// # Safety
    /// The command buffer must be fully recorded and the frame must
    /// come from the immediately preceding [`begin_frame`] call.
    ///
    /// [`begin_frame`]: Presenter::begin_frame
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn submit_and_present(
        &mut self,
        ctx: &DeviceContext,
        surface: &SurfaceContext,
        frame: AcquiredFrame,
        command_buffer: vk::CommandBuffer,
        framebuffer_width: u32,
        framebuffer_height: u32,
        dependents: &mut [&mut dyn Regenerable],
    ) -> Result<()> {
        let device = ctx.device();
        let slot = self.slots.current();

        // Reset only now that a submission is guaranteed to follow; an
        // earlier reset could leave the slot's next wait with nothing
        // left to signal the fence
        slot.reset(device)?;

        submit_command_buffers(
            device,
            ctx.graphics_queue(),
            &[command_buffer],
            &[slot.image_available],
            &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            &[slot.render_finished],
            slot.in_flight,
        )?;

        let stale = self.swapchain.present(
            ctx.swapchain_loader(),
            ctx.present_queue(),
            frame.image_index,
            &[slot.render_finished],
        )?;

        // The frame reached presentation, so the ring moves on
        self.slots.advance();

        if stale || self.needs_recreate {
            self.recreate(
                ctx,
                surface,
                framebuffer_width,
                framebuffer_height,
                dependents,
            )?;
        }

        Ok(())
    }

    /// Tear down and rebuild the swapchain against the current surface
    /// state, then notify dependents of the new extent and format.
    unsafe fn recreate(
        &mut self,
        ctx: &DeviceContext,
        surface: &SurfaceContext,
        framebuffer_width: u32,
        framebuffer_height: u32,
        dependents: &mut [&mut dyn Regenerable],
    ) -> Result<()> {
        // A zero-area swapchain cannot exist; stay flagged until the
        // window has size again
        if framebuffer_width == 0 || framebuffer_height == 0 {
            self.needs_recreate = true;
            return Ok(());
        }

        ctx.wait_idle()?;

        let support = SwapchainSupport::query(
            &surface.surface_loader,
            ctx.physical_device(),
            surface.surface,
        )?;

        let new_swapchain = Swapchain::new(
            ctx.device(),
            ctx.swapchain_loader(),
            surface.surface,
            &support,
            framebuffer_width,
            framebuffer_height,
            ctx.graphics_queue_family(),
            ctx.present_queue_family(),
            Some(self.swapchain.swapchain),
        )?;

        let old = std::mem::replace(&mut self.swapchain, new_swapchain);
        old.destroy(ctx.device(), ctx.swapchain_loader());

        // The image count may have changed, and after the idle wait no
        // image is claimed by any slot
        self.images_in_flight.reset(self.swapchain.image_count());

        // Pending acquire signals from the dead swapchain must not
        // leak into the new one
        self.slots.replace_semaphores(ctx.device())?;

        self.needs_recreate = false;

        let extent = self.swapchain.extent;
        let format = self.swapchain.format;
        for dependent in dependents.iter_mut() {
            dependent.regenerate(ctx, extent, format)?;
        }

        tracing::info!(
            "Swapchain recreated: {}x{}, {} images",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );

        Ok(())
    }

    /// Destroy the frame slots and the swapchain.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        self.slots.destroy(ctx.device());
        self.swapchain.destroy(ctx.device(), ctx.swapchain_loader());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn null_slot() -> FrameSlot {
        FrameSlot {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        }
    }

    fn ring() -> FrameSlots {
        FrameSlots {
            slots: (0..FRAMES_IN_FLIGHT).map(|_| null_slot()).collect(),
            cursor: 0,
        }
    }

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    fn bare_swapchain() -> Swapchain {
        Swapchain {
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
        }
    }

    #[test]
    fn clean_acquire_yields_its_image() {
        let acquired = ImageAcquire::Ready {
            index: 1,
            suboptimal: false,
        };
        assert_eq!(usable_image(acquired), Some(1));
    }

    #[test]
    fn suboptimal_acquire_is_skipped_like_out_of_date() {
        assert_eq!(usable_image(ImageAcquire::OutOfDate), None);

        // An image was handed out, but nothing may be submitted to it
        let suboptimal = ImageAcquire::Ready {
            index: 0,
            suboptimal: true,
        };
        assert_eq!(usable_image(suboptimal), None);
    }

    #[test]
    fn requested_recreation_stays_pending_until_handled() {
        let mut presenter = Presenter {
            swapchain: bare_swapchain(),
            slots: ring(),
            images_in_flight: ImageFenceTable::new(2),
            needs_recreate: false,
        };

        assert!(!presenter.needs_recreate());
        presenter.request_recreate();
        assert!(presenter.needs_recreate());
    }

    #[test]
    fn slot_cursor_alternates_between_frames() {
        let mut slots = ring();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(slots.cursor);
            slots.advance();
        }
        assert_eq!(seen, vec![0, 1, 0, 1]);
    }

    #[test]
    fn cursor_only_moves_for_presented_frames() {
        let mut slots = ring();
        let mut order = Vec::new();

        // presented, presented, skipped, presented
        for presented in [true, true, false, true] {
            order.push(slots.cursor);
            if presented {
                slots.advance();
            }
        }

        assert_eq!(order, vec![0, 1, 0, 0]);
    }

    #[test]
    fn claiming_an_unclaimed_image_returns_no_prior_fence() {
        let mut table = ImageFenceTable::new(3);
        assert_eq!(table.claim(1, fence(7)), None);
    }

    #[test]
    fn claiming_a_claimed_image_returns_the_prior_fence() {
        let mut table = ImageFenceTable::new(3);
        table.claim(2, fence(7));
        assert_eq!(table.claim(2, fence(9)), Some(fence(7)));

        // The new claimant is registered in turn
        assert_eq!(table.claim(2, fence(11)), Some(fence(9)));
    }

    #[test]
    fn claims_on_distinct_images_do_not_interfere() {
        let mut table = ImageFenceTable::new(3);
        table.claim(0, fence(7));
        assert_eq!(table.claim(1, fence(9)), None);
        assert_eq!(table.claim(2, fence(11)), None);
    }

    #[test]
    fn reset_drops_claims_and_tracks_the_new_image_count() {
        let mut table = ImageFenceTable::new(2);
        table.claim(0, fence(7));
        table.claim(1, fence(9));

        table.reset(4);
        assert_eq!(table.fences.len(), 4);
        for index in 0..4 {
            assert_eq!(table.claim(index, fence(1)), None);
        }
    }
}
