//! Viewer application implementation.

use ash::vk;
use glam::Vec3;
use tracing::{error, info};

use vitrine_app::{AppContext, FrameContext, VitrineApp};
use vitrine_gpu::barrier::{color_subresource_range, image_barrier, pipeline_barriers};
use vitrine_gpu::Regenerable;

use crate::target::OffscreenTarget;

/// Seconds for one full sweep through the color palette.
const PALETTE_PERIOD: f32 = 12.0;

/// Viewer application state.
pub struct Viewer {
    /// Offscreen image each frame is composed in.
    target: OffscreenTarget,
    /// Seconds since startup, drives the palette sweep.
    elapsed: f32,
}

impl VitrineApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let target = OffscreenTarget::new(&ctx.gpu, ctx.extent(), ctx.presenter.format())?;

        info!(
            "Offscreen target created at {}x{}",
            ctx.width(),
            ctx.height()
        );

        Ok(Self {
            target,
            elapsed: 0.0,
        })
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        self.elapsed += dt;
    }

    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
        let color = palette(self.elapsed / PALETTE_PERIOD);

        self.record_clear(ctx, frame, color);
        self.record_blit(ctx, frame);
        self.record_present_transition(ctx, frame);

        Ok(())
    }

    fn regenerables(&mut self) -> Vec<&mut dyn Regenerable> {
        vec![&mut self.target]
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        if let Err(e) = self.target.destroy(&ctx.gpu) {
            error!("Failed to destroy offscreen target: {e}");
        }
    }
}

impl Viewer {
    /// Clear the offscreen image to the palette color.
    fn record_clear(&self, ctx: &AppContext, frame: &FrameContext, color: Vec3) {
        let device = ctx.gpu.device();
        let cmd = frame.command_buffer;

        unsafe {
            // The image is rewritten in full every frame, so the old
            // contents are irrelevant and the old layout is UNDEFINED
            let to_clear = image_barrier(
                self.target.image(),
                vk::PipelineStageFlags2::TOP_OF_PIPE,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::UNDEFINED,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            pipeline_barriers(device, cmd, std::slice::from_ref(&to_clear));

            let clear_value = vk::ClearColorValue {
                float32: [color.x, color.y, color.z, 1.0],
            };
            device.cmd_clear_color_image(
                cmd,
                self.target.image(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_value,
                &[color_subresource_range()],
            );
        }
    }

    /// Blit the offscreen image onto the swapchain image.
    fn record_blit(&self, ctx: &AppContext, frame: &FrameContext) {
        let device = ctx.gpu.device();
        let cmd = frame.command_buffer;

        unsafe {
            // Flip the offscreen image to a blit source and bring the
            // swapchain image in as the destination in one dependency
            let to_read = image_barrier(
                self.target.image(),
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_READ,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );
            let to_write = acquired_image_to_transfer_dst(frame.swapchain_image);
            pipeline_barriers(device, cmd, &[to_read, to_write]);

            let src = self.target.extent();
            let dst = frame.extent;
            let blit = vk::ImageBlit {
                src_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: src.width as i32,
                        y: src.height as i32,
                        z: 1,
                    },
                ],
                dst_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: dst.width as i32,
                        y: dst.height as i32,
                        z: 1,
                    },
                ],
            };

            device.cmd_blit_image(
                cmd,
                self.target.image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                frame.swapchain_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }
    }

    /// Transition the swapchain image for presentation.
    fn record_present_transition(&self, ctx: &AppContext, frame: &FrameContext) {
        let device = ctx.gpu.device();
        let cmd = frame.command_buffer;

        unsafe {
            let to_present = image_barrier(
                frame.swapchain_image,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );
            pipeline_barriers(device, cmd, std::slice::from_ref(&to_present));
        }
    }
}

/// Barrier taking a freshly acquired swapchain image to
/// `TRANSFER_DST_OPTIMAL` for the blit.
///
/// The submission waits on the acquire semaphore at
/// `COLOR_ATTACHMENT_OUTPUT`, so the transition must source at that
/// stage to execute after the presentation engine releases the image.
fn acquired_image_to_transfer_dst(image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
    image_barrier(
        image,
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::UNDEFINED,
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )
}

/// Color the clear sweeps through, as a looping set of keyframes with
/// linear blending between neighbors. `t` is in palette periods.
fn palette(t: f32) -> Vec3 {
    const KEYS: [Vec3; 4] = [
        Vec3::new(0.10, 0.16, 0.32), // deep blue
        Vec3::new(0.58, 0.18, 0.24), // crimson
        Vec3::new(0.92, 0.60, 0.20), // amber
        Vec3::new(0.16, 0.42, 0.30), // pine
    ];

    let phase = t.fract() * KEYS.len() as f32;
    let index = phase as usize % KEYS.len();
    let next = (index + 1) % KEYS.len();
    KEYS[index].lerp(KEYS[next], phase.fract())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_transition_chains_with_the_submit_wait_stage() {
        let barrier = acquired_image_to_transfer_dst(vk::Image::null());

        // The submission waits the acquire semaphore at color
        // attachment output; a transition sourced anywhere else would
        // not be ordered after the presentation engine's release
        assert_eq!(
            barrier.src_stage_mask,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
        );
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.dst_stage_mask, vk::PipelineStageFlags2::TRANSFER);
    }
}
