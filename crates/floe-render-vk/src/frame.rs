// SPDX-License-Identifier: CEPL-1.0
//! Per-frame bookkeeping and command recording.

use crate::backend::DeviceApi;
use crate::error::{RenderResult, ResultExt};
use ash::vk;
use std::time::Instant;

/// Which slot is up next, which slot last used each swapchain image, and the
/// animation clock.
#[derive(Debug)]
pub struct FrameLoop {
    current: usize,
    slots: usize,
    /// Indexed by swapchain image: the slot whose fence guards its last use.
    images_in_flight: Vec<Option<usize>>,
    start: Option<Instant>,
}

impl FrameLoop {
    pub fn new(slots: usize) -> Self {
        let mut frame = Self {
            current: 0,
            slots: 0,
            images_in_flight: Vec::new(),
            start: None,
        };
        frame.reset(slots);
        frame
    }

    /// Forget all in-flight tracking; called after every swapchain rebuild.
    /// The clock keeps running.
    pub fn reset(&mut self, slots: usize) {
        self.current = 0;
        self.slots = slots.max(1);
        self.images_in_flight = vec![None; slots];
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots;
    }

    /// Marks `image` as used by the current slot and returns the slot that used
    /// it before, if that was a different one still to be waited on.
    pub fn claim_image(&mut self, image: usize) -> Option<usize> {
        let previous = self.images_in_flight[image].replace(self.current);
        previous.filter(|&slot| slot != self.current)
    }

    /// Seconds since the first call.
    pub fn elapsed_seconds(&mut self) -> f32 {
        self.start.get_or_insert_with(Instant::now).elapsed().as_secs_f32()
    }
}

/// Everything one prerecorded draw needs.
pub struct DrawTargets {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptor_set: vk::DescriptorSet,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub clear_color: [f32; 4],
}

/// Records the whole frame into `cmd`: clear, draw the mesh, leave the color
/// image ready for present.
pub fn record_draw<D: DeviceApi>(
    device: &D,
    cmd: vk::CommandBuffer,
    t: &DrawTargets,
) -> RenderResult<()> {
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        ..Default::default()
    };
    device
        .begin_command_buffer(cmd, &begin)
        .ctx("vkBeginCommandBuffer")?;

    let clears = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: t.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];
    let rp_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: t.render_pass,
        framebuffer: t.framebuffer,
        render_area: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: t.extent,
        },
        clear_value_count: clears.len() as u32,
        p_clear_values: clears.as_ptr(),
        ..Default::default()
    };
    device.cmd_begin_render_pass(cmd, &rp_begin);
    device.cmd_bind_pipeline(cmd, t.pipeline);
    device.cmd_bind_vertex_buffer(cmd, t.vertex_buffer);
    device.cmd_bind_index_buffer(cmd, t.index_buffer);
    device.cmd_bind_descriptor_set(cmd, t.layout, t.descriptor_set);
    device.cmd_draw_indexed(cmd, t.index_count);
    device.cmd_end_render_pass(cmd);

    device.end_command_buffer(cmd).ctx("vkEndCommandBuffer")
}
