// SPDX-License-Identifier: CEPL-1.0
use crate::backend::DeviceApi;
use crate::error::{RenderResult, ResultExt};
use ash::vk;
use std::sync::Arc;

pub struct CommandPool<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::CommandPool,
}

impl<D: DeviceApi> CommandPool<D> {
    /// Buffers from this pool may be re-recorded individually.
    pub fn new(device: &Arc<D>, queue_family: u32) -> RenderResult<Self> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let handle = device
            .create_command_pool(&info)
            .ctx("vkCreateCommandPool")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    /// Allocates, records, submits and waits for a throwaway command buffer.
    pub fn submit_once(&self, record: impl FnOnce(&D, vk::CommandBuffer)) -> RenderResult<()> {
        let once = CommandBuffers::allocate(&self.device, self, 1)?;
        let cmd = once.get(0);

        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        self.device
            .begin_command_buffer(cmd, &begin)
            .ctx("vkBeginCommandBuffer")?;
        record(&*self.device, cmd);
        self.device
            .end_command_buffer(cmd)
            .ctx("vkEndCommandBuffer")?;

        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        self.device
            .queue_submit(&submit, vk::Fence::null())
            .ctx("vkQueueSubmit")?;
        self.device.queue_wait_idle().ctx("vkQueueWaitIdle")
    }
}

impl<D: DeviceApi> Drop for CommandPool<D> {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.handle);
    }
}

/// Primary command buffers freed back to their pool on drop.
///
/// Must be dropped before the pool they came from.
pub struct CommandBuffers<D: DeviceApi> {
    device: Arc<D>,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl<D: DeviceApi> CommandBuffers<D> {
    pub fn allocate(device: &Arc<D>, pool: &CommandPool<D>, count: usize) -> RenderResult<Self> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool.handle(),
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        let buffers = device
            .allocate_command_buffers(&info)
            .ctx("vkAllocateCommandBuffers")?;
        Ok(Self {
            device: device.clone(),
            pool: pool.handle(),
            buffers,
        })
    }

    #[inline]
    pub fn get(&self, index: usize) -> vk::CommandBuffer {
        self.buffers[index]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = vk::CommandBuffer> + '_ {
        self.buffers.iter().copied()
    }
}

impl<D: DeviceApi> Drop for CommandBuffers<D> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            self.device.free_command_buffers(self.pool, &self.buffers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_device;

    #[test]
    fn one_time_commands_wait_and_free() {
        let (device, state) = mock_device();
        let pool = CommandPool::new(&device, 0).unwrap();
        state.clear_calls();

        let mut recorded = false;
        pool.submit_once(|_, _| recorded = true).unwrap();
        assert!(recorded);
        assert_eq!(
            state.calls(),
            [
                "allocate_command_buffers",
                "begin_command_buffer",
                "end_command_buffer",
                "queue_submit",
                "queue_wait_idle",
                "free_command_buffers",
            ]
        );

        drop(pool);
        assert!(state.live().is_empty());
    }
}
