// SPDX-License-Identifier: CEPL-1.0
use crate::backend::DeviceApi;
use crate::error::{RenderResult, ResultExt};
use ash::vk;
use std::sync::Arc;

pub struct Semaphore<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::Semaphore,
}

impl<D: DeviceApi> Semaphore<D> {
    pub fn new(device: &Arc<D>) -> RenderResult<Self> {
        let handle = device.create_semaphore().ctx("vkCreateSemaphore")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl<D: DeviceApi> Drop for Semaphore<D> {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.handle);
    }
}

pub struct Fence<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::Fence,
}

impl<D: DeviceApi> Fence<D> {
    pub fn new(device: &Arc<D>, signaled: bool) -> RenderResult<Self> {
        let handle = device.create_fence(signaled).ctx("vkCreateFence")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    pub fn wait(&self) -> RenderResult<()> {
        self.device
            .wait_for_fence(self.handle, u64::MAX)
            .ctx("vkWaitForFences")
    }

    pub fn reset(&self) -> RenderResult<()> {
        self.device.reset_fence(self.handle).ctx("vkResetFences")
    }
}

impl<D: DeviceApi> Drop for Fence<D> {
    fn drop(&mut self) {
        self.device.destroy_fence(self.handle);
    }
}

/// Sync objects of one in-flight slot.
pub struct FrameSync<D: DeviceApi> {
    /// Signaled by acquire, waited on by the submit.
    pub image_available: Semaphore<D>,
    /// Signaled by the submit, waited on by present.
    pub render_finished: Semaphore<D>,
    /// Signaled when the slot's GPU work is done. Created signaled so the
    /// first wait on a fresh slot returns immediately.
    pub in_flight: Fence<D>,
}

impl<D: DeviceApi> FrameSync<D> {
    pub fn new(device: &Arc<D>) -> RenderResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

pub fn create_frame_sync<D: DeviceApi>(
    device: &Arc<D>,
    slots: usize,
) -> RenderResult<Vec<FrameSync<D>>> {
    (0..slots).map(|_| FrameSync::new(device)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_device;

    #[test]
    fn slots_start_signaled_and_release_everything() {
        let (device, state) = mock_device();

        let slots = create_frame_sync(&device, 3).unwrap();
        assert_eq!(state.live_count("create_semaphore"), 6);
        assert_eq!(state.live_count("create_fence"), 3);
        for slot in &slots {
            slot.in_flight.wait().unwrap();
        }

        slots[0].in_flight.reset().unwrap();
        assert!(slots[0].in_flight.wait().is_err());

        drop(slots);
        assert!(state.live().is_empty());
    }
}
