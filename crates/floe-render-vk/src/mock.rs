// SPDX-License-Identifier: CEPL-1.0
//! Recording backend used by the unit tests.
//!
//! Handles are fabricated from a counter, every call is appended to a shared
//! log and every created object is tracked until destroyed, so tests can check
//! call ordering, counts and leaks. GPU work "completes" at submit time: a
//! fence passed to `queue_submit` becomes signaled immediately, and waiting on
//! an unsignaled fence returns `TIMEOUT` instead of hanging.

use crate::backend::{DeviceApi, InstanceApi};
use crate::error::RenderResult;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::ffi::{CStr, CString};
use std::ptr::NonNull;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRecord {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub old_swapchain: vk::SwapchainKHR,
}

#[derive(Default)]
pub struct MockState {
    calls: RefCell<Vec<&'static str>>,
    next_handle: Cell<u64>,
    live: RefCell<HashMap<u64, &'static str>>,
    fences: RefCell<HashMap<u64, bool>>,
    acquire_script: RefCell<VecDeque<VkResult<(u32, bool)>>>,
    present_script: RefCell<VecDeque<VkResult<bool>>>,
    image_count: Cell<u32>,
    next_image: Cell<u32>,
    swapchains: RefCell<Vec<SwapchainRecord>>,
    bytes_written: Cell<usize>,
    mapped: RefCell<HashMap<u64, NonNull<[u8]>>>,
}

impl MockState {
    fn log(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    fn create<H: Handle>(&self, kind: &'static str) -> H {
        self.log(kind);
        let raw = self.next_handle.get() + 1;
        self.next_handle.set(raw);
        self.live.borrow_mut().insert(raw, kind);
        H::from_raw(raw)
    }

    fn destroy<H: Handle>(&self, kind: &'static str, handle: H) {
        self.log(kind);
        let raw = handle.as_raw();
        assert!(
            self.live.borrow_mut().remove(&raw).is_some(),
            "{kind} on unknown or already destroyed handle {raw:#x}"
        );
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Objects created and not yet destroyed, by creating call.
    pub fn live(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.live.borrow().values().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn live_count(&self, kind: &str) -> usize {
        self.live.borrow().values().filter(|k| **k == kind).count()
    }

    /// Results handed out by the next `acquire_next_image` calls, in order.
    /// Once drained, images are handed out round robin.
    pub fn script_acquire(&self, results: impl IntoIterator<Item = VkResult<(u32, bool)>>) {
        self.acquire_script.borrow_mut().extend(results);
    }

    pub fn script_present(&self, results: impl IntoIterator<Item = VkResult<bool>>) {
        self.present_script.borrow_mut().extend(results);
    }

    pub fn swapchains(&self) -> Vec<SwapchainRecord> {
        self.swapchains.borrow().clone()
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written.get()
    }

    /// Memory objects currently mapped.
    pub fn mapped_count(&self) -> usize {
        self.mapped.borrow().len()
    }

    /// Current contents of a mapped memory object.
    pub fn mapped_bytes(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        let mapped = self.mapped.borrow();
        let ptr = mapped[&memory.as_raw()];
        // the allocation is owned by the map until unmap
        unsafe { ptr.as_ref().to_vec() }
    }
}

#[derive(Clone, Debug)]
pub struct MockPhysical {
    pub name: &'static str,
    pub families: Vec<vk::QueueFamilyProperties>,
    pub present: VkResult<bool>,
    pub extensions: Vec<CString>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub modes: Vec<vk::PresentModeKHR>,
}

impl MockPhysical {
    /// A graphics+present capable adapter with the swapchain extension.
    pub fn capable(name: &'static str) -> Self {
        Self {
            name,
            families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            present: Ok(true),
            extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    pub fn without_swapchain(name: &'static str) -> Self {
        Self {
            extensions: Vec::new(),
            ..Self::capable(name)
        }
    }
}

pub struct MockInstance {
    pub devices: Vec<MockPhysical>,
    pub caps: vk::SurfaceCapabilitiesKHR,
    state: Rc<MockState>,
}

impl MockInstance {
    pub fn new(devices: Vec<MockPhysical>) -> Self {
        Self {
            devices,
            caps: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            state: Rc::default(),
        }
    }

    pub fn state(&self) -> Rc<MockState> {
        self.state.clone()
    }

    fn physical(&self, pd: vk::PhysicalDevice) -> &MockPhysical {
        &self.devices[pd.as_raw() as usize - 1]
    }
}

impl InstanceApi for MockInstance {
    type Device = MockDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn device_name(&self, pd: vk::PhysicalDevice) -> String {
        self.physical(pd).name.to_owned()
    }

    fn queue_families(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.physical(pd).families.clone()
    }

    fn device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        Ok(self.physical(pd).extensions.clone())
    }

    fn format_supports(
        &self,
        _pd: vk::PhysicalDevice,
        format: vk::Format,
        _features: vk::FormatFeatureFlags,
    ) -> bool {
        format == vk::Format::D32_SFLOAT
    }

    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5u64 << 32)
    }

    fn surface_support(&self, pd: vk::PhysicalDevice, _family: u32) -> VkResult<bool> {
        self.physical(pd).present
    }

    fn surface_capabilities(
        &self,
        _pd: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.caps)
    }

    fn surface_formats(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.physical(pd).formats.clone())
    }

    fn present_modes(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.physical(pd).modes.clone())
    }

    fn create_device(
        &self,
        pd: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> RenderResult<MockDevice> {
        self.state.log("create_device");
        Ok(MockDevice {
            physical: pd,
            queue_family,
            extensions: extensions.iter().map(|e| (*e).to_owned()).collect(),
            memory: mock_memory_properties(),
            state: self.state.clone(),
        })
    }
}

fn mock_memory_properties() -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 2,
        memory_heap_count: 1,
        ..Default::default()
    };
    props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    props.memory_types[1].property_flags =
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    props
}

pub struct MockDevice {
    pub physical: vk::PhysicalDevice,
    pub queue_family: u32,
    pub extensions: Vec<CString>,
    memory: vk::PhysicalDeviceMemoryProperties,
    state: Rc<MockState>,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.log("destroy_device");
    }
}

fn requirements(size: u64) -> vk::MemoryRequirements {
    vk::MemoryRequirements {
        size,
        alignment: 16,
        memory_type_bits: 0b11,
    }
}

impl DeviceApi for MockDevice {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.state.swapchains.borrow_mut().push(SwapchainRecord {
            min_image_count: info.min_image_count,
            format: info.image_format,
            extent: info.image_extent,
            present_mode: info.present_mode,
            old_swapchain: info.old_swapchain,
        });
        self.state.image_count.set(info.min_image_count);
        self.state.next_image.set(0);
        Ok(self.state.create("create_swapchain"))
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.state.log("swapchain_images");
        let base = 0xA000u64 + self.state.next_handle.get() * 16;
        Ok((0..self.state.image_count.get() as u64)
            .map(|i| vk::Image::from_raw(base + i))
            .collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.state.destroy("destroy_swapchain", swapchain);
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.state.log("acquire_next_image");
        if let Some(scripted) = self.state.acquire_script.borrow_mut().pop_front() {
            return scripted;
        }
        let count = self.state.image_count.get().max(1);
        let index = self.state.next_image.get() % count;
        self.state.next_image.set(index + 1);
        Ok((index, false))
    }

    fn queue_present(&self, _info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        self.state.log("queue_present");
        self.state
            .present_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(false))
    }

    fn create_image(&self, _info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        Ok(self.state.create("create_image"))
    }

    fn destroy_image(&self, image: vk::Image) {
        self.state.destroy("destroy_image", image);
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        requirements(4096)
    }

    fn bind_image_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory) -> VkResult<()> {
        self.state.log("bind_image_memory");
        Ok(())
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        Ok(self.state.create("create_image_view"))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state.destroy("destroy_image_view", view);
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler> {
        Ok(self.state.create("create_sampler"))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.state.destroy("destroy_sampler", sampler);
    }

    fn create_buffer(&self, _info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        Ok(self.state.create("create_buffer"))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.state.destroy("destroy_buffer", buffer);
    }

    fn buffer_memory_requirements(&self, _buffer: vk::Buffer) -> vk::MemoryRequirements {
        requirements(256)
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory) -> VkResult<()> {
        self.state.log("bind_buffer_memory");
        Ok(())
    }

    fn allocate_memory(&self, _info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        Ok(self.state.create("allocate_memory"))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.state.destroy("free_memory", memory);
    }

    fn write_memory(&self, _memory: vk::DeviceMemory, _offset: u64, data: &[u8]) -> VkResult<()> {
        self.state.log("write_memory");
        self.state
            .bytes_written
            .set(self.state.bytes_written.get() + data.len());
        Ok(())
    }

    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> VkResult<NonNull<u8>> {
        self.state.log("map_memory");
        let block = NonNull::from(Box::leak(vec![0u8; size as usize].into_boxed_slice()));
        let previous = self.state.mapped.borrow_mut().insert(memory.as_raw(), block);
        assert!(previous.is_none(), "memory {:#x} mapped twice", memory.as_raw());
        Ok(block.cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.state.log("unmap_memory");
        let block = self
            .state
            .mapped
            .borrow_mut()
            .remove(&memory.as_raw())
            .expect("unmap of memory that is not mapped");
        drop(unsafe { Box::from_raw(block.as_ptr()) });
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        Ok(self.state.create("create_render_pass"))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state.destroy("destroy_render_pass", render_pass);
    }

    fn create_framebuffer(
        &self,
        _info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        Ok(self.state.create("create_framebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state.destroy("destroy_framebuffer", framebuffer);
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        assert!(!code.is_empty(), "empty SPIR-V");
        Ok(self.state.create("create_shader_module"))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state.destroy("destroy_shader_module", module);
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        Ok(self.state.create("create_descriptor_set_layout"))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state.destroy("destroy_descriptor_set_layout", layout);
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        Ok(self.state.create("create_pipeline_layout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state.destroy("destroy_pipeline_layout", layout);
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        assert_eq!(info.stage_count, 2);
        Ok(self.state.create("create_graphics_pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state.destroy("destroy_pipeline", pipeline);
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        Ok(self.state.create("create_descriptor_pool"))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state.destroy("destroy_descriptor_pool", pool);
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        self.state.log("allocate_descriptor_sets");
        let base = 0xD000_0000u64 + self.state.next_handle.get() * 16;
        self.state
            .next_handle
            .set(self.state.next_handle.get() + 1);
        Ok((0..info.descriptor_set_count as u64)
            .map(|i| vk::DescriptorSet::from_raw(base + i))
            .collect())
    }

    fn update_descriptor_sets(&self, _writes: &[vk::WriteDescriptorSet<'_>]) {
        self.state.log("update_descriptor_sets");
    }

    fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        Ok(self.state.create("create_command_pool"))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.state.destroy("destroy_command_pool", pool);
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        Ok((0..info.command_buffer_count)
            .map(|_| self.state.create("allocate_command_buffers"))
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        for &cmd in buffers {
            self.state.destroy("free_command_buffers", cmd);
        }
    }

    fn begin_command_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.state.log("begin_command_buffer");
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        self.state.log("end_command_buffer");
        Ok(())
    }

    fn cmd_begin_render_pass(&self, _cmd: vk::CommandBuffer, _info: &vk::RenderPassBeginInfo<'_>) {
        self.state.log("cmd_begin_render_pass");
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.state.log("cmd_end_render_pass");
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.state.log("cmd_bind_pipeline");
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, _buffer: vk::Buffer) {
        self.state.log("cmd_bind_vertex_buffer");
    }

    fn cmd_bind_index_buffer(&self, _cmd: vk::CommandBuffer, _buffer: vk::Buffer) {
        self.state.log("cmd_bind_index_buffer");
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _set: vk::DescriptorSet,
    ) {
        self.state.log("cmd_bind_descriptor_set");
    }

    fn cmd_draw_indexed(&self, _cmd: vk::CommandBuffer, _index_count: u32) {
        self.state.log("cmd_draw_indexed");
    }

    fn cmd_copy_buffer(&self, _cmd: vk::CommandBuffer, _src: vk::Buffer, _dst: vk::Buffer, _size: u64) {
        self.state.log("cmd_copy_buffer");
    }

    fn cmd_copy_buffer_to_image(
        &self,
        _cmd: vk::CommandBuffer,
        _src: vk::Buffer,
        _dst: vk::Image,
        _region: &vk::BufferImageCopy,
    ) {
        self.state.log("cmd_copy_buffer_to_image");
    }

    fn cmd_pipeline_barrier(
        &self,
        _cmd: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        _barrier: &vk::ImageMemoryBarrier<'_>,
    ) {
        self.state.log("cmd_pipeline_barrier");
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        Ok(self.state.create("create_semaphore"))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state.destroy("destroy_semaphore", semaphore);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let fence: vk::Fence = self.state.create("create_fence");
        self.state.fences.borrow_mut().insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.state.fences.borrow_mut().remove(&fence.as_raw());
        self.state.destroy("destroy_fence", fence);
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        self.state.log("wait_for_fence");
        match self.state.fences.borrow().get(&fence.as_raw()) {
            Some(true) => Ok(()),
            Some(false) => Err(vk::Result::TIMEOUT),
            None => panic!("wait on unknown fence {:#x}", fence.as_raw()),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.state.log("reset_fence");
        self.state.fences.borrow_mut().insert(fence.as_raw(), false);
        Ok(())
    }

    fn queue_submit(&self, _info: &vk::SubmitInfo<'_>, fence: vk::Fence) -> VkResult<()> {
        self.state.log("queue_submit");
        if fence != vk::Fence::null() {
            self.state.fences.borrow_mut().insert(fence.as_raw(), true);
        }
        Ok(())
    }

    fn queue_wait_idle(&self) -> VkResult<()> {
        self.state.log("queue_wait_idle");
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.state.log("device_wait_idle");
        Ok(())
    }
}

/// A device on a single capable adapter plus the log it writes to.
pub fn mock_device() -> (std::sync::Arc<MockDevice>, Rc<MockState>) {
    let instance = MockInstance::new(vec![MockPhysical::capable("mock")]);
    let state = instance.state();
    let pd = vk::PhysicalDevice::from_raw(1);
    let device = instance
        .create_device(pd, 0, &[ash::khr::swapchain::NAME])
        .expect("mock device");
    (std::sync::Arc::new(device), state)
}
