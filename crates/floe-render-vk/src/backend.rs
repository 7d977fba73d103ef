// SPDX-License-Identifier: CEPL-1.0
//! The seam between the renderer and the Vulkan API.
//!
//! [`InstanceApi`] answers the capability queries device selection and the
//! swapchain need, [`DeviceApi`] mirrors the subset of `ash::Device` (plus the
//! swapchain loader) the renderer calls. Everything above this module is
//! written against these traits, so the whole initialization and frame
//! protocol runs against a recording mock in tests.
//!
//! Handles passed to a `DeviceApi` must have been created by that same device.

use crate::error::RenderResult;
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{CStr, CString};
use std::ptr::NonNull;

pub trait InstanceApi {
    type Device: DeviceApi;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, pd: vk::PhysicalDevice) -> String;
    fn queue_families(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>>;
    fn format_supports(
        &self,
        pd: vk::PhysicalDevice,
        format: vk::Format,
        features: vk::FormatFeatureFlags,
    ) -> bool;

    /// The surface every query below is made against.
    fn surface(&self) -> vk::SurfaceKHR;
    fn surface_support(&self, pd: vk::PhysicalDevice, family: u32) -> VkResult<bool>;
    fn surface_capabilities(&self, pd: vk::PhysicalDevice)
        -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>>;

    fn create_device(
        &self,
        pd: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> RenderResult<Self::Device>;
}

pub trait DeviceApi {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    // --- swapchain ---
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>)
        -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    /// `Ok((index, suboptimal))`.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    /// `Ok(suboptimal)`.
    fn queue_present(&self, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool>;

    // --- images, views, samplers ---
    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()>;
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    // --- buffers, memory ---
    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()>;
    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    /// Map, copy `data` at `offset`, unmap. Memory must be host visible and coherent.
    fn write_memory(&self, memory: vk::DeviceMemory, offset: u64, data: &[u8]) -> VkResult<()>;
    /// Maps the first `size` bytes of host-visible memory. The pointer stays
    /// valid until `unmap_memory`.
    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> VkResult<NonNull<u8>>;
    fn unmap_memory(&self, memory: vk::DeviceMemory);

    // --- pipeline objects ---
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo<'_>)
        -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // --- descriptors ---
    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool>;
    /// Sets allocated from the pool are released with it.
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    // --- commands ---
    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo<'_>)
        -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>);
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32);
    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: u64);
    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        region: &vk::BufferImageCopy,
    );
    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    );

    // --- synchronization ---
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    // --- queue ---
    fn queue_submit(&self, info: &vk::SubmitInfo<'_>, fence: vk::Fence) -> VkResult<()>;
    fn queue_wait_idle(&self) -> VkResult<()>;
    fn device_wait_idle(&self) -> VkResult<()>;
}
