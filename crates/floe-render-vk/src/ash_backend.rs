// SPDX-License-Identifier: CEPL-1.0
//! `ash` implementation of the backend traits.
//!
//! Every handle passed into an [`AshDevice`] method comes from that device
//! (see the contract in [`crate::backend`]), and every create-info is built by
//! the caller with pointers that outlive the call. That is what makes the
//! `unsafe` blocks below sound.

use crate::backend::{DeviceApi, InstanceApi};
use crate::error::{RenderResult, ResultExt};
use crate::extensions::{
    instance_extension_requests, instance_layer_requests, negotiate, SurfaceKind,
};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr::NonNull;
use tracing::{debug, error, info, trace, warn, Level};

const APP_NAME: &CStr = c"Floe";

/// Most severe bit wins.
pub(crate) fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    if severity.contains(S::ERROR) {
        Level::ERROR
    } else if severity.contains(S::WARNING) {
        Level::WARN
    } else if severity.contains(S::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    let level = severity_level(severity);
    if level == Level::ERROR {
        error!(target: "vulkan", "[{types:?}] {msg}");
    } else if level == Level::WARN {
        warn!(target: "vulkan", "[{types:?}] {msg}");
    } else if level == Level::DEBUG {
        debug!(target: "vulkan", "[{types:?}] {msg}");
    } else {
        trace!(target: "vulkan", "[{types:?}] {msg}");
    }
    vk::FALSE
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

/// Instance, surface and (with validation) the debug messenger.
pub struct AshInstance {
    entry: Entry,
    instance: ash::Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    debug: Option<DebugMessenger>,
}

impl AshInstance {
    // STRICT ORDER: instance → debug messenger → surface. Devices are then
    // picked against this surface.
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        kind: SurfaceKind,
        validation: bool,
    ) -> RenderResult<Self> {
        let display_raw = display.display_handle()?.as_raw();
        let window_raw = window.window_handle()?.as_raw();

        let entry = Entry::linked();

        // --- Negotiate extensions and layers against the loader ---
        let ext_props = unsafe { entry.enumerate_instance_extension_properties(None) }
            .ctx("vkEnumerateInstanceExtensionProperties")?;
        let available_exts: Vec<&CStr> = ext_props
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok())
            .collect();
        let extensions = negotiate(
            "instance extension",
            &instance_extension_requests(kind, validation),
            &available_exts,
        )?;

        let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
            .ctx("vkEnumerateInstanceLayerProperties")?;
        let available_layers: Vec<&CStr> = layer_props
            .iter()
            .filter_map(|p| p.layer_name_as_c_str().ok())
            .collect();
        let layers = negotiate(
            "layer",
            &instance_layer_requests(validation),
            &available_layers,
        )?;

        // --- Instance ---
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: APP_NAME.as_ptr(),
            application_version: 0,
            p_engine_name: APP_NAME.as_ptr(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };
        let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();
        let flags = if kind.needs_portability() {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            flags,
            p_application_info: &app_info,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            ..Default::default()
        };
        let instance =
            unsafe { entry.create_instance(&create_info, None) }.ctx("vkCreateInstance")?;
        let surface_loader = surface::Instance::new(&entry, &instance);
        let mut this = Self {
            entry,
            instance,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
            debug: None,
        };

        // --- Debug messenger (only when debug_utils made it through) ---
        if extensions.contains(&debug_utils::NAME) {
            let loader = debug_utils::Instance::new(&this.entry, &this.instance);
            let ci = vk::DebugUtilsMessengerCreateInfoEXT {
                s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
                message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                pfn_user_callback: Some(debug_callback),
                ..Default::default()
            };
            let handle = unsafe { loader.create_debug_utils_messenger(&ci, None) }
                .ctx("vkCreateDebugUtilsMessengerEXT")?;
            this.debug = Some(DebugMessenger { loader, handle });
        }

        // --- Surface ---
        this.surface = unsafe {
            ash_window::create_surface(&this.entry, &this.instance, display_raw, window_raw, None)
        }
        .ctx("vkCreateSurfaceKHR")?;

        info!(
            "Vulkan instance ready ({kind:?}, {} extensions, validation={})",
            extensions.len(),
            !layers.is_empty()
        );
        Ok(this)
    }
}

impl Drop for AshInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.handle, None);
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl InstanceApi for AshInstance {
    type Device = AshDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn device_name(&self, pd: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(pd) };
        props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_owned())
    }

    fn queue_families(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(pd)
        }
    }

    fn device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        let props = unsafe { self.instance.enumerate_device_extension_properties(pd) }?;
        Ok(props
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok())
            .map(CStr::to_owned)
            .collect())
    }

    fn format_supports(
        &self,
        pd: vk::PhysicalDevice,
        format: vk::Format,
        features: vk::FormatFeatureFlags,
    ) -> bool {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(pd, format)
        };
        props.optimal_tiling_features.contains(features)
    }

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn surface_support(&self, pd: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(pd, family, self.surface)
        }
    }

    fn surface_capabilities(
        &self,
        pd: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(pd, self.surface)
        }
    }

    fn surface_formats(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(pd, self.surface)
        }
    }

    fn present_modes(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(pd, self.surface)
        }
    }

    fn create_device(
        &self,
        pd: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> RenderResult<AshDevice> {
        let priorities = [1.0f32];
        let queue_info = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();
        let info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: 1,
            p_queue_create_infos: &queue_info,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };
        let device =
            unsafe { self.instance.create_device(pd, &info, None) }.ctx("vkCreateDevice")?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let swapchain_loader = swapchain::Device::new(&self.instance, &device);
        let memory = unsafe { self.instance.get_physical_device_memory_properties(pd) };
        debug!(
            "logical device created (family {queue_family}, {} extensions)",
            extensions.len()
        );
        Ok(AshDevice {
            device,
            queue,
            swapchain_loader,
            memory,
        })
    }
}

/// Logical device, its single queue and the swapchain loader.
pub struct AshDevice {
    device: ash::Device,
    queue: vk::Queue,
    swapchain_loader: swapchain::Device,
    memory: vk::PhysicalDeviceMemoryProperties,
}

impl Drop for AshDevice {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

impl DeviceApi for AshDevice {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn queue_present(&self, info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        unsafe { self.swapchain_loader.queue_present(self.queue, info) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        unsafe { self.device.create_image(info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, 0) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler> {
        unsafe { self.device.create_sampler(info, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        unsafe { self.device.create_buffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn write_memory(&self, memory: vk::DeviceMemory, offset: u64, data: &[u8]) -> VkResult<()> {
        unsafe {
            let dst = self.device.map_memory(
                memory,
                offset,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst.cast::<u8>(), data.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> VkResult<NonNull<u8>> {
        let ptr = unsafe {
            self.device
                .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())?
        };
        NonNull::new(ptr.cast::<u8>()).ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        unsafe { self.device.create_render_pass(info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        unsafe { self.device.create_framebuffer(info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            code_size: std::mem::size_of_val(code),
            p_code: code.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.create_shader_module(&info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        unsafe { self.device.create_descriptor_set_layout(info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device.create_pipeline_layout(info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        }
        .map_err(|(_, result)| result)?;
        Ok(pipelines[0])
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        unsafe { self.device.create_descriptor_pool(info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        unsafe { self.device.allocate_descriptor_sets(info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.device.update_descriptor_sets(writes, &[]) }
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device.allocate_command_buffers(info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.device.begin_command_buffer(cmd, info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) }
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, buffer, 0, vk::IndexType::UINT32)
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            )
        }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0) }
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: u64) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, &[region]) }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        region: &vk::BufferImageCopy,
    ) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(region),
            )
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(barrier),
            )
        }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn queue_submit(&self, info: &vk::SubmitInfo<'_>, fence: vk::Fence) -> VkResult<()> {
        unsafe {
            self.device
                .queue_submit(self.queue, std::slice::from_ref(info), fence)
        }
    }

    fn queue_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.queue_wait_idle(self.queue) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;

    #[test]
    fn severity_maps_to_tracing_levels() {
        assert_eq!(severity_level(S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::INFO), Level::DEBUG);
        assert_eq!(severity_level(S::VERBOSE), Level::TRACE);
    }

    #[test]
    fn most_severe_bit_wins() {
        assert_eq!(severity_level(S::VERBOSE | S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::INFO | S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::empty()), Level::TRACE);
    }
}
