// SPDX-License-Identifier: CEPL-1.0
//! The renderer: staged initialization, swapchain rebuilds and the frame loop.
//!
//! Long-lived objects (device, command pool, descriptor set layout, mesh and
//! texture) are created once. Everything that depends on the swapchain format
//! or extent lives in [`SwapchainResources`] and is dropped and rebuilt as a
//! unit. Slot count equals swapchain image count.

use crate::assets::{load_texture, AssetSource, ShaderCode, TextureData};
use crate::backend::{DeviceApi, InstanceApi};
use crate::commands::{CommandBuffers, CommandPool};
use crate::device::{pick_physical_device, SelectedDevice};
use crate::error::{result_name, RenderResult, ResultExt, VkError};
use crate::frame::{record_draw, DrawTargets, FrameLoop};
use crate::pipeline::{
    DescriptorSetLayout, Framebuffers, GraphicsPipeline, RenderPass, MESH_INDICES, MESH_VERTICES,
};
use crate::resources::{pick_depth_format, Buffer, DepthBuffer};
use crate::swapchain::{PresentPreference, Swapchain};
use crate::sync::{create_frame_sync, FrameSync};
use crate::texture::Texture;
use crate::uniform::{create_uniform_buffers, FrameDescriptors, UniformBuffer};
use ash::vk;
use floe_math::Mvp;
use floe_render::{RenderConfig, RenderSize};
use std::ffi::CStr;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

/// Mesh and texture shared by every frame.
struct Scene<D: DeviceApi> {
    texture: Texture<D>,
    vertices: Buffer<D>,
    indices: Buffer<D>,
    index_count: u32,
}

impl<D: DeviceApi> Scene<D> {
    fn upload(device: &Arc<D>, pool: &CommandPool<D>, texture: &TextureData) -> RenderResult<Self> {
        let vertices = Buffer::device_local(
            device,
            pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(MESH_VERTICES),
        )?;
        let indices = Buffer::device_local(
            device,
            pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(MESH_INDICES),
        )?;
        Ok(Self {
            texture: Texture::upload(device, pool, texture)?,
            vertices,
            indices,
            index_count: MESH_INDICES.len() as u32,
        })
    }
}

/// Everything rebuilt on resize. Fields drop top to bottom.
pub struct SwapchainResources<D: DeviceApi> {
    command_buffers: CommandBuffers<D>,
    descriptors: FrameDescriptors<D>,
    uniforms: Vec<UniformBuffer<D>>,
    framebuffers: Framebuffers<D>,
    depth: DepthBuffer<D>,
    pipeline: GraphicsPipeline<D>,
    render_pass: RenderPass<D>,
    swapchain: Swapchain<D>,
    sync: Vec<FrameSync<D>>,
}

impl<D: DeviceApi> SwapchainResources<D> {
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth.format()
    }
}

pub struct VulkanRenderer<I: InstanceApi> {
    // declaration order is destruction order
    resources: Option<SwapchainResources<I::Device>>,
    scene: Scene<I::Device>,
    descriptor_layout: DescriptorSetLayout<I::Device>,
    command_pool: CommandPool<I::Device>,
    device: Arc<I::Device>,
    instance: I,

    selected: SelectedDevice,
    shaders: ShaderCode,
    depth_format: vk::Format,
    present: PresentPreference,
    clear_color: [f32; 4],
    size: RenderSize,
    resize_pending: bool,
    frame: FrameLoop,
}

impl<I: InstanceApi> VulkanRenderer<I> {
    /// Builds the renderer on an instance whose surface already exists.
    pub fn with_instance(
        instance: I,
        device_extensions: &[&CStr],
        size: RenderSize,
        config: &RenderConfig,
        assets: &dyn AssetSource,
    ) -> RenderResult<Self> {
        let _span = info_span!("vk_init").entered();

        let selected = pick_physical_device(&instance, device_extensions)?;
        let device = Arc::new(instance.create_device(
            selected.physical,
            selected.queue_family,
            device_extensions,
        )?);
        let command_pool = CommandPool::new(&device, selected.queue_family)?;
        let descriptor_layout = DescriptorSetLayout::new(&device)?;

        let shaders = ShaderCode::load(config, assets)?;
        let scene = Scene::upload(&device, &command_pool, &load_texture(config, assets)?)?;

        let depth_format = pick_depth_format(|format| {
            instance.format_supports(
                selected.physical,
                format,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
        });
        debug!("depth format {depth_format:?}");

        let mut renderer = Self {
            resources: None,
            scene,
            descriptor_layout,
            command_pool,
            device,
            instance,
            selected,
            shaders,
            depth_format,
            present: PresentPreference {
                vsync: config.vsync,
                mode: config.vsync_mode,
            },
            clear_color: config.clear_color,
            size,
            resize_pending: false,
            frame: FrameLoop::new(0),
        };

        if size.is_empty() {
            info!("window starts minimized, swapchain deferred");
        } else {
            renderer.install_resources()?;
        }
        if let Some(res) = &renderer.resources {
            info!(
                "Vulkan renderer ready on `{}` ({}x{}, {} images)",
                renderer.selected.name,
                res.extent().width,
                res.extent().height,
                res.image_count()
            );
        }
        Ok(renderer)
    }

    /// Records the drawable size; the swapchain is rebuilt after the next present.
    pub fn resize(&mut self, size: RenderSize) {
        if size != self.size {
            debug!("resize requested: {}x{}", size.width, size.height);
            self.size = size;
            self.resize_pending = true;
        }
    }

    pub fn set_vsync(&mut self, on: bool) {
        if self.present.vsync != on {
            self.present.vsync = on;
            self.resize_pending = true;
        }
    }

    /// Re-records every command buffer with the new clear color.
    pub fn set_clear_color(&mut self, rgba: [f32; 4]) -> RenderResult<()> {
        self.clear_color = rgba;
        if let Some(res) = &self.resources {
            self.device.device_wait_idle().ctx("vkDeviceWaitIdle")?;
            self.record_commands(res)?;
        }
        Ok(())
    }

    pub fn resources(&self) -> Option<&SwapchainResources<I::Device>> {
        self.resources.as_ref()
    }

    /// Rebuilds the swapchain and everything depending on it.
    ///
    /// Returns `false` without touching the device when the window has a zero
    /// dimension.
    pub fn recreate_swapchain(&mut self) -> RenderResult<bool> {
        if self.size.is_empty() {
            debug!("skipping swapchain rebuild for empty window");
            return Ok(false);
        }
        let _span = info_span!(
            "recreate_swapchain",
            width = self.size.width,
            height = self.size.height
        )
        .entered();

        self.device.device_wait_idle().ctx("vkDeviceWaitIdle")?;
        self.resources = None;
        self.install_resources()?;
        Ok(true)
    }

    fn install_resources(&mut self) -> RenderResult<()> {
        let res = self.build_resources()?;
        self.frame.reset(res.image_count());
        self.resources = Some(res);
        self.resize_pending = false;
        Ok(())
    }

    fn build_resources(&self) -> RenderResult<SwapchainResources<I::Device>> {
        let device = &self.device;

        // STRICT ORDER: swapchain (+views) → render pass → pipeline → depth →
        // framebuffers → uniforms → descriptors → command buffers → sync.
        let swapchain = Swapchain::create(
            &self.instance,
            device,
            self.selected.physical,
            self.size,
            self.present,
        )?;
        let render_pass = RenderPass::new(device, swapchain.format(), self.depth_format)?;
        let pipeline = GraphicsPipeline::new(
            device,
            &render_pass,
            &self.descriptor_layout,
            swapchain.extent(),
            &self.shaders,
        )?;
        let depth = DepthBuffer::new(device, swapchain.extent(), self.depth_format)?;
        let framebuffers = Framebuffers::new(
            device,
            &render_pass,
            swapchain.views(),
            depth.view(),
            swapchain.extent(),
        )?;

        let count = swapchain.image_count();
        let uniforms = create_uniform_buffers(device, count)?;
        let descriptors = FrameDescriptors::new(
            device,
            &self.descriptor_layout,
            &uniforms,
            &self.scene.texture,
        )?;
        let command_buffers = CommandBuffers::allocate(device, &self.command_pool, count)?;
        let sync = create_frame_sync(device, count)?;

        let res = SwapchainResources {
            command_buffers,
            descriptors,
            uniforms,
            framebuffers,
            depth,
            pipeline,
            render_pass,
            swapchain,
            sync,
        };
        self.record_commands(&res)?;
        Ok(res)
    }

    fn record_commands(&self, res: &SwapchainResources<I::Device>) -> RenderResult<()> {
        for (i, cmd) in res.command_buffers.iter().enumerate() {
            let targets = DrawTargets {
                render_pass: res.render_pass.handle(),
                framebuffer: res.framebuffers.get(i),
                extent: res.swapchain.extent(),
                pipeline: res.pipeline.handle(),
                layout: res.pipeline.layout(),
                descriptor_set: res.descriptors.get(i),
                vertex_buffer: self.scene.vertices.handle(),
                index_buffer: self.scene.indices.handle(),
                index_count: self.scene.index_count,
                clear_color: self.clear_color,
            };
            record_draw(&*self.device, cmd, &targets)?;
        }
        Ok(())
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait slot fence   2) acquire   3) reset slot fence
    // 4) update UBO        5) submit    6) present   7) advance slot
    pub fn draw_frame(&mut self) -> RenderResult<()> {
        if self.size.is_empty() {
            return Ok(());
        }
        if self.resources.is_none() && !self.recreate_swapchain()? {
            return Ok(());
        }
        let Some(res) = self.resources.as_ref() else {
            return Ok(());
        };

        let slot = self.frame.current();
        let sync = &res.sync[slot];
        sync.in_flight.wait()?;

        let image_index = match self.device.acquire_next_image(
            res.swapchain.handle(),
            u64::MAX,
            sync.image_available.handle(),
        ) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!("acquire: swapchain suboptimal");
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: swapchain out of date, rebuilding");
                self.recreate_swapchain()?;
                return Ok(());
            }
            Err(result) => {
                error!("vkAcquireNextImageKHR failed: {}", result_name(result));
                return Err(VkError::Backend {
                    context: "vkAcquireNextImageKHR",
                    result,
                });
            }
        };
        let image = image_index as usize;

        if let Some(other) = self.frame.claim_image(image) {
            res.sync[other].in_flight.wait()?;
        }
        sync.in_flight.reset()?;

        let extent = res.swapchain.extent();
        let seconds = self.frame.elapsed_seconds();
        res.uniforms[image].write(&Mvp::at(seconds, extent.width, extent.height));

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let cmd = res.command_buffers.get(image);
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: signal_semaphores.as_ptr(),
            ..Default::default()
        };
        if let Err(result) = self.device.queue_submit(&submit, sync.in_flight.handle()) {
            error!("vkQueueSubmit failed: {}", result_name(result));
            return Err(VkError::Backend {
                context: "vkQueueSubmit",
                result,
            });
        }

        let swapchains = [res.swapchain.handle()];
        let indices = [image_index];
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: signal_semaphores.as_ptr(),
            swapchain_count: 1,
            p_swapchains: swapchains.as_ptr(),
            p_image_indices: indices.as_ptr(),
            ..Default::default()
        };
        let stale = match self.device.queue_present(&present) {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(result) => {
                error!("vkQueuePresentKHR failed: {}", result_name(result));
                return Err(VkError::Backend {
                    context: "vkQueuePresentKHR",
                    result,
                });
            }
        };

        self.frame.advance();
        if stale || self.resize_pending {
            self.recreate_swapchain()?;
        }
        Ok(())
    }
}

impl<I: InstanceApi> Drop for VulkanRenderer<I> {
    fn drop(&mut self) {
        if let Err(e) = self.device.device_wait_idle() {
            error!("vkDeviceWaitIdle on shutdown: {}", result_name(e));
        }
    }
}
