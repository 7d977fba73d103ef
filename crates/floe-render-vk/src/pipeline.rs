// SPDX-License-Identifier: CEPL-1.0
//! Render pass, descriptor layout, graphics pipeline and framebuffers.
//!
//! The render pass and pipeline bake in the swapchain format and extent
//! (static viewport/scissor), so both are rebuilt with the swapchain. The
//! descriptor set layout does not depend on the swapchain.

use crate::assets::ShaderCode;
use crate::backend::DeviceApi;
use crate::error::{RenderResult, ResultExt};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 5] {
        let attr = |location, format, offset: usize| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };
        [
            attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, pos)),
            attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
            attr(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attr(3, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
            attr(4, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, tangent)),
        ]
    }
}

const fn quad_vertex(x: f32, y: f32, z: f32, color: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex {
        pos: [x, y, z],
        color,
        normal: [0.0, 0.0, 1.0],
        uv,
        tangent: [1.0, 0.0, 0.0],
    }
}

/// Two stacked quads in the XY plane; the lower one exercises the depth test.
pub const MESH_VERTICES: &[Vertex] = &[
    quad_vertex(-0.5, -0.5, 0.0, [1.0, 0.3, 0.3], [1.0, 0.0]),
    quad_vertex(0.5, -0.5, 0.0, [0.3, 1.0, 0.3], [0.0, 0.0]),
    quad_vertex(0.5, 0.5, 0.0, [0.3, 0.3, 1.0], [0.0, 1.0]),
    quad_vertex(-0.5, 0.5, 0.0, [1.0, 1.0, 1.0], [1.0, 1.0]),
    quad_vertex(-0.5, -0.5, -0.5, [1.0, 0.3, 0.3], [1.0, 0.0]),
    quad_vertex(0.5, -0.5, -0.5, [0.3, 1.0, 0.3], [0.0, 0.0]),
    quad_vertex(0.5, 0.5, -0.5, [0.3, 0.3, 1.0], [0.0, 1.0]),
    quad_vertex(-0.5, 0.5, -0.5, [1.0, 1.0, 1.0], [1.0, 1.0]),
];
pub const MESH_INDICES: &[u32] = &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4];

pub struct DescriptorSetLayout<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::DescriptorSetLayout,
}

impl<D: DeviceApi> DescriptorSetLayout<D> {
    /// binding 0: transforms (vertex), binding 1: albedo sampler (fragment).
    pub fn new(device: &Arc<D>) -> RenderResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::VERTEX,
                ..Default::default()
            },
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            },
        ];
        let info = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: bindings.len() as u32,
            p_bindings: bindings.as_ptr(),
            ..Default::default()
        };
        let handle = device
            .create_descriptor_set_layout(&info)
            .ctx("vkCreateDescriptorSetLayout")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl<D: DeviceApi> Drop for DescriptorSetLayout<D> {
    fn drop(&mut self) {
        self.device.destroy_descriptor_set_layout(self.handle);
    }
}

pub struct RenderPass<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::RenderPass,
}

impl<D: DeviceApi> RenderPass<D> {
    /// One subpass: color cleared and left ready for present, depth cleared
    /// and discarded.
    pub fn new(
        device: &Arc<D>,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RenderResult<Self> {
        let attachments = [
            vk::AttachmentDescription {
                format: color_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            vk::AttachmentDescription {
                format: depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            p_depth_stencil_attachment: &depth_ref,
            ..Default::default()
        };
        // Wait for the acquired image (and the previous depth use) before writing.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        let handle = device
            .create_render_pass(&info)
            .ctx("vkCreateRenderPass")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}

impl<D: DeviceApi> Drop for RenderPass<D> {
    fn drop(&mut self) {
        self.device.destroy_render_pass(self.handle);
    }
}

struct ShaderModule<'a, D: DeviceApi> {
    device: &'a D,
    handle: vk::ShaderModule,
}

impl<'a, D: DeviceApi> ShaderModule<'a, D> {
    fn new(device: &'a D, code: &[u32]) -> RenderResult<Self> {
        let handle = device
            .create_shader_module(code)
            .ctx("vkCreateShaderModule")?;
        Ok(Self { device, handle })
    }
}

impl<D: DeviceApi> Drop for ShaderModule<'_, D> {
    fn drop(&mut self) {
        self.device.destroy_shader_module(self.handle);
    }
}

pub struct GraphicsPipeline<D: DeviceApi> {
    device: Arc<D>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl<D: DeviceApi> GraphicsPipeline<D> {
    pub fn new(
        device: &Arc<D>,
        render_pass: &RenderPass<D>,
        set_layout: &DescriptorSetLayout<D>,
        extent: vk::Extent2D,
        shaders: &ShaderCode,
    ) -> RenderResult<Self> {
        // --- Pipeline layout (set 0 = transforms + albedo) ---
        let set_layout = set_layout.handle();
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            ..Default::default()
        };
        let layout = device
            .create_pipeline_layout(&layout_info)
            .ctx("vkCreatePipelineLayout")?;
        let mut this = Self {
            device: device.clone(),
            pipeline: vk::Pipeline::null(),
            layout,
        };

        // --- Shader modules, released when this function returns ---
        let vs = ShaderModule::new(&**device, &shaders.vertex)?;
        let fs = ShaderModule::new(&**device, &shaders.fragment)?;
        let entry = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs.handle,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs.handle,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
        ];

        // --- Fixed-function state ---
        let binding = Vertex::binding_description();
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };
        // Static viewport/scissor; the pipeline is rebuilt on resize anyway.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };
        // No culling: the quads are seen from both sides while spinning.
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            layout,
            render_pass: render_pass.handle(),
            subpass: 0,
            ..Default::default()
        };
        this.pipeline = device
            .create_graphics_pipeline(&info)
            .ctx("vkCreateGraphicsPipelines")?;
        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl<D: DeviceApi> Drop for GraphicsPipeline<D> {
    fn drop(&mut self) {
        if self.pipeline != vk::Pipeline::null() {
            self.device.destroy_pipeline(self.pipeline);
        }
        self.device.destroy_pipeline_layout(self.layout);
    }
}

/// One framebuffer per swapchain view, all sharing the depth attachment.
pub struct Framebuffers<D: DeviceApi> {
    device: Arc<D>,
    handles: Vec<vk::Framebuffer>,
}

impl<D: DeviceApi> Framebuffers<D> {
    pub fn new(
        device: &Arc<D>,
        render_pass: &RenderPass<D>,
        views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        let mut fbs = Self {
            device: device.clone(),
            handles: Vec::with_capacity(views.len()),
        };
        for &view in views {
            let attachments = [view, depth_view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: render_pass.handle(),
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = device
                .create_framebuffer(&info)
                .ctx("vkCreateFramebuffer")?;
            fbs.handles.push(fb);
        }
        Ok(fbs)
    }

    #[inline]
    pub fn get(&self, index: usize) -> vk::Framebuffer {
        self.handles[index]
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<D: DeviceApi> Drop for Framebuffers<D> {
    fn drop(&mut self) {
        for &fb in &self.handles {
            self.device.destroy_framebuffer(fb);
        }
    }
}
