// SPDX-License-Identifier: CEPL-1.0
use crate::assets::TextureData;
use crate::backend::DeviceApi;
use crate::commands::CommandPool;
use crate::error::{RenderResult, ResultExt};
use crate::resources::{Buffer, Image, ImageView};
use ash::vk;
use std::sync::Arc;
use tracing::debug;

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Layout changes a sampled texture goes through on upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutTransition {
    UndefinedToTransferDst,
    TransferDstToShaderRead,
}

pub struct BarrierMasks {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    pub fn masks(self) -> BarrierMasks {
        match self {
            LayoutTransition::UndefinedToTransferDst => BarrierMasks {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            },
            LayoutTransition::TransferDstToShaderRead => BarrierMasks {
                old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            },
        }
    }

    pub fn record<D: DeviceApi>(self, device: &D, cmd: vk::CommandBuffer, image: vk::Image) {
        let m = self.masks();
        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            src_access_mask: m.src_access,
            dst_access_mask: m.dst_access,
            old_layout: m.old_layout,
            new_layout: m.new_layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        device.cmd_pipeline_barrier(cmd, m.src_stage, m.dst_stage, &barrier);
    }
}

/// Sampled 2D texture: image, view and a linear repeat sampler.
pub struct Texture<D: DeviceApi> {
    device: Arc<D>,
    sampler: vk::Sampler,
    view: ImageView<D>,
    image: Image<D>,
}

impl<D: DeviceApi> Texture<D> {
    pub fn upload(
        device: &Arc<D>,
        pool: &CommandPool<D>,
        data: &TextureData,
    ) -> RenderResult<Self> {
        debug_assert_eq!(
            data.rgba.len(),
            (data.width * data.height * 4) as usize,
            "texture data must be tightly packed RGBA8"
        );
        let extent = vk::Extent2D {
            width: data.width,
            height: data.height,
        };

        let staging = Buffer::with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, &data.rgba)?;
        let image = Image::new(
            device,
            extent,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.submit_once(|d, cmd| {
            LayoutTransition::UndefinedToTransferDst.record(d, cmd, image.handle());
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            };
            d.cmd_copy_buffer_to_image(cmd, staging.handle(), image.handle(), &region);
            LayoutTransition::TransferDstToShaderRead.record(d, cmd, image.handle());
        })?;
        drop(staging);

        let view = ImageView::new(
            device,
            image.handle(),
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
        )?;

        let sampler_info = vk::SamplerCreateInfo {
            s_type: vk::StructureType::SAMPLER_CREATE_INFO,
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            anisotropy_enable: vk::FALSE,
            max_anisotropy: 1.0,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
            unnormalized_coordinates: vk::FALSE,
            compare_enable: vk::FALSE,
            compare_op: vk::CompareOp::ALWAYS,
            ..Default::default()
        };
        let sampler = device
            .create_sampler(&sampler_info)
            .ctx("vkCreateSampler")?;

        debug!("texture uploaded ({}x{})", extent.width, extent.height);
        Ok(Self {
            device: device.clone(),
            sampler,
            view,
            image,
        })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl<D: DeviceApi> Drop for Texture<D> {
    fn drop(&mut self) {
        // view and image follow as fields
        self.device.destroy_sampler(self.sampler);
    }
}
