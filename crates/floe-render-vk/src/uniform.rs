// SPDX-License-Identifier: CEPL-1.0
use crate::backend::DeviceApi;
use crate::error::{RenderResult, ResultExt};
use crate::pipeline::DescriptorSetLayout;
use crate::resources::{Buffer, HOST_VISIBLE_COHERENT};
use crate::texture::Texture;
use ash::vk;
use floe_math::Mvp;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::Arc;

/// Host-visible buffer holding one image's transforms, mapped for its whole
/// lifetime.
pub struct UniformBuffer<D: DeviceApi> {
    device: Arc<D>,
    buffer: Buffer<D>,
    mapped: NonNull<u8>,
}

impl<D: DeviceApi> UniformBuffer<D> {
    pub fn new(device: &Arc<D>) -> RenderResult<Self> {
        let buffer = Buffer::new(
            device,
            size_of::<Mvp>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            HOST_VISIBLE_COHERENT,
        )?;
        let mapped = device
            .map_memory(buffer.memory(), buffer.size())
            .ctx("vkMapMemory")?;
        Ok(Self {
            device: device.clone(),
            buffer,
            mapped,
        })
    }

    /// Coherent memory, so no flush is needed.
    #[inline]
    pub fn write(&self, mvp: &Mvp) {
        let bytes = bytemuck::bytes_of(mvp);
        // SAFETY: the mapping spans size_of::<Mvp>() bytes and lives until drop.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.as_ptr(), bytes.len()) }
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

impl<D: DeviceApi> Drop for UniformBuffer<D> {
    fn drop(&mut self) {
        self.device.unmap_memory(self.buffer.memory());
    }
}

pub fn create_uniform_buffers<D: DeviceApi>(
    device: &Arc<D>,
    count: usize,
) -> RenderResult<Vec<UniformBuffer<D>>> {
    (0..count).map(|_| UniformBuffer::new(device)).collect()
}

/// Descriptor pool plus one set per swapchain image, each pointing at that
/// image's uniform buffer and the shared texture.
pub struct FrameDescriptors<D: DeviceApi> {
    device: Arc<D>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl<D: DeviceApi> FrameDescriptors<D> {
    pub fn new(
        device: &Arc<D>,
        layout: &DescriptorSetLayout<D>,
        uniforms: &[UniformBuffer<D>],
        texture: &Texture<D>,
    ) -> RenderResult<Self> {
        let count = uniforms.len() as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: count,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: count,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = device
            .create_descriptor_pool(&pool_info)
            .ctx("vkCreateDescriptorPool")?;
        let mut this = Self {
            device: device.clone(),
            pool,
            sets: Vec::new(),
        };

        let layouts = vec![layout.handle(); uniforms.len()];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: pool,
            descriptor_set_count: count,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        this.sets = device
            .allocate_descriptor_sets(&alloc)
            .ctx("vkAllocateDescriptorSets")?;

        let image_info = vk::DescriptorImageInfo {
            sampler: texture.sampler(),
            image_view: texture.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        for (&set, uniform) in this.sets.iter().zip(uniforms) {
            let buffer_info = vk::DescriptorBufferInfo {
                buffer: uniform.handle(),
                offset: 0,
                range: size_of::<Mvp>() as vk::DeviceSize,
            };
            let writes = [
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: 0,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    p_buffer_info: &buffer_info,
                    ..Default::default()
                },
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: 1,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    p_image_info: &image_info,
                    ..Default::default()
                },
            ];
            device.update_descriptor_sets(&writes);
        }
        Ok(this)
    }

    #[inline]
    pub fn get(&self, index: usize) -> vk::DescriptorSet {
        self.sets[index]
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl<D: DeviceApi> Drop for FrameDescriptors<D> {
    fn drop(&mut self) {
        // frees the sets too
        self.device.destroy_descriptor_pool(self.pool);
    }
}
