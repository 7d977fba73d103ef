// SPDX-License-Identifier: CEPL-1.0
//! Owning wrappers for handle + memory pairs.
//!
//! Each value releases its handle and then its memory on drop. Construction
//! fills the memory in after the handle exists, so a failure half way still
//! releases whatever was created.

use crate::backend::DeviceApi;
use crate::commands::CommandPool;
use crate::error::{RenderResult, ResultExt, VkError};
use ash::vk;
use std::sync::Arc;

pub const HOST_VISIBLE_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Index of the first memory type allowed by `type_bits` that has all of `flags`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    (0..props.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && props.memory_types[i as usize].property_flags.contains(flags)
        })
        .ok_or(VkError::NoMemoryType { type_bits, flags })
}

fn allocate<D: DeviceApi>(
    device: &D,
    req: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> RenderResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(device.memory_properties(), req.memory_type_bits, flags)?;
    let info = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    device.allocate_memory(&info).ctx("vkAllocateMemory")
}

pub struct Buffer<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl<D: DeviceApi> Buffer<D> {
    pub fn new(
        device: &Arc<D>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        flags: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = device.create_buffer(&info).ctx("vkCreateBuffer")?;
        let mut buffer = Self {
            device: device.clone(),
            handle,
            memory: vk::DeviceMemory::null(),
            size,
        };

        let req = device.buffer_memory_requirements(handle);
        buffer.memory = allocate(&**device, req, flags)?;
        device
            .bind_buffer_memory(handle, buffer.memory)
            .ctx("vkBindBufferMemory")?;
        Ok(buffer)
    }

    /// Host-visible, coherent buffer holding `bytes`.
    pub fn with_data(
        device: &Arc<D>,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> RenderResult<Self> {
        let buffer = Self::new(device, bytes.len() as u64, usage, HOST_VISIBLE_COHERENT)?;
        buffer.write(bytes)?;
        Ok(buffer)
    }

    /// Device-local copy of `bytes`, uploaded through a staging buffer.
    pub fn device_local(
        device: &Arc<D>,
        pool: &CommandPool<D>,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> RenderResult<Self> {
        let staging = Self::with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, bytes)?;
        let buffer = Self::new(
            device,
            staging.size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        pool.submit_once(|d, cmd| d.cmd_copy_buffer(cmd, staging.handle, buffer.handle, staging.size))?;
        Ok(buffer)
    }

    /// Memory must be host visible.
    pub fn write(&self, bytes: &[u8]) -> RenderResult<()> {
        debug_assert!(bytes.len() as u64 <= self.size);
        self.device
            .write_memory(self.memory, 0, bytes)
            .ctx("vkMapMemory")
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl<D: DeviceApi> Drop for Buffer<D> {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.handle);
        if self.memory != vk::DeviceMemory::null() {
            self.device.free_memory(self.memory);
        }
    }
}

/// Single-mip, single-layer 2D image with its own memory.
pub struct Image<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl<D: DeviceApi> Image<D> {
    pub fn new(
        device: &Arc<D>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        flags: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let handle = device.create_image(&info).ctx("vkCreateImage")?;
        let mut image = Self {
            device: device.clone(),
            handle,
            memory: vk::DeviceMemory::null(),
            format,
            extent,
        };

        let req = device.image_memory_requirements(handle);
        image.memory = allocate(&**device, req, flags)?;
        device
            .bind_image_memory(handle, image.memory)
            .ctx("vkBindImageMemory")?;
        Ok(image)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl<D: DeviceApi> Drop for Image<D> {
    fn drop(&mut self) {
        self.device.destroy_image(self.handle);
        if self.memory != vk::DeviceMemory::null() {
            self.device.free_memory(self.memory);
        }
    }
}

pub struct ImageView<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::ImageView,
}

impl<D: DeviceApi> ImageView<D> {
    pub fn new(
        device: &Arc<D>,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> RenderResult<Self> {
        let handle = create_view(&**device, image, format, aspect_mask)?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl<D: DeviceApi> Drop for ImageView<D> {
    fn drop(&mut self) {
        self.device.destroy_image_view(self.handle);
    }
}

pub(crate) fn create_view<D: DeviceApi>(
    device: &D,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> RenderResult<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device.create_image_view(&info).ctx("vkCreateImageView")
}

/// Depth attachment sized to the swapchain extent.
pub struct DepthBuffer<D: DeviceApi> {
    // view before image
    view: ImageView<D>,
    image: Image<D>,
}

impl<D: DeviceApi> DepthBuffer<D> {
    pub fn new(device: &Arc<D>, extent: vk::Extent2D, format: vk::Format) -> RenderResult<Self> {
        let image = Image::new(
            device,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let view = ImageView::new(device, image.handle(), format, vk::ImageAspectFlags::DEPTH)?;
        Ok(Self { view, image })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}

/// Prefer 32f, then 24+S8, then 32f+S8. Falls back to D32_SFLOAT.
pub fn pick_depth_format(supports: impl Fn(vk::Format) -> bool) -> vk::Format {
    [
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT,
    ]
    .into_iter()
    .find(|&f| supports(f))
    .unwrap_or(vk::Format::D32_SFLOAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_device;

    fn props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut p = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in p.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        p
    }

    #[test]
    fn memory_type_honours_filter_and_flags() {
        let p = props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST_VISIBLE_COHERENT,
            HOST_VISIBLE_COHERENT | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        assert_eq!(find_memory_type(&p, 0b111, HOST_VISIBLE_COHERENT).unwrap(), 1);
        assert_eq!(find_memory_type(&p, 0b100, HOST_VISIBLE_COHERENT).unwrap(), 2);
        assert_eq!(
            find_memory_type(&p, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert!(matches!(
            find_memory_type(&p, 0b001, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Err(VkError::NoMemoryType { type_bits: 1, .. })
        ));
    }

    #[test]
    fn staged_upload_copies_and_drops_staging() {
        let (device, state) = mock_device();
        let pool = CommandPool::new(&device, 0).unwrap();
        state.clear_calls();

        let data = [7u8; 64];
        let buffer =
            Buffer::device_local(&device, &pool, vk::BufferUsageFlags::VERTEX_BUFFER, &data)
                .unwrap();
        assert_eq!(buffer.size(), 64);
        assert_eq!(state.count("cmd_copy_buffer"), 1);
        assert_eq!(state.count("write_memory"), 1);
        assert_eq!(state.bytes_written(), 64);
        // staging buffer already gone
        assert_eq!(state.live_count("create_buffer"), 1);
        assert_eq!(state.live_count("allocate_memory"), 1);

        drop(buffer);
        drop(pool);
        assert!(state.live().is_empty());
    }

    #[test]
    fn buffer_frees_memory_after_handle() {
        let (device, state) = mock_device();
        let buffer = Buffer::new(
            &device,
            128,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            HOST_VISIBLE_COHERENT,
        )
        .unwrap();
        state.clear_calls();
        drop(buffer);
        assert_eq!(state.calls(), ["destroy_buffer", "free_memory"]);
    }

    #[test]
    fn depth_buffer_releases_view_then_image() {
        let (device, state) = mock_device();
        let depth = DepthBuffer::new(
            &device,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            vk::Format::D32_SFLOAT,
        )
        .unwrap();
        assert_eq!(depth.format(), vk::Format::D32_SFLOAT);
        state.clear_calls();
        drop(depth);
        assert_eq!(
            state.calls(),
            ["destroy_image_view", "destroy_image", "free_memory"]
        );
    }

    #[test]
    fn depth_format_falls_back_in_order() {
        assert_eq!(pick_depth_format(|_| true), vk::Format::D32_SFLOAT);
        assert_eq!(
            pick_depth_format(|f| f == vk::Format::D24_UNORM_S8_UINT),
            vk::Format::D24_UNORM_S8_UINT
        );
        assert_eq!(pick_depth_format(|_| false), vk::Format::D32_SFLOAT);
    }
}
