// SPDX-License-Identifier: CEPL-1.0
use crate::backend::{DeviceApi, InstanceApi};
use crate::error::{RenderResult, ResultExt};
use crate::resources::create_view;
use ash::vk;
use floe_render::{RenderSize, VsyncMode};
use std::sync::Arc;
use tracing::info;

/// How the caller wants frames paced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentPreference {
    pub vsync: bool,
    pub mode: VsyncMode,
}

fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM_PACK32",
        _ => "OTHER",
    }
}

fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

/// `B8G8R8A8_SRGB` + sRGB non-linear when offered, else whatever comes first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    debug_assert!(!formats.is_empty());
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// FIFO is always available, so it is the last resort for every preference.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    pref: PresentPreference,
) -> vk::PresentModeKHR {
    let order: &[vk::PresentModeKHR] = if !pref.vsync {
        &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
    } else {
        match pref.mode {
            VsyncMode::Mailbox => &[vk::PresentModeKHR::MAILBOX],
            VsyncMode::Fifo => &[],
        }
    };
    order
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's extent, or the window size clamped into bounds when the
/// surface leaves it to us (`current_extent.width == u32::MAX`).
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 == "no max").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// Swapchain, its images and one view per image.
pub struct Swapchain<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl<D: DeviceApi> Swapchain<D> {
    /// Builds a fresh swapchain. Any previous one must already be destroyed.
    pub fn create<I>(
        instance: &I,
        device: &Arc<D>,
        physical: vk::PhysicalDevice,
        size: RenderSize,
        pref: PresentPreference,
    ) -> RenderResult<Self>
    where
        I: InstanceApi<Device = D>,
    {
        // --- Query surface capabilities / formats / present modes ---
        let caps = instance
            .surface_capabilities(physical)
            .ctx("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let formats = instance
            .surface_formats(physical)
            .ctx("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let modes = instance
            .present_modes(physical)
            .ctx("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        let format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&modes, pref);
        let extent = choose_extent(&caps, size);
        let min_image_count = choose_image_count(&caps);

        info!(
            "swapchain: format {} / {:?}, present_mode {}, vsync={}, extent {}x{}, images(min={} → picked={})",
            fmt_name(format.format),
            format.color_space,
            pm_name(present_mode),
            pref.vsync,
            extent.width,
            extent.height,
            caps.min_image_count,
            min_image_count,
        );

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: instance.surface(),
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE, // single queue family
            pre_transform: choose_pre_transform(&caps),
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        let handle = device
            .create_swapchain(&info)
            .ctx("vkCreateSwapchainKHR")?;
        let mut swapchain = Self {
            device: device.clone(),
            handle,
            images: Vec::new(),
            views: Vec::new(),
            format,
            extent,
            present_mode,
        };

        swapchain.images = device
            .swapchain_images(handle)
            .ctx("vkGetSwapchainImagesKHR")?;
        for &image in &swapchain.images {
            let view = create_view(&**device, image, format.format, vk::ImageAspectFlags::COLOR)?;
            swapchain.views.push(view);
        }
        Ok(swapchain)
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}

impl<D: DeviceApi> Drop for Swapchain<D> {
    fn drop(&mut self) {
        for &view in &self.views {
            self.device.destroy_image_view(view);
        }
        self.device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInstance, MockPhysical};

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..MockInstance::new(Vec::new()).caps
        }
    }

    const MAILBOX: PresentPreference = PresentPreference {
        vsync: true,
        mode: VsyncMode::Mailbox,
    };

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(2, 2)), 2);
        assert_eq!(choose_image_count(&caps(3, 0)), 4);
    }

    #[test]
    fn prefers_srgb_bgra_else_first() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb]), srgb);
        assert_eq!(choose_surface_format(&[unorm]), unorm);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::MAILBOX], MAILBOX), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::FIFO], MAILBOX), P::FIFO);

        let fifo = PresentPreference {
            vsync: true,
            mode: VsyncMode::Fifo,
        };
        assert_eq!(choose_present_mode(&[P::MAILBOX, P::FIFO], fifo), P::FIFO);

        let uncapped = PresentPreference {
            vsync: false,
            mode: VsyncMode::Mailbox,
        };
        assert_eq!(
            choose_present_mode(&[P::FIFO, P::MAILBOX, P::IMMEDIATE], uncapped),
            P::IMMEDIATE
        );
        assert_eq!(choose_present_mode(&[P::FIFO], uncapped), P::FIFO);
    }

    #[test]
    fn extent_follows_surface_or_clamps_window() {
        let mut c = caps(2, 8);
        c.min_image_extent = vk::Extent2D {
            width: 100,
            height: 100,
        };
        c.max_image_extent = vk::Extent2D {
            width: 1000,
            height: 1000,
        };
        let e = choose_extent(&c, RenderSize::new(4000, 50));
        assert_eq!((e.width, e.height), (1000, 100));

        c.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let e = choose_extent(&c, RenderSize::new(800, 600));
        assert_eq!((e.width, e.height), (640, 480));
    }

    #[test]
    fn create_builds_one_view_per_image_and_releases_them() {
        let instance = MockInstance::new(vec![MockPhysical::capable("gpu")]);
        let state = instance.state();
        let pd = instance.enumerate_physical_devices().unwrap()[0];
        let device = Arc::new(instance.create_device(pd, 0, &[]).unwrap());

        let sc = Swapchain::create(&instance, &device, pd, RenderSize::new(800, 600), MAILBOX)
            .unwrap();
        assert_eq!(sc.image_count(), 3);
        assert_eq!(sc.views().len(), 3);
        assert_eq!(sc.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(sc.extent().width, 800);
        assert_eq!(state.swapchains()[0].old_swapchain, vk::SwapchainKHR::null());

        drop(sc);
        assert!(state.live().is_empty());
    }
}
