// SPDX-License-Identifier: CEPL-1.0
//! Vulkan renderer for Floe.
//!
//! [`VkRenderer`] is the renderer over the real driver. The renderer logic
//! itself lives in [`VulkanRenderer`], generic over the [`backend`] traits.

pub mod ash_backend;
pub mod assets;
pub mod backend;
pub mod commands;
pub mod device;
pub mod error;
pub mod extensions;
pub mod frame;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod uniform;

#[cfg(test)]
mod mock;

pub use ash_backend::{AshDevice, AshInstance};
pub use error::{RenderResult, VkError};
pub use renderer::VulkanRenderer;

use anyhow::{Context, Result};
use assets::DirectoryAssets;
use extensions::{required_device_extensions, SurfaceKind};
use floe_render::{RenderConfig, RenderSize, Renderer as FloeRenderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::warn;

pub type VkRenderer = VulkanRenderer<AshInstance>;

impl FloeRenderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &RenderConfig,
    ) -> Result<Self> {
        let kind = SurfaceKind::from_display(display.display_handle()?.as_raw())?;
        let instance = AshInstance::new(window, display, kind, config.validation)
            .context("failed to create Vulkan instance and surface")?;
        let assets = DirectoryAssets::new(&config.asset_root);
        let renderer = VulkanRenderer::with_instance(
            instance,
            &required_device_extensions(kind),
            size,
            config,
            &assets,
        )
        .context("failed to initialize Vulkan renderer")?;
        Ok(renderer)
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        VulkanRenderer::resize(self, size);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.draw_frame().context("failed to draw frame")
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        if let Err(e) = VulkanRenderer::set_clear_color(self, rgba) {
            warn!("clear color not applied: {e}");
        }
    }

    fn set_vsync(&mut self, on: bool) {
        VulkanRenderer::set_vsync(self, on);
    }
}
