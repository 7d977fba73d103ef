// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be presented then.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Which graphics API backs the renderer. Chosen once, passed into construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderApi {
    #[default]
    Vulkan,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderSource {
    /// SPIR-V compiled into the binary at build time.
    #[default]
    Embedded,
    /// `shader/<name>.spv` below the asset root.
    Assets,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub api: RenderApi,
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub vsync_mode: VsyncMode,
    /// Validation layer + debug messenger. Defaults to on in debug builds.
    pub validation: bool,
    pub asset_root: PathBuf,
    pub shader_source: ShaderSource,
    pub vertex_shader: String,
    pub fragment_shader: String,
    /// File below `<asset_root>/textures/`. A generated checkerboard is used when unset.
    pub texture: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            api: RenderApi::Vulkan,
            clear_color: [0.02, 0.02, 0.04, 1.0],
            vsync: true,
            vsync_mode: VsyncMode::Mailbox,
            validation: cfg!(debug_assertions),
            asset_root: PathBuf::from("."),
            shader_source: ShaderSource::Embedded,
            vertex_shader: "vert".to_owned(),
            fragment_shader: "frag".to_owned(),
            texture: None,
        }
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &RenderConfig,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Records the new drawable size; the swapchain follows on the next frame.
    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self) -> Result<()>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_vsync(&mut self, _on: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_is_empty() {
        assert!(RenderSize::new(0, 600).is_empty());
        assert!(RenderSize::new(800, 0).is_empty());
        assert!(!RenderSize::new(1, 1).is_empty());
    }

    #[test]
    fn default_config_prefers_mailbox_and_embedded_shaders() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.api, RenderApi::Vulkan);
        assert_eq!(cfg.vsync_mode, VsyncMode::Mailbox);
        assert_eq!(cfg.shader_source, ShaderSource::Embedded);
        assert_eq!(cfg.validation, cfg!(debug_assertions));
    }
}
