// SPDX-License-Identifier: CEPL-1.0
//! Shader bytecode and texture loading.
//!
//! Layout below the asset root:
//! - `shader/<name>.spv`: SPIR-V modules
//! - `textures/<name>`: any format the `image` crate decodes

use crate::error::{RenderResult, VkError};
use ash::util::read_spv;
use floe_render::{RenderConfig, ShaderSource};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static EMBEDDED_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/vert.spv"));
static EMBEDDED_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/frag.spv"));

/// Decoded texture, tightly packed 8-bit RGBA.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// `size`x`size` texels alternating between two greys every `cell` texels.
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if ((x / cell) + (y / cell)) % 2 == 0 { 235 } else { 60 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }
}

pub trait AssetSource {
    fn shader(&self, name: &str) -> RenderResult<Vec<u32>>;
    fn texture(&self, name: &str) -> RenderResult<TextureData>;
}

pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn shader_path(&self, name: &str) -> PathBuf {
        self.root.join("shader").join(format!("{name}.spv"))
    }

    pub fn texture_path(&self, name: &str) -> PathBuf {
        self.root.join("textures").join(name)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> VkError + '_ {
    move |source| VkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl AssetSource for DirectoryAssets {
    fn shader(&self, name: &str) -> RenderResult<Vec<u32>> {
        let path = self.shader_path(name);
        let bytes = std::fs::read(&path).map_err(io_err(&path))?;
        let code = read_spv(&mut Cursor::new(&bytes[..])).map_err(io_err(&path))?;
        debug!("loaded {} ({} words)", path.display(), code.len());
        Ok(code)
    }

    fn texture(&self, name: &str) -> RenderResult<TextureData> {
        let path = self.texture_path(name);
        let decoded = image::open(&path).map_err(|source| match source {
            image::ImageError::IoError(source) => VkError::Io {
                path: path.clone(),
                source,
            },
            source => VkError::Image {
                path: path.clone(),
                source,
            },
        })?;
        let rgba = decoded.to_rgba8();
        debug!(
            "loaded {} ({}x{})",
            path.display(),
            rgba.width(),
            rgba.height()
        );
        Ok(TextureData {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// SPIR-V for the two pipeline stages.
#[derive(Clone, Debug)]
pub struct ShaderCode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderCode {
    pub fn embedded() -> RenderResult<Self> {
        let embedded = |bytes: &[u8], name: &str| {
            read_spv(&mut Cursor::new(bytes)).map_err(|source| VkError::Io {
                path: PathBuf::from(format!("<embedded>/{name}")),
                source,
            })
        };
        Ok(Self {
            vertex: embedded(EMBEDDED_VERT, "vert.spv")?,
            fragment: embedded(EMBEDDED_FRAG, "frag.spv")?,
        })
    }

    pub fn load(config: &RenderConfig, assets: &dyn AssetSource) -> RenderResult<Self> {
        match config.shader_source {
            ShaderSource::Embedded => Self::embedded(),
            ShaderSource::Assets => {
                info!(
                    "loading shaders `{}` / `{}` from assets",
                    config.vertex_shader, config.fragment_shader
                );
                Ok(Self {
                    vertex: assets.shader(&config.vertex_shader)?,
                    fragment: assets.shader(&config.fragment_shader)?,
                })
            }
        }
    }
}

/// The configured texture, or a generated checkerboard when none is set.
pub fn load_texture(config: &RenderConfig, assets: &dyn AssetSource) -> RenderResult<TextureData> {
    match &config.texture {
        Some(name) => assets.texture(name),
        None => Ok(TextureData::checkerboard(256, 32)),
    }
}
