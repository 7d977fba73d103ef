// SPDX-License-Identifier: CEPL-1.0
//! Transform helpers for the renderer's per-frame uniform data.
//!
//! Everything is right-handed with +Z up. Projection matrices target Vulkan
//! clip space: depth in `0..1` and Y pointing down, so the Y axis is flipped
//! here instead of in the viewport.

pub use glam::{Mat4, Vec3};

use bytemuck::{Pod, Zeroable};

/// Degrees of rotation applied to the model per second.
pub const MODEL_DEGREES_PER_SECOND: f32 = 90.0;

pub fn model_rotation(seconds: f32) -> Mat4 {
    Mat4::from_rotation_z((seconds * MODEL_DEGREES_PER_SECOND).to_radians())
}

pub fn look_at_view() -> Mat4 {
    Mat4::look_at_rh(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z)
}

pub fn vulkan_perspective(fovy_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fovy_radians, aspect, near, far);
    proj.y_axis.y *= -1.0;
    proj
}

/// Model/view/projection triple laid out for a std140 uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Mvp {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl Mvp {
    /// Transforms for `seconds` after the first frame on a `width`x`height` target.
    pub fn at(seconds: f32, width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            model: model_rotation(seconds).to_cols_array_2d(),
            view: look_at_view().to_cols_array_2d(),
            proj: vulkan_perspective(45f32.to_radians(), aspect, 0.1, 10.0).to_cols_array_2d(),
        }
    }
}

impl Default for Mvp {
    fn default() -> Self {
        let id = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model: id,
            view: id,
            proj: id,
        }
    }
}
