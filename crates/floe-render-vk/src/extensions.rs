// SPDX-License-Identifier: CEPL-1.0
//! Instance extension/layer negotiation and the per-platform surface provider.

use crate::error::{RenderResult, VkError};
use raw_window_handle::{HandleError, RawDisplayHandle};
use std::ffi::CStr;
use tracing::{debug, warn};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtensionRequest {
    pub name: &'static CStr,
    pub required: bool,
}

impl ExtensionRequest {
    pub const fn required(name: &'static CStr) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static CStr) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Keeps the requested entries the loader offers, in request order.
///
/// A missing required entry fails the whole negotiation; a missing optional
/// one is logged and dropped.
pub fn negotiate(
    kind: &'static str,
    requested: &[ExtensionRequest],
    available: &[&CStr],
) -> RenderResult<Vec<&'static CStr>> {
    let mut enabled = Vec::with_capacity(requested.len());
    for req in requested {
        if enabled.contains(&req.name) {
            continue;
        }
        if available.contains(&req.name) {
            debug!("enable {kind} {:?}", req.name);
            enabled.push(req.name);
        } else if req.required {
            return Err(VkError::MissingExtension {
                kind,
                name: req.name.to_string_lossy().into_owned(),
            });
        } else {
            warn!("optional {kind} {:?} not available, skipping", req.name);
        }
    }
    Ok(enabled)
}

/// Window system the surface is created for. Picked once from the display handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    Wayland,
    Xlib,
    Xcb,
    Win32,
    Metal,
    Android,
}

impl SurfaceKind {
    pub fn from_display(raw: RawDisplayHandle) -> RenderResult<Self> {
        Ok(match raw {
            RawDisplayHandle::Wayland(_) => SurfaceKind::Wayland,
            RawDisplayHandle::Xlib(_) => SurfaceKind::Xlib,
            RawDisplayHandle::Xcb(_) => SurfaceKind::Xcb,
            RawDisplayHandle::Windows(_) => SurfaceKind::Win32,
            RawDisplayHandle::AppKit(_) | RawDisplayHandle::UiKit(_) => SurfaceKind::Metal,
            RawDisplayHandle::Android(_) => SurfaceKind::Android,
            _ => return Err(VkError::Handle(HandleError::NotSupported)),
        })
    }

    pub fn extension(self) -> &'static CStr {
        match self {
            SurfaceKind::Wayland => ash::khr::wayland_surface::NAME,
            SurfaceKind::Xlib => ash::khr::xlib_surface::NAME,
            SurfaceKind::Xcb => ash::khr::xcb_surface::NAME,
            SurfaceKind::Win32 => ash::khr::win32_surface::NAME,
            SurfaceKind::Metal => ash::ext::metal_surface::NAME,
            SurfaceKind::Android => ash::khr::android_surface::NAME,
        }
    }

    /// Vulkan on Apple platforms runs through a portability driver.
    pub fn needs_portability(self) -> bool {
        matches!(self, SurfaceKind::Metal)
    }
}

pub fn instance_extension_requests(kind: SurfaceKind, validation: bool) -> Vec<ExtensionRequest> {
    let mut requests = vec![
        ExtensionRequest::required(ash::khr::surface::NAME),
        ExtensionRequest::required(kind.extension()),
    ];
    if kind.needs_portability() {
        requests.push(ExtensionRequest::required(
            ash::khr::portability_enumeration::NAME,
        ));
        requests.push(ExtensionRequest::required(
            ash::khr::get_physical_device_properties2::NAME,
        ));
    }
    if validation {
        requests.push(ExtensionRequest::optional(ash::ext::debug_utils::NAME));
    }
    requests
}

pub fn instance_layer_requests(validation: bool) -> Vec<ExtensionRequest> {
    if validation {
        vec![ExtensionRequest::optional(VALIDATION_LAYER)]
    } else {
        Vec::new()
    }
}

/// Device extensions a candidate must expose; nothing is optional here.
pub fn required_device_extensions(kind: SurfaceKind) -> Vec<&'static CStr> {
    let mut exts = vec![ash::khr::swapchain::NAME];
    if kind.needs_portability() {
        exts.push(ash::khr::portability_subset::NAME);
    }
    exts
}
