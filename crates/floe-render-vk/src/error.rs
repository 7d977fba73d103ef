// SPDX-License-Identifier: CEPL-1.0
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::HandleError;
use std::path::PathBuf;
use thiserror::Error;

pub type RenderResult<T> = Result<T, VkError>;

#[derive(Debug, Error)]
pub enum VkError {
    /// A backend call returned a non-success code.
    #[error("{context} failed: {} ({})", result_name(*result), result_description(*result))]
    Backend {
        context: &'static str,
        result: vk::Result,
    },
    #[error("required {kind} `{name}` is not available")]
    MissingExtension { kind: &'static str, name: String },
    #[error("no Vulkan physical devices found")]
    NoPhysicalDevice,
    #[error("no physical device can render and present to this surface")]
    NoSuitableDevice,
    #[error("no memory type matches bits {type_bits:#b} with {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },
    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image `{}`", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("window handle unavailable: {0}")]
    Handle(#[from] HandleError),
}

impl VkError {
    pub fn backend_result(&self) -> Option<vk::Result> {
        match self {
            VkError::Backend { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Attaches the failing entry point to a raw backend result.
pub trait ResultExt<T> {
    fn ctx(self, context: &'static str) -> RenderResult<T>;
}

impl<T> ResultExt<T> for VkResult<T> {
    #[inline]
    fn ctx(self, context: &'static str) -> RenderResult<T> {
        self.map_err(|result| VkError::Backend { context, result })
    }
}

/// Symbolic `VK_*` name and a short description for the result codes this
/// renderer can run into.
fn result_info(r: vk::Result) -> (&'static str, &'static str) {
    match r {
        vk::Result::SUCCESS => ("VK_SUCCESS", "command successfully completed"),
        vk::Result::NOT_READY => ("VK_NOT_READY", "a fence or query has not yet completed"),
        vk::Result::TIMEOUT => (
            "VK_TIMEOUT",
            "a wait operation has not completed in the specified time",
        ),
        vk::Result::SUBOPTIMAL_KHR => (
            "VK_SUBOPTIMAL_KHR",
            "the swapchain no longer matches the surface properties exactly",
        ),
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => (
            "VK_ERROR_OUT_OF_HOST_MEMORY",
            "a host memory allocation has failed",
        ),
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => (
            "VK_ERROR_OUT_OF_DEVICE_MEMORY",
            "a device memory allocation has failed",
        ),
        vk::Result::ERROR_INITIALIZATION_FAILED => (
            "VK_ERROR_INITIALIZATION_FAILED",
            "initialization of an object could not be completed",
        ),
        vk::Result::ERROR_DEVICE_LOST => (
            "VK_ERROR_DEVICE_LOST",
            "the logical or physical device has been lost",
        ),
        vk::Result::ERROR_MEMORY_MAP_FAILED => (
            "VK_ERROR_MEMORY_MAP_FAILED",
            "mapping of a memory object has failed",
        ),
        vk::Result::ERROR_LAYER_NOT_PRESENT => (
            "VK_ERROR_LAYER_NOT_PRESENT",
            "a requested layer is not present or could not be loaded",
        ),
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => (
            "VK_ERROR_EXTENSION_NOT_PRESENT",
            "a requested extension is not supported",
        ),
        vk::Result::ERROR_FEATURE_NOT_PRESENT => (
            "VK_ERROR_FEATURE_NOT_PRESENT",
            "a requested feature is not supported",
        ),
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => (
            "VK_ERROR_INCOMPATIBLE_DRIVER",
            "the requested Vulkan version is not supported by the driver",
        ),
        vk::Result::ERROR_TOO_MANY_OBJECTS => (
            "VK_ERROR_TOO_MANY_OBJECTS",
            "too many objects of the type have already been created",
        ),
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => (
            "VK_ERROR_FORMAT_NOT_SUPPORTED",
            "a requested format is not supported on this device",
        ),
        vk::Result::ERROR_SURFACE_LOST_KHR => (
            "VK_ERROR_SURFACE_LOST_KHR",
            "the surface is no longer available",
        ),
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => (
            "VK_ERROR_NATIVE_WINDOW_IN_USE_KHR",
            "the native window is already in use",
        ),
        vk::Result::ERROR_OUT_OF_DATE_KHR => (
            "VK_ERROR_OUT_OF_DATE_KHR",
            "the surface has changed and the swapchain must be recreated",
        ),
        vk::Result::ERROR_VALIDATION_FAILED_EXT => (
            "VK_ERROR_VALIDATION_FAILED_EXT",
            "a command failed validation",
        ),
        _ => ("VK_RESULT_UNKNOWN", "unrecognized result code"),
    }
}

/// Symbolic `VK_*` name of a result code.
pub fn result_name(r: vk::Result) -> &'static str {
    result_info(r).0
}

/// Human-readable description of a result code.
pub fn result_description(r: vk::Result) -> &'static str {
    result_info(r).1
}
