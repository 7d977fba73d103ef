// SPDX-License-Identifier: CEPL-1.0
use crate::backend::InstanceApi;
use crate::error::{result_name, RenderResult, ResultExt, VkError};
use ash::vk;
use std::ffi::CStr;
use std::fmt;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    /// Used for both graphics and present.
    pub queue_family: u32,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    NoPresentableGraphicsQueue,
    MissingExtension(String),
    NoSurfaceFormats,
    NoPresentModes,
    QueryFailed(vk::Result),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoPresentableGraphicsQueue => {
                f.write_str("no queue family with graphics + present")
            }
            Rejection::MissingExtension(name) => write!(f, "missing device extension {name}"),
            Rejection::NoSurfaceFormats => f.write_str("surface reports no formats"),
            Rejection::NoPresentModes => f.write_str("surface reports no present modes"),
            Rejection::QueryFailed(r) => write!(f, "capability query failed: {}", result_name(*r)),
        }
    }
}

/// First device, in enumeration order, that can draw and present to the surface.
///
/// No preference is given to discrete over integrated adapters.
pub fn pick_physical_device<I: InstanceApi>(
    instance: &I,
    required_extensions: &[&CStr],
) -> RenderResult<SelectedDevice> {
    debug_assert!(
        instance.surface() != vk::SurfaceKHR::null(),
        "device selection needs a surface"
    );

    let devices = instance
        .enumerate_physical_devices()
        .ctx("vkEnumeratePhysicalDevices")?;
    if devices.is_empty() {
        return Err(VkError::NoPhysicalDevice);
    }

    for physical in devices {
        let name = instance.device_name(physical);
        match check_device(instance, physical, required_extensions) {
            Ok(queue_family) => {
                info!("selected GPU `{name}` (queue family {queue_family})");
                return Ok(SelectedDevice {
                    physical,
                    queue_family,
                    name,
                });
            }
            Err(why) => debug!("rejecting GPU `{name}`: {why}"),
        }
    }
    Err(VkError::NoSuitableDevice)
}

fn check_device<I: InstanceApi>(
    instance: &I,
    physical: vk::PhysicalDevice,
    required_extensions: &[&CStr],
) -> Result<u32, Rejection> {
    // (a) one family for graphics and present
    let mut family = None;
    for (i, q) in instance.queue_families(physical).iter().enumerate() {
        if q.queue_count == 0 || !q.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        if instance
            .surface_support(physical, i as u32)
            .map_err(Rejection::QueryFailed)?
        {
            family = Some(i as u32);
            break;
        }
    }
    let family = family.ok_or(Rejection::NoPresentableGraphicsQueue)?;

    // (b) extensions
    let available = instance
        .device_extensions(physical)
        .map_err(Rejection::QueryFailed)?;
    if let Some(missing) = required_extensions
        .iter()
        .find(|req| !available.iter().any(|a| a.as_c_str() == **req))
    {
        return Err(Rejection::MissingExtension(
            missing.to_string_lossy().into_owned(),
        ));
    }

    // (c) something to build a swapchain from
    let formats = instance
        .surface_formats(physical)
        .map_err(Rejection::QueryFailed)?;
    if formats.is_empty() {
        return Err(Rejection::NoSurfaceFormats);
    }
    let modes = instance
        .present_modes(physical)
        .map_err(Rejection::QueryFailed)?;
    if modes.is_empty() {
        return Err(Rejection::NoPresentModes);
    }

    Ok(family)
}
