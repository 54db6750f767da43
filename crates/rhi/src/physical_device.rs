//! GPU selection.
//!
//! A GPU qualifies when it exposes Vulkan 1.3, a queue family accepting
//! graphics work, and three features:
//! 1. Timeline semaphores (the frame fence)
//! 2. Buffer device address (constant records are bound by GPU address)
//! 3. Dynamic rendering
//!
//! Qualifying GPUs are scored by type and local memory; the highest wins.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::instance::Instance;
//! use renderer_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(false).expect("Vulkan instance");
//! let gpu = select_physical_device(instance.handle()).expect("No suitable GPU");
//! println!("{gpu:?}");
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};

/// A GPU that meets the renderer's requirements.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    /// First queue family with graphics support; every submission goes here.
    pub graphics_family: u32,
    /// Bytes of device-local memory across all heaps.
    pub local_memory: u64,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("unknown device")
    }

    /// Minimum offset alignment for uniform data, in bytes.
    #[inline]
    pub fn min_uniform_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    /// Selection score; higher is better.
    #[inline]
    pub fn score(&self) -> u64 {
        score(self.properties.device_type, self.local_memory)
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.properties.device_type)
            .field(
                "api_version",
                &format_args!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("graphics_family", &self.graphics_family)
            .field("local_memory_mb", &(self.local_memory >> 20))
            .finish()
    }
}

/// Picks the highest scoring qualifying GPU.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU qualifies.
pub fn select_physical_device(instance: &ash::Instance) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    debug!("{} Vulkan device(s) present", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| inspect(instance, device))
        .inspect(|info| debug!("Candidate GPU '{}', score {}", info.device_name(), info.score()))
        .max_by_key(PhysicalDeviceInfo::score)
        .ok_or(RhiError::NoSuitableGpu)?;

    info!("Selected GPU {:?}", selected);
    Ok(selected)
}

/// Returns the GPU's info if it qualifies, logging why not otherwise.
fn inspect(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(CStr::to_string_lossy)
        .unwrap_or_default()
        .into_owned();

    if !supports_api_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }

    let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features_1_2)
        .push_next(&mut features_1_3);
    unsafe { instance.get_physical_device_features2(device, &mut features) };

    let missing: Vec<&str> = [
        (features_1_2.timeline_semaphore, "timeline_semaphore"),
        (features_1_2.buffer_device_address, "buffer_device_address"),
        (features_1_3.dynamic_rendering, "dynamic_rendering"),
    ]
    .into_iter()
    .filter(|(supported, _)| *supported == vk::FALSE)
    .map(|(_, feature)| feature)
    .collect();
    if !missing.is_empty() {
        debug!("GPU '{}' skipped: missing {}", name, missing.join(", "));
        return None;
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let Some(graphics_family) = find_graphics_family(&families) else {
        debug!("GPU '{}' skipped: no graphics queue family", name);
        return None;
    };

    let memory = unsafe { instance.get_physical_device_memory_properties(device) };
    let local_memory = memory
        .memory_heaps_as_slice()
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum();

    Some(PhysicalDeviceInfo {
        device,
        properties,
        graphics_family,
        local_memory,
    })
}

fn supports_api_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

fn find_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
}

/// Discrete beats integrated beats everything else; local memory breaks
/// ties, counted in MiB up to 16 GiB.
fn score(device_type: vk::PhysicalDeviceType, local_memory: u64) -> u64 {
    let base = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 50_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 20_000,
        vk::PhysicalDeviceType::CPU => 10_000,
        _ => 0,
    };
    base + (local_memory >> 20).min(16 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_graphics_family_is_first_match() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }

    #[test]
    fn test_graphics_family_skips_empty_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 2),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
        assert_eq!(find_graphics_family(&[family(vk::QueueFlags::COMPUTE, 1)]), None);
    }

    #[test]
    fn test_supports_api_1_3() {
        assert!(supports_api_1_3(vk::API_VERSION_1_3));
        assert!(!supports_api_1_3(vk::API_VERSION_1_2));
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 4, 0)));
    }

    #[test]
    fn test_score_prefers_discrete() {
        let gib = 1 << 30;
        let integrated = score(vk::PhysicalDeviceType::INTEGRATED_GPU, 64 * gib);
        let discrete = score(vk::PhysicalDeviceType::DISCRETE_GPU, 2 * gib);
        assert!(discrete > integrated);

        // Memory only breaks ties between GPUs of one type.
        assert!(
            score(vk::PhysicalDeviceType::DISCRETE_GPU, 8 * gib)
                > score(vk::PhysicalDeviceType::DISCRETE_GPU, 4 * gib)
        );
        assert_eq!(
            score(vk::PhysicalDeviceType::DISCRETE_GPU, 64 * gib),
            score(vk::PhysicalDeviceType::DISCRETE_GPU, 32 * gib)
        );
    }
}
