// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use tracing::{debug, info, warn};

use crate::error::InitError;

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[swapchain::NAME];

/// Score bonus for discrete GPUs, on top of `maxImageDimension2D`.
pub const DISCRETE_GPU_BONUS: u32 = 1000;

/// The parts of a physical device that scoring looks at.
#[derive(Clone, Debug)]
pub struct DeviceProfile {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub geometry_shader: bool,
    pub extensions: Vec<CString>,
}

impl DeviceProfile {
    pub(crate) unsafe fn query(instance: &Instance, phys: vk::PhysicalDevice) -> Self {
        let props = instance.get_physical_device_properties(phys);
        let feats = instance.get_physical_device_features(phys);
        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_string());
        let extensions =
            extension_names(&name, instance.enumerate_device_extension_properties(phys));

        Self {
            name,
            device_type: props.device_type,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
            geometry_shader: feats.geometry_shader == vk::TRUE,
            extensions,
        }
    }
}

/// A device whose extensions cannot be listed is treated as having none,
/// which rates it 0 without stopping the search.
fn extension_names(
    device: &str,
    listed: ash::prelude::VkResult<Vec<vk::ExtensionProperties>>,
) -> Vec<CString> {
    match listed {
        Ok(props) => props
            .iter()
            .filter_map(|e| e.extension_name_as_c_str().ok().map(CStr::to_owned))
            .collect(),
        Err(err) => {
            warn!(device, ?err, "could not list device extensions");
            Vec::new()
        }
    }
}

pub fn supports_required_extensions(available: &[CString]) -> bool {
    REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .all(|req| available.iter().any(|a| a.as_c_str() == *req))
}

/// 0 means unusable. Otherwise discrete GPUs get a flat bonus and every
/// device is credited with its largest 2D image dimension.
pub fn rate_device(profile: &DeviceProfile) -> u32 {
    if !supports_required_extensions(&profile.extensions) || !profile.geometry_shader {
        return 0;
    }

    let mut score = 0u32;
    if profile.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    score.saturating_add(profile.max_image_dimension_2d)
}

/// Index and score of the best candidate. Ties keep the earlier device.
pub fn pick_best(profiles: &[DeviceProfile]) -> Option<(usize, u32)> {
    let mut best = None;
    let mut best_score = 0;
    for (i, profile) in profiles.iter().enumerate() {
        let score = rate_device(profile);
        if score > best_score {
            best_score = score;
            best = Some((i, score));
        }
    }
    best
}

pub(crate) unsafe fn pick_physical_device(
    instance: &Instance,
) -> Result<(vk::PhysicalDevice, DeviceProfile)> {
    let devices = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;

    let mut profiles: Vec<_> = devices
        .iter()
        .map(|&phys| DeviceProfile::query(instance, phys))
        .collect();

    for p in &profiles {
        debug!(device = %p.name, kind = ?p.device_type, score = rate_device(p), "rated physical device");
    }

    let (idx, score) = pick_best(&profiles).ok_or(InitError::NoSuitableDevice {
        candidates: devices.len(),
    })?;
    let profile = profiles.swap_remove(idx);
    info!("picked physical device {} (score {score})", profile.name);

    Ok((devices[idx], profile))
}

/// Queue family indices as they are discovered; either may still be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Walks families in order. A later family overrides an earlier match
    /// until both roles are filled, then the walk stops.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut found = Self::default();
        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                found.graphics = Some(i);
            }
            if supports_present(i) {
                found.present = Some(i);
            }
            if found.is_complete() {
                break;
            }
        }
        found
    }

    pub fn resolve(self) -> Result<QueueFamilies, InitError> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Ok(QueueFamilies { graphics, present }),
            (graphics, present) => Err(InitError::MissingQueueFamilies { graphics, present }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Family indices to create queues for; a device may not list a family twice.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

pub(crate) unsafe fn find_queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilies> {
    let families = instance.get_physical_device_queue_family_properties(phys);
    let found = QueueFamilyIndices::find(&families, |i| {
        surface_loader
            .get_physical_device_surface_support(phys, i, surface)
            .unwrap_or(false)
    });
    let resolved = found.resolve()?;
    debug!(
        graphics = resolved.graphics,
        present = resolved.present,
        "found queue families"
    );
    Ok(resolved)
}

/// Logical device plus the one queue taken from each role's family.
pub(crate) struct DeviceContext {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

impl DeviceContext {
    pub unsafe fn new(
        instance: &Instance,
        phys: vk::PhysicalDevice,
        families: QueueFamilies,
    ) -> Result<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let features = vk::PhysicalDeviceFeatures::default();
        let extensions: Vec<_> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| e.as_ptr())
            .collect();

        let info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            p_enabled_features: &features,
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            ..Default::default()
        };

        let device = instance
            .create_device(phys, &info, None)
            .context("create_device")?;
        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);
        debug!("created device ({} queue families)", queue_infos.len());

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(kind: vk::PhysicalDeviceType, dim: u32) -> DeviceProfile {
        DeviceProfile {
            name: format!("{kind:?}"),
            device_type: kind,
            max_image_dimension_2d: dim,
            geometry_shader: true,
            extensions: vec![CString::from(c"VK_KHR_swapchain")],
        }
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_discrete_gpu_gets_bonus() {
        let discrete = profile(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        let integrated = profile(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        assert_eq!(rate_device(&discrete), 17384);
        assert_eq!(rate_device(&integrated), 16384);
    }

    #[test]
    fn test_missing_swapchain_extension_scores_zero() {
        let mut p = profile(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        p.extensions = vec![CString::from(c"VK_KHR_maintenance1")];
        assert_eq!(rate_device(&p), 0);
    }

    #[test]
    fn test_missing_geometry_shader_scores_zero() {
        let mut p = profile(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        p.geometry_shader = false;
        assert_eq!(rate_device(&p), 0);
    }

    #[test]
    fn test_score_saturates_at_u32_max() {
        let p = profile(vk::PhysicalDeviceType::DISCRETE_GPU, u32::MAX - 10);
        assert_eq!(rate_device(&p), u32::MAX);
    }

    #[test]
    fn test_unlistable_extensions_rate_zero_and_search_continues() {
        let names = extension_names("broken", Err(vk::Result::ERROR_INITIALIZATION_FAILED));
        assert!(names.is_empty());

        let mut broken = profile(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        broken.extensions = names;
        let profiles = [broken, profile(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096)];
        assert_eq!(rate_device(&profiles[0]), 0);
        assert_eq!(pick_best(&profiles), Some((1, 4096)));
    }

    #[test]
    fn test_pick_best_prefers_highest_score() {
        let profiles = [
            profile(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384),
            profile(vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
            profile(vk::PhysicalDeviceType::CPU, 4096),
        ];
        assert_eq!(pick_best(&profiles), Some((1, 9192)));
    }

    #[test]
    fn test_pick_best_keeps_first_on_tie() {
        let profiles = [
            profile(vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
            profile(vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
        ];
        assert_eq!(pick_best(&profiles), Some((0, 9192)));
    }

    #[test]
    fn test_pick_best_none_when_all_unusable() {
        let mut p = profile(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        p.geometry_shader = false;
        assert_eq!(pick_best(&[p]), None);
        assert_eq!(pick_best(&[]), None);
    }

    #[test]
    fn test_single_family_covers_both_roles() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let found = QueueFamilyIndices::find(&families, |_| true);
        let resolved = found.resolve().unwrap();
        assert_eq!(resolved, QueueFamilies { graphics: 0, present: 0 });
        assert!(resolved.is_shared());
        assert_eq!(resolved.unique(), vec![0]);
    }

    #[test]
    fn test_split_graphics_and_present_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let found = QueueFamilyIndices::find(&families, |i| i == 2);
        let resolved = found.resolve().unwrap();
        assert_eq!(resolved, QueueFamilies { graphics: 1, present: 2 });
        assert_eq!(resolved.unique(), vec![1, 2]);
    }

    #[test]
    fn test_walk_stops_once_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        let found = QueueFamilyIndices::find(&families, |i| {
            queried.push(i);
            true
        });
        assert_eq!(found.graphics, Some(0));
        assert_eq!(found.present, Some(0));
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn test_later_graphics_family_overrides_earlier() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let found = QueueFamilyIndices::find(&families, |i| i == 1);
        assert_eq!(
            found.resolve().unwrap(),
            QueueFamilies { graphics: 1, present: 1 }
        );
    }

    #[test]
    fn test_no_present_support_is_an_error() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let found = QueueFamilyIndices::find(&families, |_| false);
        assert!(!found.is_complete());
        assert!(matches!(
            found.resolve(),
            Err(InitError::MissingQueueFamilies {
                graphics: Some(0),
                present: None
            })
        ));
    }
}
