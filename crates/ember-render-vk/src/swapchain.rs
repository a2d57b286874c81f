// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use ember_render::RenderSize;
use tracing::{debug, info};

use crate::config::PresentPreference;
use crate::device::QueueFamilies;
use crate::error::InitError;

/// What the surface offers for the chosen physical device.
#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub(crate) unsafe fn query(
        surface_loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let capabilities = surface_loader
            .get_physical_device_surface_capabilities(phys, surface)
            .context("get_physical_device_surface_capabilities")?;
        let formats = surface_loader
            .get_physical_device_surface_formats(phys, surface)
            .context("get_physical_device_surface_formats")?;
        let present_modes = surface_loader
            .get_physical_device_surface_present_modes(phys, surface)
            .context("get_physical_device_surface_present_modes")?;

        let support = Self {
            capabilities,
            formats,
            present_modes,
        }
        .validated()?;
        debug!(
            formats = support.formats.len(),
            present_modes = support.present_modes.len(),
            "queried swapchain support"
        );
        Ok(support)
    }

    pub fn validated(self) -> Result<Self, InitError> {
        if self.formats.is_empty() {
            return Err(InitError::NoSurfaceFormats);
        }
        if self.present_modes.is_empty() {
            return Err(InitError::NoPresentModes);
        }
        Ok(self)
    }

    /// Resolves every swapchain parameter; `None` when no format is offered.
    pub fn settings(
        &self,
        framebuffer: RenderSize,
        preference: PresentPreference,
    ) -> Option<SwapchainSettings> {
        Some(SwapchainSettings {
            format: choose_surface_format(&self.formats)?,
            present_mode: choose_present_mode(&self.present_modes, preference),
            extent: choose_extent(&self.capabilities, framebuffer),
            image_count: choose_image_count(&self.capabilities),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainSettings {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// First BGRA8 sRGB / sRGB-nonlinear pair, else whatever the driver lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentPreference::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        // FIFO is the one mode every surface must support.
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// `current_extent.width == u32::MAX` means the surface lets the swapchain
/// pick; then the framebuffer size is clamped into the allowed range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: clamp_dim(
                framebuffer.width,
                caps.min_image_extent.width,
                caps.max_image_extent.width,
            ),
            height: clamp_dim(
                framebuffer.height,
                caps.min_image_extent.height,
                caps.max_image_extent.height,
            ),
        }
    }
}

/// Unlike `u32::clamp` this accepts `min > max`; the lower bound is checked first.
fn clamp_dim(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// One more than the minimum, capped by the maximum (0 == "no max").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// Images are shared concurrently only when two distinct families touch them.
pub fn sharing_mode(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// Swapchain, its images and one view per image.
pub(crate) struct SwapchainContext {
    device: ash::Device,
    loader: swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub settings: SwapchainSettings,
}

impl SwapchainContext {
    pub unsafe fn new(
        instance: &Instance,
        device: &ash::Device,
        surface: vk::SurfaceKHR,
        support: &SwapchainSupport,
        settings: SwapchainSettings,
        families: &QueueFamilies,
    ) -> Result<Self> {
        let loader = swapchain::Device::new(instance, device);
        let (image_sharing_mode, family_indices) = sharing_mode(families);

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count: settings.image_count,
            image_format: settings.format.format,
            image_color_space: settings.format.color_space,
            image_extent: settings.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: if family_indices.is_empty() {
                std::ptr::null()
            } else {
                family_indices.as_ptr()
            },
            pre_transform: support.capabilities.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: settings.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        let swapchain = loader
            .create_swapchain(&info, None)
            .context("create_swapchain")?;
        let mut ctx = Self {
            device: device.clone(),
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            settings,
        };

        ctx.images = ctx
            .loader
            .get_swapchain_images(swapchain)
            .context("get_swapchain_images")?;
        info!(
            "swapchain ready ({}x{}, {:?}/{:?}, {:?}, {} images)",
            settings.extent.width,
            settings.extent.height,
            settings.format.format,
            settings.format.color_space,
            settings.present_mode,
            ctx.images.len()
        );

        ctx.create_image_views()?;
        Ok(ctx)
    }

    unsafe fn create_image_views(&mut self) -> Result<()> {
        self.image_views.reserve(self.images.len());
        for &image in &self.images {
            let info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: self.settings.format.format,
                components: vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                },
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = self
                .device
                .create_image_view(&info, None)
                .context("create_image_view")?;
            self.image_views.push(view);
        }
        debug!("created {} image views", self.image_views.len());
        Ok(())
    }
}

impl Drop for SwapchainContext {
    fn drop(&mut self) {
        unsafe {
            // Views are created from swapchain images, destroy them first.
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2160,
            },
            ..Default::default()
        }
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn test_prefers_bgra8_srgb_nonlinear() {
        let formats = [
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[1]));
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
    }

    #[test]
    fn test_no_formats_gives_no_settings() {
        assert_eq!(choose_surface_format(&[]), None);

        let support = SwapchainSupport {
            capabilities: caps((800, 600), 2, 8),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let fb = RenderSize {
            width: 800,
            height: 600,
        };
        assert_eq!(support.settings(fb, PresentPreference::Mailbox), None);
    }

    #[test]
    fn test_mailbox_when_offered() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_fifo_when_mailbox_missing() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_current_extent_wins() {
        let c = caps((1280, 720), 2, 8);
        let fb = RenderSize {
            width: 800,
            height: 600,
        };
        assert_eq!(
            choose_extent(&c, fb),
            vk::Extent2D {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn test_free_extent_is_clamped() {
        let c = caps((u32::MAX, u32::MAX), 2, 8);
        let fb = RenderSize {
            width: 8000,
            height: 0,
        };
        assert_eq!(
            choose_extent(&c, fb),
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }

    #[test]
    fn test_inverted_extent_bounds_do_not_panic() {
        let mut c = caps((u32::MAX, u32::MAX), 2, 8);
        c.min_image_extent = vk::Extent2D {
            width: 1000,
            height: 1000,
        };
        c.max_image_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        let fb = RenderSize {
            width: 800,
            height: 2000,
        };
        assert_eq!(
            choose_extent(&c, fb),
            vk::Extent2D {
                width: 1000,
                height: 0
            }
        );
    }

    #[test]
    fn test_image_count_one_above_min() {
        assert_eq!(choose_image_count(&caps((1, 1), 2, 8)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 3, 3)), 3);
    }

    #[test]
    fn test_image_count_unbounded_max() {
        assert_eq!(choose_image_count(&caps((1, 1), 2, 0)), 3);
    }

    #[test]
    fn test_sharing_mode() {
        let same = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        assert_eq!(sharing_mode(&same), (vk::SharingMode::EXCLUSIVE, vec![]));

        let split = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        assert_eq!(
            sharing_mode(&split),
            (vk::SharingMode::CONCURRENT, vec![0, 2])
        );
    }

    #[test]
    fn test_empty_support_is_rejected() {
        let support = SwapchainSupport {
            capabilities: caps((800, 600), 2, 8),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(matches!(
            support.validated(),
            Err(InitError::NoSurfaceFormats)
        ));

        let support = SwapchainSupport {
            capabilities: caps((800, 600), 2, 8),
            formats: vec![fmt(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![],
        };
        assert!(matches!(support.validated(), Err(InitError::NoPresentModes)));
    }

    #[test]
    fn test_settings_resolve_all_fields() {
        let support = SwapchainSupport {
            capabilities: caps((800, 600), 2, 0),
            formats: vec![fmt(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let fb = RenderSize {
            width: 800,
            height: 600,
        };
        let settings = support.settings(fb, PresentPreference::Mailbox).unwrap();
        assert_eq!(settings.format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(settings.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            settings.extent,
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(settings.image_count, 3);
    }
}
