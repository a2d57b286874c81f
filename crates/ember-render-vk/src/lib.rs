// SPDX-License-Identifier: CEPL-1.0
//! Vulkan initialization: instance, surface, device selection, swapchain,
//! render pass and a fixed graphics pipeline, torn down in reverse.

mod config;
mod device;
mod error;
mod instance;
mod pipeline;
mod shader;
mod swapchain;

pub use config::{PresentPreference, VkConfig};
pub use device::{
    pick_best, rate_device, supports_required_extensions, DeviceProfile, QueueFamilies,
    QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS,
};
pub use error::InitError;
pub use pipeline::{scissor_for, viewport_for, DYNAMIC_STATES};
pub use shader::{load_spirv, ShaderStage};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, sharing_mode,
    SwapchainSettings, SwapchainSupport,
};

use anyhow::{Context, Result};
use ash::vk;
use ember_render::{GraphicsContext, RenderSize};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use device::DeviceContext;
use instance::InstanceContext;
use pipeline::PipelineContext;
use swapchain::SwapchainContext;

pub struct VkContext {
    // STRICT TEARDOWN ORDER: fields drop top to bottom.
    // - pipeline, layout, shader modules, render pass
    // - image views, then swapchain
    // - device
    // - surface, debug messenger, instance last
    #[allow(dead_code)]
    pipeline: PipelineContext,
    swapchain: SwapchainContext,
    device: DeviceContext,
    #[allow(dead_code)]
    instance: InstanceContext,

    profile: DeviceProfile,
}

impl Drop for VkContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device.device_wait_idle().ok();
        }
        debug!("releasing vulkan objects");
    }
}

impl VkContext {
    pub fn device_name(&self) -> &str {
        &self.profile.name
    }

    /// Graphics and present queues; the same handle when the families match.
    pub fn queues(&self) -> (vk::Queue, vk::Queue) {
        (self.device.graphics_queue, self.device.present_queue)
    }

    pub fn settings(&self) -> &SwapchainSettings {
        &self.swapchain.settings
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_views.len()
    }
}

/// Runs the whole init sequence. Every step's objects are owned by a guard
/// as soon as they exist, so an error drops what was built in reverse.
unsafe fn build_context(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    cfg: &VkConfig,
) -> Result<VkContext> {
    let dh = display.display_handle().context("display_handle")?.as_raw();
    let wh = window.window_handle().context("window_handle")?.as_raw();

    let instance = InstanceContext::new(dh, wh, cfg)?;

    let (phys, profile) = device::pick_physical_device(&instance.instance)?;
    let families = device::find_queue_families(
        &instance.instance,
        &instance.surface_loader,
        phys,
        instance.surface,
    )?;
    let device = DeviceContext::new(&instance.instance, phys, families)?;

    let support = SwapchainSupport::query(&instance.surface_loader, phys, instance.surface)?;
    let settings = support
        .settings(size, cfg.present)
        .ok_or(InitError::NoSurfaceFormats)?;
    debug!(?settings, "selected swapchain settings");

    let swapchain = SwapchainContext::new(
        &instance.instance,
        &device.device,
        instance.surface,
        &support,
        settings,
        &families,
    )?;

    let pipeline = PipelineContext::new(
        &device.device,
        settings.format.format,
        settings.extent,
        cfg,
    )?;

    info!("vulkan initialized on {}", profile.name);

    Ok(VkContext {
        pipeline,
        swapchain,
        device,
        instance,
        profile,
    })
}

impl GraphicsContext for VkContext {
    type Config = VkConfig;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &VkConfig,
    ) -> Result<Self> {
        unsafe { build_context(window, display, size, cfg) }
    }

    fn surface_size(&self) -> RenderSize {
        let extent = self.swapchain.settings.extent;
        RenderSize {
            width: extent.width,
            height: extent.height,
        }
    }
}
