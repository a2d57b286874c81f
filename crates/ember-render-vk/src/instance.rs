// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use anyhow::{Context, Result};
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, error, trace, warn};

use crate::config::VkConfig;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance-scoped objects: the loaded entry, the instance itself, the
/// optional validation messenger and the window surface.
pub(crate) struct InstanceContext {
    pub entry: Entry,
    pub instance: Instance,
    debug: Option<DebugMessenger>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl InstanceContext {
    /// STRICT ORDER: instance, then messenger, then the surface created FROM
    /// this instance. Device selection later queries present support against
    /// this surface.
    ///
    /// The raw handles must outlive the returned context.
    pub unsafe fn new(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        cfg: &VkConfig,
    ) -> Result<Self> {
        let entry = Entry::load().context("load Vulkan library")?;
        let instance = create_instance(&entry, display, cfg).context("create_instance")?;
        debug!("created instance");

        let surface_loader = surface::Instance::new(&entry, &instance);
        // Handles stay null until created; Drop tolerates a partial context.
        let mut ctx = Self {
            entry,
            instance,
            debug: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        if cfg.validation {
            ctx.debug = Some(
                DebugMessenger::new(&ctx.entry, &ctx.instance)
                    .context("create_debug_utils_messenger")?,
            );
            debug!("created debug messenger");
        }

        ctx.surface = ash_window::create_surface(&ctx.entry, &ctx.instance, display, window, None)
            .context("ash_window::create_surface")?;
        debug!("created surface");

        Ok(ctx)
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(dbg) = self.debug.take() {
                dbg.loader.destroy_debug_utils_messenger(dbg.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn requested_layers(validation: bool) -> Vec<&'static CStr> {
    if validation {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    cfg: &VkConfig,
) -> Result<Instance> {
    let app_name = CString::new(cfg.app_name.as_str()).context("application name")?;
    let engine_name = CString::new(cfg.engine_name.as_str()).context("engine name")?;

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: engine_name.as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?
        .to_vec();
    if cfg.validation {
        extensions.push(debug_utils::NAME.as_ptr());
    }

    let layers: Vec<*const c_char> = requested_layers(cfg.validation)
        .into_iter()
        .map(CStr::as_ptr)
        .collect();

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

impl DebugMessenger {
    unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let messenger = loader.create_debug_utils_messenger(&ci, None)?;
        Ok(Self { loader, messenger })
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[vulkan] {msg}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[vulkan] {msg}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => debug!("[vulkan] {msg}"),
        _ => trace!("[vulkan] {msg}"),
    }
    vk::FALSE
}
