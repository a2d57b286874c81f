// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

/// Which present mode to ask for when the surface offers a choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// FIFO, always available.
    Fifo,
    /// MAILBOX when offered, FIFO otherwise.
    #[default]
    Mailbox,
}

/// Everything the init sequence takes from the outside.
#[derive(Clone, Debug)]
pub struct VkConfig {
    pub app_name: String,
    pub engine_name: String,
    /// Enables `VK_LAYER_KHRONOS_validation` and routes its messages into tracing.
    pub validation: bool,
    pub present: PresentPreference,
    /// Precompiled SPIR-V; `None` uses the shaders built into the crate.
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            app_name: "ember game".to_string(),
            engine_name: "ember".to_string(),
            validation: false,
            present: PresentPreference::Mailbox,
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}
