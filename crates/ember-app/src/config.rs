// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ember_platform::WindowDesc;
use ember_render_vk::{PresentPreference, VkConfig};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "ember.toml";

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub vulkan: VulkanCfg,
    pub shaders: ShaderCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let desc = WindowDesc::default();
        Self {
            title: desc.title,
            width: desc.width,
            height: desc.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct VulkanCfg {
    pub app_name: String,
    pub engine_name: String,
    pub validation: bool,
    pub present_mode: PresentModeCfg,
}

impl Default for VulkanCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        Self {
            app_name: vk.app_name,
            engine_name: vk.engine_name,
            validation: vk.validation,
            present_mode: PresentModeCfg::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Fifo,
    #[default]
    Mailbox,
}

/// Precompiled SPIR-V overrides; unset stages use the built-in shaders.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ShaderCfg {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

impl AppCfg {
    pub fn window_desc(&self) -> WindowDesc {
        WindowDesc {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    pub fn vk_config(&self) -> VkConfig {
        VkConfig {
            app_name: self.vulkan.app_name.clone(),
            engine_name: self.vulkan.engine_name.clone(),
            validation: self.vulkan.validation,
            present: match self.vulkan.present_mode {
                PresentModeCfg::Fifo => PresentPreference::Fifo,
                PresentModeCfg::Mailbox => PresentPreference::Mailbox,
            },
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
        }
    }
}

pub fn parse_cfg(src: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(src)
}

/// A missing file means defaults; an unreadable or malformed one is
/// reported and also falls back to defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match parse_cfg(&s) {
            Ok(cfg) => {
                info!("loaded config from {}", path.display());
                debug!(?cfg, "config");
                cfg
            }
            Err(e) => {
                warn!("invalid config {}: {e}; using defaults", path.display());
                AppCfg::default()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            AppCfg::default()
        }
        Err(e) => {
            warn!("cannot read config {}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.vulkan.present_mode, PresentModeCfg::Mailbox);
        assert!(!cfg.vulkan.validation);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = parse_cfg(
            r#"
[window]
title = "demo"

[vulkan]
present_mode = "fifo"
validation = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.vulkan.present_mode, PresentModeCfg::Fifo);
        assert_eq!(cfg.vulkan.engine_name, "ember");

        let vk = cfg.vk_config();
        assert!(vk.validation);
        assert_eq!(vk.present, PresentPreference::Fifo);
    }

    #[test]
    fn test_shader_paths() {
        let cfg = parse_cfg(
            r#"
[shaders]
vertex = "build/shaders/vert.spv"
"#,
        )
        .unwrap();
        let vk = cfg.vk_config();
        assert_eq!(
            vk.vertex_shader.as_deref(),
            Some(Path::new("build/shaders/vert.spv"))
        );
        assert_eq!(vk.fragment_shader, None);
    }

    #[test]
    fn test_unknown_present_mode_is_rejected() {
        assert!(parse_cfg("[vulkan]\npresent_mode = \"immediate\"\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("ember-config-does-not-exist.toml");
        assert_eq!(load_cfg(&path), AppCfg::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!(
            "ember-config-{}-malformed.toml",
            std::process::id()
        ));
        fs::write(&path, "[window\nwidth = ").unwrap();
        assert_eq!(load_cfg(&path), AppCfg::default());
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_window_desc_from_config() {
        let cfg = parse_cfg("[window]\nwidth = 1024\nheight = 768\n").unwrap();
        let desc = cfg.window_desc();
        assert_eq!((desc.width, desc.height), (1024, 768));
        assert_eq!(desc.title, "ember");
    }
}
