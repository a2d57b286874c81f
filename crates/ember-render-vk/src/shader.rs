// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ash::util::read_spv;
use ash::vk;

use crate::error::InitError;

const BUILTIN_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tri.vert.spv"));
const BUILTIN_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tri.frag.spv"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn flags(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    fn builtin(self) -> (&'static [u8], &'static str) {
        match self {
            ShaderStage::Vertex => (BUILTIN_VERT, concat!(env!("OUT_DIR"), "/tri.vert.spv")),
            ShaderStage::Fragment => (BUILTIN_FRAG, concat!(env!("OUT_DIR"), "/tri.frag.spv")),
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// SPIR-V words for `stage`, read from `path` when given, otherwise the
/// copy compiled by the build script.
pub fn load_spirv(stage: ShaderStage, path: Option<&Path>) -> Result<Vec<u32>, InitError> {
    let shader_err = |path: &Path, source| InitError::Shader {
        stage,
        path: path.to_path_buf(),
        source,
    };

    match path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| shader_err(path, e))?;
            read_spv(&mut Cursor::new(&bytes[..])).map_err(|e| shader_err(path, e))
        }
        None => {
            let (bytes, origin) = stage.builtin();
            read_spv(&mut Cursor::new(bytes)).map_err(|e| shader_err(Path::new(origin), e))
        }
    }
}

pub(crate) unsafe fn create_shader_module(
    device: &ash::Device,
    stage: ShaderStage,
    path: Option<&PathBuf>,
) -> Result<vk::ShaderModule> {
    let code = load_spirv(stage, path.map(PathBuf::as_path))?;
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: code.len() * 4,
        p_code: code.as_ptr(),
        ..Default::default()
    };
    device
        .create_shader_module(&info, None)
        .with_context(|| format!("create_shader_module ({stage})"))
}
