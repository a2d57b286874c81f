// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use thiserror::Error;

use crate::shader::ShaderStage;

/// Failures of the selection steps that are decided by this crate rather
/// than reported by the driver.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no suitable physical device found ({candidates} enumerated)")]
    NoSuitableDevice { candidates: usize },

    #[error("queue families incomplete (graphics: {graphics:?}, present: {present:?})")]
    MissingQueueFamilies {
        graphics: Option<u32>,
        present: Option<u32>,
    },

    #[error("surface reports no formats")]
    NoSurfaceFormats,

    #[error("surface reports no present modes")]
    NoPresentModes,

    #[error("{stage} shader {}: {source}", .path.display())]
    Shader {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
