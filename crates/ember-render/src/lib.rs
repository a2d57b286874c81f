// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A graphics backend that is fully configured against one window and
/// released when dropped.
pub trait GraphicsContext {
    type Config;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &Self::Config,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Size of the images the backend presents to.
    fn surface_size(&self) -> RenderSize;
}
