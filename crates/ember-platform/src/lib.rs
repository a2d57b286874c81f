// SPDX-License-Identifier: CEPL-1.0
//! Window creation for the engine, on top of winit.

pub use winit;

use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

/// What the engine window should look like when it is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "ember".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl WindowDesc {
    /// Fixed-size window with no client API; Vulkan owns the surface.
    pub fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width.max(1), self.height.max(1)))
            .with_resizable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_800_by_600() {
        let desc = WindowDesc::default();
        assert_eq!((desc.width, desc.height), (800, 600));
    }

    #[test]
    fn test_attributes_are_not_resizable() {
        let attrs = WindowDesc::default().attributes();
        assert!(!attrs.resizable);
        assert_eq!(attrs.title, "ember");
    }
}
