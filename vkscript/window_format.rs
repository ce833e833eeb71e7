// vkscript
//
// Copyright 2013, 2014, 2023 Neil Roberts
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice (including the next
// paragraph) shall be included in all copies or substantial portions of the
// Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.  IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use crate::format::{Format, Component, VkFormat};

/// The framebuffer that a script renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFormat {
    pub color_format: &'static Format,
    pub depth_stencil_format: Option<&'static Format>,
    pub width: usize,
    pub height: usize,
}

impl WindowFormat {
    pub fn has_depth(&self) -> bool {
        self.depth_stencil_format
            .map_or(false, |format| format.has_component(Component::D))
    }

    pub fn has_stencil(&self) -> bool {
        self.depth_stencil_format
            .map_or(false, |format| format.has_component(Component::S))
    }
}

impl Default for WindowFormat {
    fn default() -> WindowFormat {
        WindowFormat {
            color_format: Format::lookup_by_vk_format(
                VkFormat::B8G8R8A8_UNORM
            ),
            depth_stencil_format: None,
            width: 250,
            height: 250,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default() {
        let format = WindowFormat::default();
        assert_eq!(format.color_format.name, "B8G8R8A8_UNORM");
        assert_eq!((format.width, format.height), (250, 250));
        assert!(!format.has_depth());
        assert!(!format.has_stencil());
    }

    #[test]
    fn test_depth_stencil_parts() {
        let mut format = WindowFormat::default();

        format.depth_stencil_format =
            Some(Format::lookup_by_vk_format(VkFormat::D32_SFLOAT));
        assert!(format.has_depth());
        assert!(!format.has_stencil());

        format.depth_stencil_format =
            Some(Format::lookup_by_vk_format(VkFormat::S8_UINT));
        assert!(!format.has_depth());
        assert!(format.has_stencil());

        format.depth_stencil_format =
            Some(Format::lookup_by_vk_format(VkFormat::D24_UNORM_S8_UINT));
        assert!(format.has_depth() && format.has_stencil());
    }
}
