// vkscript
//
// Copyright (C) 2018 Intel Corporation
// Copyright 2023 Neil Roberts
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

use std::fmt;

/// The shader stages that a script can provide code for.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Stage {
    Vertex = 0,
    TessCtrl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
}

/// The number of shader stages. This should match the number of
/// values in [Stage].
pub const N_STAGES: usize = 6;

/// All the possible stage values in pipeline order.
pub static ALL_STAGES: [Stage; N_STAGES] = [
    Stage::Vertex,
    Stage::TessCtrl,
    Stage::TessEval,
    Stage::Geometry,
    Stage::Fragment,
    Stage::Compute,
];

impl Stage {
    /// The name used for the stage in section headers and test
    /// commands. Some names have more than one word.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::TessCtrl => "tessellation control",
            Stage::TessEval => "tessellation evaluation",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        }
    }

    /// The bit for this stage in a `VkShaderStageFlags` mask.
    pub fn flag(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stages() {
        for (i, &stage) in ALL_STAGES.iter().enumerate() {
            assert_eq!(stage as usize, i);
        }

        assert_eq!(Stage::Vertex.flag(), 0x1);
        assert_eq!(Stage::Fragment.flag(), 0x10);
        assert_eq!(Stage::Compute.flag(), 0x20);
        assert_eq!(Stage::TessEval.to_string(), "tessellation evaluation");
    }
}
