// vkscript
//
// Copyright (C) 2018 Google LLC
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

/// Thresholds used when fuzzily comparing four-component values such
/// as pixel colors or the rows of a vector. Each component has its
/// own threshold which is either an absolute difference or a
/// percentage of the expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct Tolerance {
    value: [f64; 4],
    is_percent: bool,
}

impl Tolerance {
    pub fn new(value: [f64; 4], is_percent: bool) -> Tolerance {
        Tolerance { value, is_percent }
    }

    pub fn value(&self) -> &[f64; 4] {
        &self.value
    }

    pub fn is_percent(&self) -> bool {
        self.is_percent
    }

    /// Checks whether the observed value `a` is close enough to the
    /// expected value `b`. `component` selects the threshold and
    /// wraps around so that it can be a row index of any vector.
    pub fn equal(&self, component: usize, a: f64, b: f64) -> bool {
        let threshold = self.value[component % self.value.len()];

        if self.is_percent {
            (a - b).abs() <= (threshold / 100.0 * b).abs()
        } else {
            (a - b).abs() <= threshold
        }
    }
}

impl Default for Tolerance {
    fn default() -> Tolerance {
        Tolerance {
            value: [0.01; 4],
            is_percent: false,
        }
    }
}
