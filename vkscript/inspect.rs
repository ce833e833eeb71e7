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

use crate::backend::Framebuffer;
use crate::script::{BufferBinding, BufferType};
use std::fmt;
use std::rc::Rc;

pub struct Buffer<'a> {
    pub binding: BufferBinding,
    pub buffer_type: BufferType,
    /// The contents of the buffer after the last submission
    pub data: &'a [u8],
}

pub struct Data<'a> {
    /// The color buffer
    pub color_buffer: Framebuffer<'a>,
    /// The buffers used as UBOs or SSBOs, sorted by binding
    pub buffers: &'a [Buffer<'a>],
}

/// A callback used to report the buffer and image data after
/// executing each test.
pub type Callback = Rc<dyn Fn(&Data)>;

/// Wraps a closure into a [Callback]. Going through this function
/// lets the compiler infer that the closure accepts data with any
/// lifetime.
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Data) + 'static,
{
    Rc::new(f)
}

#[derive(Clone)]
pub struct Inspector {
    callback: Callback,
}

impl Inspector {
    pub fn new(callback: Callback) -> Inspector {
        Inspector { callback }
    }

    pub fn inspect(&self, data: &Data) {
        (self.callback)(data);
    }
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Inspector").finish_non_exhaustive()
    }
}
