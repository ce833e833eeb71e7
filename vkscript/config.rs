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

use crate::logger::{self, Logger};
use crate::inspect;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::fmt;

pub type ErrorCallback = logger::WriteCallback;

/// Settings shared by everything that an
/// [Executor](crate::executor::Executor) runs.
#[derive(Default)]
pub struct Config {
    show_disassembly: bool,
    device_id: Option<usize>,

    error_cb: Option<ErrorCallback>,
    inspect_cb: Option<inspect::Callback>,

    logger: Cell<Option<Rc<RefCell<Logger>>>>,
}

impl Config {
    pub fn new() -> Config {
        Default::default()
    }

    /// Sets whether the SPIR-V disassembly of the shaders should be
    /// shown when a script is run. The disassembly will be shown on
    /// the standard out or it will be passed to the `error_cb` if one
    /// has been set.
    pub fn set_show_disassembly(&mut self, show_disassembly: bool) {
        self.show_disassembly = show_disassembly;
    }

    /// Sets or removes a callback that will receive error messages
    /// generated during the script execution. The callback will be
    /// invoked one line at a time without the trailing newline
    /// terminator. If no callback is specified then the output will
    /// be printed on the standard output instead.
    pub fn set_error_cb(&mut self, error_cb: Option<ErrorCallback>) {
        self.error_cb = error_cb;
        self.reset_logger();
    }

    /// Sets or removes an inspection callback. The callback will be
    /// invoked after executing a script so that the application can
    /// have a chance to examine the framebuffer and any storage or
    /// uniform buffers created by the script.
    pub fn set_inspect_cb(&mut self, inspect_cb: Option<inspect::Callback>) {
        self.inspect_cb = inspect_cb;
    }

    /// Sets or removes the index of the device to use. It is passed
    /// on to the [BackendFactory](crate::executor::BackendFactory),
    /// which should still check that the device is compatible with
    /// the script.
    pub fn set_device_id(&mut self, device_id: Option<usize>) {
        self.device_id = device_id;
    }

    /// Get a logger that will write to the current `error_cb` of the
    /// `Config`. The logger will be shared between calls to this
    /// until the callback is changed.
    pub(crate) fn logger(&self) -> Rc<RefCell<Logger>> {
        let logger = self.logger.take().unwrap_or_else(|| {
            Rc::new(RefCell::new(Logger::new(self.error_cb.clone())))
        });

        self.logger.set(Some(Rc::clone(&logger)));

        logger
    }

    pub(crate) fn inspector(&self) -> Option<inspect::Inspector> {
        self.inspect_cb.as_ref().map(|cb| inspect::Inspector::new(Rc::clone(cb)))
    }

    pub(crate) fn show_disassembly(&self) -> bool {
        self.show_disassembly
    }

    pub(crate) fn device_id(&self) -> Option<usize> {
        self.device_id
    }

    fn reset_logger(&self) {
        // Reset the logger back to None so that it will be
        // reconstructed the next time it is requested.
        self.logger.take();
    }
}

// Need to implement this manually because the derive macro can’t
// handle Cells
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("show_disassembly", &self.show_disassembly)
            .field("device_id", &self.device_id)
            .field("error_cb", &self.error_cb.is_some())
            .field("inspect_cb", &self.inspect_cb.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn logger() {
        let flag = Rc::new(Cell::new(false));
        let cb_flag = Rc::clone(&flag);

        let mut config = Config::new();

        config.set_error_cb(Some(Rc::new(move |_: &str| cb_flag.set(true))));

        let logger = config.logger();

        logger.borrow_mut().write_str("test\n").unwrap();

        assert!(flag.get());

        assert!(Rc::ptr_eq(&logger, &config.logger()));

        config.set_error_cb(None);
        // When the callback changes a new logger should be created
        assert!(!Rc::ptr_eq(&logger, &config.logger()));
    }

    #[test]
    fn settings() {
        let mut config = Config::new();

        assert!(!config.show_disassembly());
        assert_eq!(config.device_id(), None);
        assert!(config.inspector().is_none());

        config.set_show_disassembly(true);
        config.set_device_id(Some(2));
        config.set_inspect_cb(Some(inspect::callback(|_| ())));

        assert!(config.show_disassembly());
        assert_eq!(config.device_id(), Some(2));
        assert!(config.inspector().is_some());
    }
}
