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

use crate::backend::{self, SharedBackend};
use crate::compiler::Compiler;
use crate::config::Config;
use crate::pipeline_set::{self, PipelineSet};
use crate::requirements::{CheckError, Requirements};
use crate::result;
use crate::script::{LoadError, Script};
use crate::source::Source;
use crate::tester;
use crate::window_format::WindowFormat;
use std::cell::RefCell;
use std::fmt::{self, Write};
use std::rc::Rc;

/// Creates the backends that scripts are run on. The executor asks
/// for a new backend whenever a script has different requirements
/// from the previous one.
pub trait BackendFactory: fmt::Debug {
    fn create_backend(
        &mut self,
        requirements: &Requirements,
        window_format: &WindowFormat,
        device_id: Option<usize>,
    ) -> Result<SharedBackend, backend::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{filename}: {error}")]
    Load {
        filename: String,
        #[source]
        error: LoadError,
    },
    #[error(transparent)]
    Backend(#[from] backend::Error),
    #[error(transparent)]
    Pipeline(#[from] pipeline_set::Error),
    #[error(transparent)]
    Test(#[from] tester::Error),
    #[error(transparent)]
    Requirements(#[from] CheckError),
}

impl Error {
    pub fn result(&self) -> result::Result {
        match self {
            Error::Load { .. } => result::Result::Fail,
            Error::Backend(e) => e.result(),
            Error::Pipeline(e) => e.result(),
            Error::Test(e) => e.result(),
            Error::Requirements(_) => result::Result::Skip,
        }
    }
}

#[derive(Debug)]
pub struct Executor {
    config: Rc<RefCell<Config>>,
    factory: Box<dyn BackendFactory>,
    compiler: Box<dyn Compiler>,

    backend: Option<SharedBackend>,
    // A cache of the requirements that the backend was created with.
    // Used to detect if the requirements have changed. This won’t be
    // used if the backend is external.
    requirements: Requirements,
    external: bool,
}

impl Executor {
    pub fn new(
        config: Rc<RefCell<Config>>,
        factory: Box<dyn BackendFactory>,
        compiler: Box<dyn Compiler>,
    ) -> Executor {
        Executor {
            config,
            factory,
            compiler,

            backend: None,
            requirements: Requirements::new(),
            external: false,
        }
    }

    /// Makes every later script run on the given backend instead of
    /// one made by the factory. It is then up to the caller to make
    /// sure that the device has everything enabled that the scripts
    /// need. Scripts whose requirements aren’t met by the device are
    /// skipped.
    pub fn set_backend(&mut self, backend: SharedBackend) {
        self.backend = Some(backend);
        self.external = true;
    }

    fn backend_is_compatible(&self, script: &Script) -> bool {
        if self.external {
            return true;
        }

        match self.backend {
            Some(_) => self.requirements.eq(script.requirements()),
            None => false,
        }
    }

    fn backend_for_script(
        &mut self,
        script: &Script,
    ) -> Result<SharedBackend, Error> {
        // Recreate the backend if the features or extensions have
        // changed
        if !self.backend_is_compatible(script) {
            self.backend = None;
        }

        let backend = match &self.backend {
            Some(backend) => Rc::clone(backend),
            None => {
                self.requirements.clone_from(script.requirements());

                let backend = self.factory.create_backend(
                    &self.requirements,
                    script.window_format(),
                    self.config.borrow().device_id(),
                )?;

                tracing::debug!(?backend, "created backend");

                Rc::clone(self.backend.insert(backend))
            },
        };

        // Recreate the framebuffer if the format is different
        let needs_new_window =
            !backend.borrow().window_format().eq(script.window_format());

        if needs_new_window {
            backend.borrow_mut().set_window_format(script.window_format())?;
        }

        Ok(backend)
    }

    pub fn execute_script(
        &mut self,
        script: &Script,
    ) -> Result<(), Error> {
        let backend = self.backend_for_script(script)?;

        script.requirements().check(backend.borrow().device_info())?;

        let (logger, show_disassembly, inspector) = {
            let config = self.config.borrow();
            (config.logger(), config.show_disassembly(), config.inspector())
        };

        let pipeline_set = PipelineSet::new(
            &mut logger.borrow_mut(),
            self.compiler.as_mut(),
            Rc::clone(&backend),
            script,
            show_disassembly,
        )?;

        tester::run(&backend, &pipeline_set, script, inspector.as_ref())?;

        Ok(())
    }

    pub fn execute(
        &mut self,
        source: &Source,
    ) -> Result<(), Error> {
        let script = Script::load(source).map_err(|error| Error::Load {
            filename: source.filename().into_owned(),
            error,
        })?;

        self.execute_script(&script)
    }

    /// Executes the source and reports any error through the
    /// configured error callback.
    pub fn run(&mut self, source: &Source) -> result::Result {
        let result = self.execute(source);
        self.handle_execute_result(&source.filename(), result)
    }

    fn handle_execute_result(
        &self,
        filename: &str,
        result: Result<(), Error>,
    ) -> result::Result {
        match result {
            Ok(()) => {
                tracing::info!(filename, "script passed");
                result::Result::Pass
            },
            Err(e) => {
                let result = e.result();

                tracing::info!(filename, result = result.name(), "script finished");

                let logger = self.config.borrow().logger();
                // The logger never fails to write
                let _ = writeln!(logger.borrow_mut(), "{}", e);

                result
            },
        }
    }
}
