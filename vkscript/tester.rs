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

//! Runs the commands of a script against a backend. The tester keeps
//! track of whether a command buffer or a render pass is currently
//! open and moves between those states as each command needs.
//! Failing commands are collected and the rest of the script still
//! runs.

use crate::backend::{
    self, BindPoint, BufferHandle, BufferUsage, ClearDepthStencil,
    DescriptorSetHandle, DescriptorWrite, SharedBackend,
};
use crate::inspect::{self, Inspector};
use crate::pipeline_set::{PipelineSet, RectangleVertex};
use crate::script::{BufferBinding, BufferType, Operation, Script};
use crate::shader_stage::Stage;
use crate::tolerance::Tolerance;
use crate::value::{BoxType, BoxValue, Comparison, Layout};
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
pub struct CommandError {
    pub line_num: usize,
    pub error: Error,
}

#[derive(Debug)]
pub enum Error {
    Backend(backend::Error),
    ProbeFailed(ProbeFailedError),
    CommandErrors(Vec<CommandError>),
    InvalidBufferBinding(BufferBinding),
    InvalidBufferOffset { binding: BufferBinding, offset: usize },
    ProbeOutsideFramebuffer { x: u32, y: u32, w: u32, h: u32 },
    SsboProbeFailed {
        box_type: BoxType,
        layout: Layout,
        expected: Box<[u8]>,
        observed: Box<[u8]>,
    },
}

#[derive(Debug)]
pub struct ProbeFailedError {
    x: u32,
    y: u32,
    expected: [f64; 4],
    observed: [f64; 4],
    n_components: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    /// Any rendering or computing has finished and we can read the
    /// buffers.
    Idle,
    /// The command buffer has begun
    CommandBuffer,
    /// The render pass has begun
    RenderPass,
}

impl From<backend::Error> for Error {
    fn from(error: backend::Error) -> Error {
        Error::Backend(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Backend(e) => e.fmt(f),
            Error::ProbeFailed(e) => e.fmt(f),
            &Error::SsboProbeFailed {
                box_type,
                layout,
                ref expected,
                ref observed,
            } => {
                write!(f, "SSBO probe failed\n\x20 Reference:")?;
                write_values(f, box_type, layout, expected)?;
                write!(f, "\n\x20 Observed:")?;
                write_values(f, box_type, layout, observed)
            },
            Error::CommandErrors(errors) => {
                for (num, e) in errors.iter().enumerate() {
                    if num > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "line {}: ", e.line_num)?;
                    e.error.fmt(f)?;
                }
                Ok(())
            },
            Error::InvalidBufferBinding(binding) => {
                write!(f, "Invalid buffer binding: {}", binding)
            },
            Error::InvalidBufferOffset { binding, offset } => {
                write!(
                    f,
                    "Invalid offset {} in buffer {}",
                    offset,
                    binding,
                )
            },
            Error::ProbeOutsideFramebuffer { x, y, w, h } => {
                write!(
                    f,
                    "Probe rectangle ({}, {}, {}, {}) is outside of the \
                     framebuffer",
                    x, y, w, h,
                )
            },
        }
    }
}

impl Error {
    pub fn result(&self) -> crate::result::Result {
        match self {
            Error::Backend(e) => e.result(),
            _ => crate::result::Result::Fail,
        }
    }
}

// Writes values that are packed one after the other
fn write_values(
    f: &mut fmt::Formatter,
    box_type: BoxType,
    layout: Layout,
    values: &[u8],
) -> fmt::Result {
    let type_size = box_type.size(layout);

    for value in values.chunks_exact(type_size) {
        write!(f, " {}", BoxValue::new(box_type, layout, value))?;
    }

    Ok(())
}

fn format_pixel(f: &mut fmt::Formatter, pixel: &[f64]) -> fmt::Result {
    for component in pixel {
        write!(f, " {}", component)?;
    }

    Ok(())
}

impl fmt::Display for ProbeFailedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Probe color at ({},{})\n\
             \x20 Expected:",
            self.x,
            self.y,
        )?;
        format_pixel(f, &self.expected[0..self.n_components])?;
        write!(f, "\n\x20 Observed:")?;
        format_pixel(f, &self.observed[0..self.n_components])
    }
}

/// A host-visible buffer that is destroyed when dropped
#[derive(Debug)]
struct TestBuffer {
    handle: BufferHandle,
    size: usize,
    // Set when the host has written to the buffer since the last
    // submission
    pending_write: bool,
    backend: SharedBackend,
}

impl TestBuffer {
    fn new(
        backend: &SharedBackend,
        usage: BufferUsage,
        size: usize,
    ) -> Result<TestBuffer, Error> {
        let handle = backend.borrow_mut().create_buffer(usage, size)?;

        Ok(TestBuffer {
            handle,
            size,
            pending_write: false,
            backend: Rc::clone(backend),
        })
    }

    // A buffer that already holds `data`
    fn with_data(
        backend: &SharedBackend,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<TestBuffer, Error> {
        let mut buffer = TestBuffer::new(backend, usage, data.len())?;
        buffer.write(0, data);
        buffer.flush()?;
        Ok(buffer)
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        let mut backend = self.backend.borrow_mut();
        backend.buffer_data_mut(self.handle)[offset..offset + data.len()]
            .copy_from_slice(data);
        self.pending_write = true;
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.backend.borrow_mut().flush_buffer(self.handle)?;
        self.pending_write = false;
        Ok(())
    }
}

impl Drop for TestBuffer {
    fn drop(&mut self) {
        self.backend.borrow_mut().destroy_buffer(self.handle);
    }
}

#[derive(Debug)]
struct DescriptorSetVec {
    handles: Vec<DescriptorSetHandle>,
    backend: SharedBackend,
}

impl DescriptorSetVec {
    fn new(
        backend: &SharedBackend,
        pipeline_set: &PipelineSet,
    ) -> Result<DescriptorSetVec, Error> {
        let layouts = pipeline_set.descriptor_set_layouts();

        let mut sets = DescriptorSetVec {
            handles: Vec::with_capacity(layouts.len()),
            backend: Rc::clone(backend),
        };

        for &layout in layouts {
            let handle = backend.borrow_mut().allocate_descriptor_set(layout)?;
            sets.handles.push(handle);
        }

        Ok(sets)
    }
}

impl Drop for DescriptorSetVec {
    fn drop(&mut self) {
        let mut backend = self.backend.borrow_mut();

        for &handle in self.handles.iter().rev() {
            backend.free_descriptor_set(handle);
        }
    }
}

#[derive(Debug)]
struct Tester<'a> {
    backend: SharedBackend,
    pipeline_set: &'a PipelineSet,
    script: &'a Script,
    inspector: Option<&'a Inspector>,
    state: State,
    first_render: bool,
    bound_pipeline: Option<usize>,
    bo_descriptor_set_bound: bool,

    // Buffers created for draw rect commands. They are kept until the
    // end of the script because the command buffer may still be
    // using them.
    test_buffers: Vec<TestBuffer>,
    vbo_buffer: Option<TestBuffer>,
    index_buffer: Option<TestBuffer>,

    // The descriptor sets need to be freed before the buffers that
    // they refer to are destroyed
    descriptor_sets: DescriptorSetVec,
    // One for each buffer in the script, in the same order
    buffer_objects: Vec<TestBuffer>,
}

impl<'a> Tester<'a> {
    fn new(
        backend: &SharedBackend,
        pipeline_set: &'a PipelineSet,
        script: &'a Script,
        inspector: Option<&'a Inspector>,
    ) -> Result<Tester<'a>, Error> {
        let buffer_objects = script.buffers()
            .iter()
            .map(|buffer| TestBuffer::new(
                backend,
                BufferUsage::from(buffer.buffer_type),
                buffer.size,
            ))
            .collect::<Result<Vec<_>, _>>()?;

        let descriptor_sets = DescriptorSetVec::new(backend, pipeline_set)?;

        let tester = Tester {
            backend: Rc::clone(backend),
            pipeline_set,
            script,
            inspector,
            state: State::Idle,
            first_render: true,
            bound_pipeline: None,
            bo_descriptor_set_bound: false,
            test_buffers: Vec::new(),
            vbo_buffer: None,
            index_buffer: None,
            descriptor_sets,
            buffer_objects,
        };

        tester.write_descriptor_sets();

        Ok(tester)
    }

    fn write_descriptor_sets(&self) {
        let buffers = self.script.buffers();
        let mut backend = self.backend.borrow_mut();

        for (desc_set, &handle) in self.descriptor_sets.handles.iter().enumerate() {
            let writes = buffers.iter()
                .zip(self.buffer_objects.iter())
                .filter(|(buffer, _)| {
                    buffer.binding.desc_set as usize == desc_set
                })
                .map(|(buffer, buffer_object)| DescriptorWrite {
                    binding: buffer.binding.binding,
                    array_element: buffer.binding.array_index,
                    buffer_type: buffer.buffer_type,
                    buffer: buffer_object.handle,
                })
                .collect::<Vec<_>>();

            if !writes.is_empty() {
                backend.write_descriptor_set(handle, &writes);
            }
        }
    }

    fn ssbo_handles(&self) -> Vec<BufferHandle> {
        self.script.buffers()
            .iter()
            .zip(self.buffer_objects.iter())
            .filter(|(buffer, _)| buffer.buffer_type == BufferType::Ssbo)
            .map(|(_, buffer_object)| buffer_object.handle)
            .collect()
    }

    fn flush_buffers(&mut self) -> Result<(), Error> {
        for buffer in self.buffer_objects.iter_mut() {
            if buffer.pending_write {
                buffer.flush()?;
            }
        }

        Ok(())
    }

    fn begin_command_buffer(&mut self) -> Result<(), Error> {
        self.backend.borrow_mut().begin_command_buffer()?;

        self.bound_pipeline = None;
        self.bo_descriptor_set_bound = false;

        Ok(())
    }

    fn end_command_buffer(&mut self) -> Result<(), Error> {
        self.flush_buffers()?;

        let ssbos = self.ssbo_handles();
        let mut backend = self.backend.borrow_mut();

        if !ssbos.is_empty() {
            backend.storage_buffer_barrier(&ssbos);
        }

        backend.end_command_buffer()?;
        backend.submit_and_wait()?;
        backend.invalidate_framebuffer()?;

        for &ssbo in ssbos.iter() {
            backend.invalidate_buffer(ssbo)?;
        }

        Ok(())
    }

    // Walks one state at a time towards `target`. Beginning a render
    // pass needs a command buffer and reading results needs both to
    // have ended.
    fn goto_state(&mut self, target: State) -> Result<(), Error> {
        while self.state != target {
            match (self.state, self.state < target) {
                (State::Idle, _) => {
                    self.begin_command_buffer()?;
                    self.state = State::CommandBuffer;
                },
                (State::CommandBuffer, true) => {
                    self.backend
                        .borrow_mut()
                        .begin_render_pass(self.first_render);
                    self.first_render = false;
                    self.state = State::RenderPass;
                },
                (State::CommandBuffer, false) => {
                    // The command buffer can’t be reused even if
                    // submitting it fails
                    self.state = State::Idle;
                    self.end_command_buffer()?;
                },
                (State::RenderPass, _) => {
                    self.backend.borrow_mut().end_render_pass();
                    self.state = State::CommandBuffer;
                },
            }
        }

        Ok(())
    }

    fn bind_bo_descriptor_set(&mut self) {
        if self.bo_descriptor_set_bound
            || self.descriptor_sets.handles.is_empty()
        {
            return;
        }

        let stages = self.pipeline_set.stages();
        let layout = self.pipeline_set.layout();
        let mut backend = self.backend.borrow_mut();

        let bind_points = [
            (BindPoint::Graphics, stages & !Stage::Compute.flag() != 0),
            (BindPoint::Compute, stages & Stage::Compute.flag() != 0),
        ];

        for (bind_point, used) in bind_points {
            if used {
                backend.bind_descriptor_sets(
                    bind_point,
                    layout,
                    &self.descriptor_sets.handles,
                );
            }
        }

        self.bo_descriptor_set_bound = true;
    }

    fn bind_pipeline(&mut self, pipeline_num: usize) {
        if Some(pipeline_num) == self.bound_pipeline {
            return;
        }

        let key = &self.script.pipeline_keys()[pipeline_num];

        self.backend.borrow_mut().bind_pipeline(
            BindPoint::from(key.pipeline_type()),
            self.pipeline_set.pipelines()[pipeline_num],
        );

        self.bound_pipeline = Some(pipeline_num);
    }

    // Gets into `state` and binds everything a draw or dispatch with
    // the given pipeline needs
    fn prepare_pipeline(
        &mut self,
        state: State,
        pipeline_num: usize,
    ) -> Result<(), Error> {
        self.goto_state(state)?;
        self.bind_bo_descriptor_set();
        self.bind_pipeline(pipeline_num);
        Ok(())
    }

    fn buffer_object(
        &mut self,
        binding: BufferBinding,
    ) -> Result<&mut TestBuffer, Error> {
        let index = self
            .script
            .buffers()
            .binary_search_by_key(&binding, |buffer| buffer.binding)
            .map_err(|_| Error::InvalidBufferBinding(binding))?;

        Ok(&mut self.buffer_objects[index])
    }

    fn vbo_handle(&mut self) -> Result<Option<BufferHandle>, Error> {
        if self.vbo_buffer.is_none() {
            if let Some(vbo) = self.script.vertex_data() {
                let buffer = TestBuffer::with_data(
                    &self.backend,
                    BufferUsage::Vertex,
                    vbo.raw_data(),
                )?;
                self.vbo_buffer = Some(buffer);
            }
        }

        Ok(self.vbo_buffer.as_ref().map(|buffer| buffer.handle))
    }

    fn index_handle(&mut self) -> Result<BufferHandle, Error> {
        if let Some(buffer) = &self.index_buffer {
            return Ok(buffer.handle);
        }

        let data: Vec<u8> = self
            .script
            .indices()
            .iter()
            .flat_map(|index| index.to_ne_bytes())
            .collect();
        let buffer =
            TestBuffer::with_data(&self.backend, BufferUsage::Index, &data)?;
        let handle = buffer.handle;
        self.index_buffer = Some(buffer);

        Ok(handle)
    }

    fn draw_rect(
        &mut self,
        [x, y, w, h]: [f32; 4],
        pipeline_num: usize,
    ) -> Result<(), Error> {
        // Drawn as a triangle strip
        let corners = [(x, y), (x + w, y), (x, y + h), (x + w, y + h)];
        let data: Vec<u8> = corners
            .into_iter()
            .flat_map(|(x, y)| RectangleVertex { x, y, z: 0.0 }.to_ne_bytes())
            .collect();

        let mut buffer =
            TestBuffer::new(&self.backend, BufferUsage::Vertex, data.len())?;

        self.goto_state(State::RenderPass)?;

        buffer.write(0, &data);
        buffer.flush()?;

        let handle = buffer.handle;
        // The vertices are needed until the command buffer completes
        self.test_buffers.push(buffer);

        self.prepare_pipeline(State::RenderPass, pipeline_num)?;

        let mut backend = self.backend.borrow_mut();
        backend.bind_vertex_buffer(handle);
        backend.draw(corners.len() as u32, 1, 0, 0);

        Ok(())
    }

    fn draw_arrays(
        &mut self,
        indexed: bool,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
        pipeline_num: usize,
    ) -> Result<(), Error> {
        self.goto_state(State::RenderPass)?;

        if let Some(vbo) = self.vbo_handle()? {
            self.backend.borrow_mut().bind_vertex_buffer(vbo);
        }

        self.prepare_pipeline(State::RenderPass, pipeline_num)?;

        if !indexed {
            self.backend.borrow_mut().draw(
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
            return Ok(());
        }

        let index_buffer = self.index_handle()?;
        let mut backend = self.backend.borrow_mut();

        backend.bind_index_buffer(index_buffer);
        // The first vertex offsets the indices
        backend.draw_indexed(
            vertex_count,
            instance_count,
            0,
            first_vertex as i32,
            first_instance,
        );

        Ok(())
    }

    fn probe_rect(
        &mut self,
        n_components: usize,
        [x, y, w, h]: [u32; 4],
        expected: &[f64; 4],
        tolerance: &Tolerance,
    ) -> Result<(), Error> {
        // The framebuffer can only be read once everything submitted
        // so far has finished
        self.goto_state(State::Idle)?;

        let backend = self.backend.borrow();
        let framebuffer = backend.framebuffer();

        let fits = |start: u32, size: u32, limit: usize| {
            start as usize + size as usize <= limit
        };

        if !fits(x, w, framebuffer.width) || !fits(y, h, framebuffer.height) {
            return Err(Error::ProbeOutsideFramebuffer { x, y, w, h });
        }

        let pixels = (y..y + h)
            .flat_map(|py| (x..x + w).map(move |px| (px, py)));

        for (px, py) in pixels {
            let observed = framebuffer
                .format
                .load_pixel(framebuffer.pixel(px as usize, py as usize));

            if !compare_pixel(
                &observed[..n_components],
                &expected[..n_components],
                tolerance,
            ) {
                return Err(Error::ProbeFailed(ProbeFailedError {
                    x: px,
                    y: py,
                    expected: *expected,
                    observed,
                    n_components,
                }));
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn probe_ssbo(
        &mut self,
        binding: BufferBinding,
        comparison: Comparison,
        offset: usize,
        box_type: BoxType,
        layout: Layout,
        expected: &[u8],
        tolerance: &Tolerance,
    ) -> Result<(), Error> {
        self.goto_state(State::Idle)?;

        let buffer = self.buffer_object(binding)?;
        let (handle, buffer_size) = (buffer.handle, buffer.size);

        let type_size = box_type.size(layout);
        let stride = box_type.array_stride(layout);
        let n_values = expected.len() / type_size;

        if n_values == 0 {
            return Ok(());
        }

        // The last value only needs its own size, not a whole stride
        let end = (n_values - 1)
            .checked_mul(stride)
            .and_then(|span| span.checked_add(offset))
            .and_then(|start| start.checked_add(type_size));

        if !matches!(end, Some(end) if end <= buffer_size) {
            return Err(Error::InvalidBufferOffset { binding, offset });
        }

        let backend = self.backend.borrow();
        let data = backend.buffer_data(handle);

        let observed: Vec<&[u8]> = (0..n_values)
            .map(|i| &data[offset + i * stride..][..type_size])
            .collect();

        let all_match = observed
            .iter()
            .zip(expected.chunks_exact(type_size))
            .all(|(&observed, expected)| {
                comparison
                    .compare(tolerance, box_type, layout, observed, expected)
            });

        if all_match {
            Ok(())
        } else {
            Err(Error::SsboProbeFailed {
                box_type,
                layout,
                expected: expected.into(),
                observed: observed.concat().into_boxed_slice(),
            })
        }
    }

    fn set_buffer_data(
        &mut self,
        binding: BufferBinding,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        let buffer = self.buffer_object(binding)?;

        match offset.checked_add(data.len()) {
            Some(end) if end <= buffer.size => {
                buffer.write(offset, data);
                Ok(())
            },
            _ => Err(Error::InvalidBufferOffset { binding, offset }),
        }
    }

    fn clear(
        &mut self,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    ) -> Result<(), Error> {
        let window_format = self.script.window_format();

        // Only clear the aspects that the framebuffer actually has
        let depth_stencil = window_format.depth_stencil_format.map(|_| {
            ClearDepthStencil {
                depth,
                stencil,
                clear_depth: window_format.has_depth(),
                clear_stencil: window_format.has_stencil(),
            }
        });

        self.goto_state(State::RenderPass)?;
        self.backend.borrow_mut().clear_attachments(color, depth_stencil);

        Ok(())
    }

    fn run_operation(&mut self, op: &Operation) -> Result<(), Error> {
        match *op {
            Operation::DrawRect { x, y, w, h, pipeline_key } => {
                self.draw_rect([x, y, w, h], pipeline_key)
            },
            Operation::DrawArrays {
                indexed,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
                pipeline_key,
                ..
            } => self.draw_arrays(
                indexed,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
                pipeline_key,
            ),
            Operation::DispatchCompute { x, y, z, pipeline_key } => {
                self.prepare_pipeline(State::CommandBuffer, pipeline_key)?;
                self.backend.borrow_mut().dispatch(x, y, z);
                Ok(())
            },
            Operation::ProbeRect {
                n_components,
                x,
                y,
                w,
                h,
                ref color,
                ref tolerance,
            } => self.probe_rect(
                n_components as usize,
                [x, y, w, h],
                color,
                tolerance,
            ),
            Operation::ProbeSsbo {
                binding,
                comparison,
                offset,
                box_type,
                layout,
                ref values,
                ref tolerance,
            } => self.probe_ssbo(
                binding,
                comparison,
                offset,
                box_type,
                layout,
                values,
                tolerance,
            ),
            Operation::SetPushCommand { offset, ref data } => {
                // Push constants are recorded into the command buffer
                // and don’t need the render pass
                if self.state == State::Idle {
                    self.goto_state(State::CommandBuffer)?;
                }

                self.backend.borrow_mut().push_constants(
                    self.pipeline_set.layout(),
                    self.pipeline_set.stages(),
                    offset,
                    data,
                );

                Ok(())
            },
            Operation::SetBufferData { binding, offset, ref data } => {
                self.set_buffer_data(binding, offset, data)
            },
            Operation::Clear { color, depth, stencil } => {
                self.clear(color, depth, stencil)
            },
        }
    }

    fn inspect(&self) {
        let Some(inspector) = self.inspector else { return; };

        let backend = self.backend.borrow();

        let buffers = self.script.buffers()
            .iter()
            .zip(self.buffer_objects.iter())
            .map(|(buffer, buffer_object)| inspect::Buffer {
                binding: buffer.binding,
                buffer_type: buffer.buffer_type,
                data: backend.buffer_data(buffer_object.handle),
            })
            .collect::<Vec<_>>();

        let data = inspect::Data {
            color_buffer: backend.framebuffer(),
            buffers: &buffers,
        };

        inspector.inspect(&data);
    }
}

fn compare_pixel(
    pixel_a: &[f64],
    pixel_b: &[f64],
    tolerance: &Tolerance,
) -> bool {
    std::iter::zip(pixel_a, pixel_b)
        .enumerate()
        .all(|(component, (&a, &b))| tolerance.equal(component, a, b))
}

/// Runs every command of the script. Errors while setting up the
/// buffers abort the run. Errors from the commands are collected into
/// [Error::CommandErrors] after the script has finished.
pub(crate) fn run(
    backend: &SharedBackend,
    pipeline_set: &PipelineSet,
    script: &Script,
    inspector: Option<&Inspector>,
) -> Result<(), Error> {
    let mut tester = Tester::new(backend, pipeline_set, script, inspector)?;
    let mut errors = Vec::new();
    let mut last_line_num = 0usize;

    for command in script.commands().iter() {
        last_line_num = command.line_num;

        if let Err(error) = tester.run_operation(&command.op) {
            tracing::debug!(line = command.line_num, %error, "command failed");
            errors.push(CommandError {
                line_num: command.line_num,
                error,
            });
        }
    }

    if let Err(error) = tester.goto_state(State::Idle) {
        let line_num = match last_line_num {
            0 => 1,
            line_num => line_num,
        };

        errors.push(CommandError { line_num, error });
    }

    tester.inspect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::CommandErrors(errors))
    }
}
