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

//! The interface that the tester drives. A backend owns the device,
//! the framebuffer that scripts render into and every object created
//! through it. Objects are referred to with opaque handles so that the
//! tester never sees the underlying API.
//!
//! Functions that create objects or submit work can fail. Functions
//! that only record into the current command buffer can’t, which
//! mirrors the `vkCmd*` entry points.

use crate::format::Format;
use crate::pipeline_key;
use crate::requirements::DeviceInfo;
use crate::result;
use crate::script::BufferType;
use crate::shader_stage::Stage;
use crate::window_format::WindowFormat;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

macro_rules! handle_type {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);
        )*
    };
}

handle_type!(
    BufferHandle,
    ShaderModuleHandle,
    DescriptorSetLayoutHandle,
    DescriptorSetHandle,
    PipelineLayoutHandle,
    PipelineHandle,
);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A call into the underlying API returned an error. The string
    /// is the name of the function.
    #[error("{0} failed")]
    CallFailed(&'static str),
    /// The device can’t run the script, for example because the
    /// framebuffer format isn’t supported.
    #[error("{0}")]
    Incompatible(String),
}

impl Error {
    pub fn result(&self) -> result::Result {
        match self {
            Error::CallFailed(_) => result::Result::Fail,
            Error::Incompatible(_) => result::Result::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Uniform,
    Storage,
    Vertex,
    Index,
}

impl From<BufferType> for BufferUsage {
    fn from(buffer_type: BufferType) -> BufferUsage {
        match buffer_type {
            BufferType::Ubo => BufferUsage::Uniform,
            BufferType::Ssbo => BufferUsage::Storage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPoint {
    Graphics,
    Compute,
}

impl From<pipeline_key::Type> for BindPoint {
    fn from(pipeline_type: pipeline_key::Type) -> BindPoint {
        match pipeline_type {
            pipeline_key::Type::Graphics => BindPoint::Graphics,
            pipeline_key::Type::Compute => BindPoint::Compute,
        }
    }
}

/// One binding in a descriptor set layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub buffer_type: BufferType,
    /// Number of array elements in the binding
    pub count: u32,
    /// Mask of [Stage::flag] bits that can access the binding
    pub stages: u32,
}

/// Points one element of a descriptor binding at a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub array_element: u32,
    pub buffer_type: BufferType,
    pub buffer: BufferHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttrib {
    pub location: u32,
    pub format: &'static Format,
    pub offset: usize,
}

/// Layout of the single vertex buffer binding
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub stride: usize,
    pub attribs: Vec<VertexAttrib>,
}

/// Everything needed to create one pipeline. Graphics pipelines after
/// the first one are created as derivatives of it.
#[derive(Debug)]
pub struct PipelineInfo<'a> {
    pub key: &'a pipeline_key::Key,
    pub layout: PipelineLayoutHandle,
    pub stages: Vec<(Stage, ShaderModuleHandle)>,
    pub vertex_input: Option<VertexInput>,
    pub allow_derivatives: bool,
    pub parent: Option<PipelineHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearDepthStencil {
    pub depth: f32,
    pub stencil: u32,
    pub clear_depth: bool,
    pub clear_stencil: bool,
}

/// The color attachment after it has been copied into host memory
#[derive(Clone, Copy)]
pub struct Framebuffer<'a> {
    pub format: &'static Format,
    pub width: usize,
    pub height: usize,
    /// Bytes from the start of one row to the next
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> Framebuffer<'a> {
    /// The bytes of the pixel at the given position
    pub fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let format_size = self.format.size();
        let start = y * self.stride + x * format_size;
        &self.data[start..start + format_size]
    }
}

impl<'a> fmt::Debug for Framebuffer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("format", &self.format.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}

/// Objects created through a backend keep a reference to it so that
/// they can destroy themselves when dropped.
pub type SharedBackend = Rc<RefCell<dyn Backend>>;

pub trait Backend: fmt::Debug {
    /// What the device supports. Scripts whose requirements aren’t
    /// met are skipped before anything is created.
    fn device_info(&self) -> &DeviceInfo;

    fn window_format(&self) -> &WindowFormat;
    /// Recreates the framebuffer with a different format or size
    fn set_window_format(
        &mut self,
        window_format: &WindowFormat,
    ) -> Result<(), Error>;

    /// Creates a buffer backed by host-visible memory that stays
    /// mapped for the lifetime of the buffer.
    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        size: usize,
    ) -> Result<BufferHandle, Error>;
    fn destroy_buffer(&mut self, buffer: BufferHandle);
    fn buffer_data(&self, buffer: BufferHandle) -> &[u8];
    fn buffer_data_mut(&mut self, buffer: BufferHandle) -> &mut [u8];
    /// Makes host writes to the buffer visible to the device
    fn flush_buffer(&mut self, buffer: BufferHandle) -> Result<(), Error>;
    /// Makes device writes to the buffer visible to the host
    fn invalidate_buffer(&mut self, buffer: BufferHandle) -> Result<(), Error>;

    fn create_shader_module(
        &mut self,
        stage: Stage,
        code: &[u32],
    ) -> Result<ShaderModuleHandle, Error>;
    fn destroy_shader_module(&mut self, module: ShaderModuleHandle);

    fn create_descriptor_set_layout(
        &mut self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, Error>;
    fn destroy_descriptor_set_layout(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    );
    fn allocate_descriptor_set(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, Error>;
    fn free_descriptor_set(&mut self, set: DescriptorSetHandle);
    fn write_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    );

    fn create_pipeline_layout(
        &mut self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant_size: usize,
        stages: u32,
    ) -> Result<PipelineLayoutHandle, Error>;
    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle);
    fn create_pipeline(
        &mut self,
        info: &PipelineInfo,
    ) -> Result<PipelineHandle, Error>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    fn begin_command_buffer(&mut self) -> Result<(), Error>;
    fn end_command_buffer(&mut self) -> Result<(), Error>;
    /// Submits the command buffer and waits for it to complete
    fn submit_and_wait(&mut self) -> Result<(), Error>;

    /// Begins a render pass over the whole framebuffer. The first
    /// render pass of a script clears the attachments and later ones
    /// load their previous contents.
    fn begin_render_pass(&mut self, first_render: bool);
    /// Ends the render pass and records a copy of the color
    /// attachment into the host-visible linear buffer, with the
    /// barriers needed to read it after the submission.
    fn end_render_pass(&mut self);
    /// Makes shader writes to the storage buffers visible to the host
    /// after the next submission.
    fn storage_buffer_barrier(&mut self, buffers: &[BufferHandle]);

    fn bind_pipeline(&mut self, bind_point: BindPoint, pipeline: PipelineHandle);
    fn bind_descriptor_sets(
        &mut self,
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        sets: &[DescriptorSetHandle],
    );
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle);
    /// Binds a buffer of 16-bit indices
    fn bind_index_buffer(&mut self, buffer: BufferHandle);
    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: u32,
        offset: usize,
        data: &[u8],
    );
    fn clear_attachments(
        &mut self,
        color: [f32; 4],
        depth_stencil: Option<ClearDepthStencil>,
    );

    /// Makes the linear copy of the color attachment visible to the
    /// host after a submission
    fn invalidate_framebuffer(&mut self) -> Result<(), Error>;
    fn framebuffer(&self) -> Framebuffer<'_>;
}
