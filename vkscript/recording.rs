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

//! A [Backend] that keeps everything in host memory and records each
//! call that it receives. Nothing is rendered, but clears are applied
//! to the framebuffer for simple formats so that scripts which only
//! clear and probe can still be checked. Any fallible call can be
//! made to fail to exercise the error paths of the callers.

use crate::backend::{
    self, Backend, BindPoint, BufferHandle, BufferUsage, ClearDepthStencil,
    DescriptorBinding, DescriptorSetHandle, DescriptorSetLayoutHandle,
    DescriptorWrite, Framebuffer, PipelineHandle, PipelineLayoutHandle,
    PipelineInfo, ShaderModuleHandle, VertexInput,
};
use crate::format::{Component, Mode};
use crate::pipeline_key;
use crate::requirements::{make_version, DeviceInfo};
use crate::shader_stage::Stage;
use crate::window_format::WindowFormat;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer { buffer: BufferHandle, usage: BufferUsage, size: usize },
    DestroyBuffer(BufferHandle),
    FlushBuffer(BufferHandle),
    InvalidateBuffer(BufferHandle),
    CreateShaderModule {
        module: ShaderModuleHandle,
        stage: Stage,
        code: Vec<u32>,
    },
    DestroyShaderModule(ShaderModuleHandle),
    CreateDescriptorSetLayout {
        layout: DescriptorSetLayoutHandle,
        bindings: Vec<DescriptorBinding>,
    },
    DestroyDescriptorSetLayout(DescriptorSetLayoutHandle),
    AllocateDescriptorSet {
        set: DescriptorSetHandle,
        layout: DescriptorSetLayoutHandle,
    },
    FreeDescriptorSet(DescriptorSetHandle),
    WriteDescriptorSet {
        set: DescriptorSetHandle,
        writes: Vec<DescriptorWrite>,
    },
    CreatePipelineLayout {
        layout: PipelineLayoutHandle,
        set_layouts: Vec<DescriptorSetLayoutHandle>,
        push_constant_size: usize,
        stages: u32,
    },
    DestroyPipelineLayout(PipelineLayoutHandle),
    CreatePipeline {
        pipeline: PipelineHandle,
        pipeline_type: pipeline_key::Type,
        stages: Vec<Stage>,
        vertex_input: Option<VertexInput>,
        allow_derivatives: bool,
        parent: Option<PipelineHandle>,
    },
    DestroyPipeline(PipelineHandle),
    BeginCommandBuffer,
    EndCommandBuffer,
    SubmitAndWait,
    BeginRenderPass { first_render: bool },
    EndRenderPass,
    StorageBufferBarrier(Vec<BufferHandle>),
    BindPipeline { bind_point: BindPoint, pipeline: PipelineHandle },
    BindDescriptorSets {
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        sets: Vec<DescriptorSetHandle>,
    },
    BindVertexBuffer(BufferHandle),
    BindIndexBuffer(BufferHandle),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch { x: u32, y: u32, z: u32 },
    PushConstants {
        layout: PipelineLayoutHandle,
        stages: u32,
        offset: usize,
        data: Vec<u8>,
    },
    ClearAttachments {
        color: [f32; 4],
        depth_stencil: Option<ClearDepthStencil>,
    },
    InvalidateFramebuffer,
}

#[derive(Debug)]
pub struct RecordingBackend {
    device_info: DeviceInfo,
    window_format: WindowFormat,

    calls: Vec<Call>,
    failing_calls: HashSet<&'static str>,

    next_handle: u64,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    // Handles of every other kind of object that hasn’t been
    // destroyed yet
    live_objects: HashSet<u64>,

    // The color attachment and the host copy of it that is updated
    // when a submitted render pass ends
    attachment: Vec<u8>,
    linear: Vec<u8>,
    copy_pending: bool,
    in_render_pass: bool,
}

impl RecordingBackend {
    pub fn new(window_format: &WindowFormat) -> RecordingBackend {
        let framebuffer_size = framebuffer_size(window_format);

        RecordingBackend {
            device_info: DeviceInfo {
                api_version: make_version(1, 3, 0),
                ..Default::default()
            },
            window_format: window_format.clone(),
            calls: Vec::new(),
            failing_calls: HashSet::new(),
            next_handle: 1,
            buffers: HashMap::new(),
            live_objects: HashSet::new(),
            attachment: vec![0; framebuffer_size],
            linear: vec![0; framebuffer_size],
            copy_pending: false,
            in_render_pass: false,
        }
    }

    pub fn set_device_info(&mut self, device_info: DeviceInfo) {
        self.device_info = device_info;
    }

    /// Makes every later call of the named function fail. The names
    /// are the Vulkan functions that the call corresponds to, such as
    /// `vkCreateBuffer`.
    pub fn fail_call(&mut self, name: &'static str) {
        self.failing_calls.insert(name);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of objects that have been created and not destroyed
    pub fn n_live_objects(&self) -> usize {
        self.buffers.len() + self.live_objects.len()
    }

    /// The color attachment as the device would see it. Tests can
    /// write pixels here to simulate rendering.
    pub fn attachment_mut(&mut self) -> &mut [u8] {
        &mut self.attachment
    }

    fn check(&self, name: &'static str) -> Result<(), backend::Error> {
        if self.failing_calls.contains(name) {
            Err(backend::Error::CallFailed(name))
        } else {
            Ok(())
        }
    }

    fn new_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn create_object(&mut self, name: &'static str) -> Result<u64, backend::Error> {
        self.check(name)?;
        let handle = self.new_handle();
        self.live_objects.insert(handle);
        Ok(handle)
    }

    fn destroy_object(&mut self, handle: u64) {
        let removed = self.live_objects.remove(&handle);
        assert!(removed, "object {} destroyed twice", handle);
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        let format = self.window_format.color_format;

        let Some(texel) = encode_color(format.parts(), format.packed_size, color)
        else {
            tracing::debug!(
                format = format.name,
                "clear not applied to the recorded framebuffer",
            );
            return;
        };

        for pixel in self.attachment.chunks_exact_mut(texel.len()) {
            pixel.copy_from_slice(&texel);
        }
    }
}

fn framebuffer_size(window_format: &WindowFormat) -> usize {
    window_format.width
        * window_format.height
        * window_format.color_format.size()
}

// Only unpacked formats made of 8-bit normalized or 32-bit float parts
// can be encoded
fn encode_color(
    parts: &[crate::format::Part],
    packed_size: Option<usize>,
    color: [f32; 4],
) -> Option<Vec<u8>> {
    if packed_size.is_some() {
        return None;
    }

    let mut texel = Vec::new();

    for part in parts {
        let value = match part.component {
            Component::R => color[0],
            Component::G => color[1],
            Component::B => color[2],
            Component::A => color[3],
            _ => return None,
        };

        match (part.bits, part.mode) {
            (8, Mode::UNORM) => {
                texel.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
            },
            (32, Mode::SFLOAT) => {
                texel.extend_from_slice(&value.to_ne_bytes());
            },
            _ => return None,
        }
    }

    Some(texel)
}

impl Backend for RecordingBackend {
    fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    fn window_format(&self) -> &WindowFormat {
        &self.window_format
    }

    fn set_window_format(
        &mut self,
        window_format: &WindowFormat,
    ) -> Result<(), backend::Error> {
        self.check("vkCreateImage")?;

        let framebuffer_size = framebuffer_size(window_format);

        self.window_format = window_format.clone();
        self.attachment = vec![0; framebuffer_size];
        self.linear = vec![0; framebuffer_size];
        self.copy_pending = false;

        Ok(())
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        size: usize,
    ) -> Result<BufferHandle, backend::Error> {
        self.check("vkCreateBuffer")?;
        let buffer = BufferHandle(self.new_handle());
        self.buffers.insert(buffer, vec![0; size]);
        self.calls.push(Call::CreateBuffer { buffer, usage, size });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let removed = self.buffers.remove(&buffer);
        assert!(removed.is_some(), "buffer {:?} destroyed twice", buffer);
        self.calls.push(Call::DestroyBuffer(buffer));
    }

    fn buffer_data(&self, buffer: BufferHandle) -> &[u8] {
        &self.buffers[&buffer]
    }

    fn buffer_data_mut(&mut self, buffer: BufferHandle) -> &mut [u8] {
        match self.buffers.get_mut(&buffer) {
            Some(data) => data,
            None => unreachable!("unknown buffer {:?}", buffer),
        }
    }

    fn flush_buffer(
        &mut self,
        buffer: BufferHandle,
    ) -> Result<(), backend::Error> {
        self.check("vkFlushMappedMemoryRanges")?;
        self.calls.push(Call::FlushBuffer(buffer));
        Ok(())
    }

    fn invalidate_buffer(
        &mut self,
        buffer: BufferHandle,
    ) -> Result<(), backend::Error> {
        self.check("vkInvalidateMappedMemoryRanges")?;
        self.calls.push(Call::InvalidateBuffer(buffer));
        Ok(())
    }

    fn create_shader_module(
        &mut self,
        stage: Stage,
        code: &[u32],
    ) -> Result<ShaderModuleHandle, backend::Error> {
        let module = ShaderModuleHandle(
            self.create_object("vkCreateShaderModule")?
        );
        self.calls.push(Call::CreateShaderModule {
            module,
            stage,
            code: code.to_vec(),
        });
        Ok(module)
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        self.destroy_object(module.0);
        self.calls.push(Call::DestroyShaderModule(module));
    }

    fn create_descriptor_set_layout(
        &mut self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, backend::Error> {
        let layout = DescriptorSetLayoutHandle(
            self.create_object("vkCreateDescriptorSetLayout")?
        );
        self.calls.push(Call::CreateDescriptorSetLayout {
            layout,
            bindings: bindings.to_vec(),
        });
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) {
        self.destroy_object(layout.0);
        self.calls.push(Call::DestroyDescriptorSetLayout(layout));
    }

    fn allocate_descriptor_set(
        &mut self,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, backend::Error> {
        let set = DescriptorSetHandle(
            self.create_object("vkAllocateDescriptorSets")?
        );
        self.calls.push(Call::AllocateDescriptorSet { set, layout });
        Ok(set)
    }

    fn free_descriptor_set(&mut self, set: DescriptorSetHandle) {
        self.destroy_object(set.0);
        self.calls.push(Call::FreeDescriptorSet(set));
    }

    fn write_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) {
        self.calls.push(Call::WriteDescriptorSet {
            set,
            writes: writes.to_vec(),
        });
    }

    fn create_pipeline_layout(
        &mut self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant_size: usize,
        stages: u32,
    ) -> Result<PipelineLayoutHandle, backend::Error> {
        let layout = PipelineLayoutHandle(
            self.create_object("vkCreatePipelineLayout")?
        );
        self.calls.push(Call::CreatePipelineLayout {
            layout,
            set_layouts: set_layouts.to_vec(),
            push_constant_size,
            stages,
        });
        Ok(layout)
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle) {
        self.destroy_object(layout.0);
        self.calls.push(Call::DestroyPipelineLayout(layout));
    }

    fn create_pipeline(
        &mut self,
        info: &PipelineInfo,
    ) -> Result<PipelineHandle, backend::Error> {
        let name = match info.key.pipeline_type() {
            pipeline_key::Type::Graphics => "vkCreateGraphicsPipelines",
            pipeline_key::Type::Compute => "vkCreateComputePipelines",
        };
        let pipeline = PipelineHandle(self.create_object(name)?);
        self.calls.push(Call::CreatePipeline {
            pipeline,
            pipeline_type: info.key.pipeline_type(),
            stages: info.stages.iter().map(|&(stage, _)| stage).collect(),
            vertex_input: info.vertex_input.clone(),
            allow_derivatives: info.allow_derivatives,
            parent: info.parent,
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.destroy_object(pipeline.0);
        self.calls.push(Call::DestroyPipeline(pipeline));
    }

    fn begin_command_buffer(&mut self) -> Result<(), backend::Error> {
        self.check("vkBeginCommandBuffer")?;
        self.calls.push(Call::BeginCommandBuffer);
        Ok(())
    }

    fn end_command_buffer(&mut self) -> Result<(), backend::Error> {
        self.check("vkEndCommandBuffer")?;
        self.calls.push(Call::EndCommandBuffer);
        Ok(())
    }

    fn submit_and_wait(&mut self) -> Result<(), backend::Error> {
        self.check("vkQueueSubmit")?;
        self.calls.push(Call::SubmitAndWait);

        if self.copy_pending {
            self.linear.copy_from_slice(&self.attachment);
            self.copy_pending = false;
        }

        Ok(())
    }

    fn begin_render_pass(&mut self, first_render: bool) {
        assert!(!self.in_render_pass);
        self.in_render_pass = true;
        self.calls.push(Call::BeginRenderPass { first_render });
    }

    fn end_render_pass(&mut self) {
        assert!(self.in_render_pass);
        self.in_render_pass = false;
        self.copy_pending = true;
        self.calls.push(Call::EndRenderPass);
    }

    fn storage_buffer_barrier(&mut self, buffers: &[BufferHandle]) {
        self.calls.push(Call::StorageBufferBarrier(buffers.to_vec()));
    }

    fn bind_pipeline(&mut self, bind_point: BindPoint, pipeline: PipelineHandle) {
        self.calls.push(Call::BindPipeline { bind_point, pipeline });
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        sets: &[DescriptorSetHandle],
    ) {
        self.calls.push(Call::BindDescriptorSets {
            bind_point,
            layout,
            sets: sets.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(Call::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(Call::BindIndexBuffer(buffer));
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.calls.push(Call::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.calls.push(Call::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.calls.push(Call::Dispatch { x, y, z });
    }

    fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: u32,
        offset: usize,
        data: &[u8],
    ) {
        self.calls.push(Call::PushConstants {
            layout,
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn clear_attachments(
        &mut self,
        color: [f32; 4],
        depth_stencil: Option<ClearDepthStencil>,
    ) {
        assert!(self.in_render_pass);
        self.clear_color(color);
        self.calls.push(Call::ClearAttachments { color, depth_stencil });
    }

    fn invalidate_framebuffer(&mut self) -> Result<(), backend::Error> {
        self.check("vkInvalidateMappedMemoryRanges")?;
        self.calls.push(Call::InvalidateFramebuffer);
        Ok(())
    }

    fn framebuffer(&self) -> Framebuffer<'_> {
        let format = self.window_format.color_format;

        Framebuffer {
            format,
            width: self.window_format.width,
            height: self.window_format.height,
            stride: self.window_format.width * format.size(),
            data: &self.linear,
        }
    }
}

/// A [BackendFactory](crate::executor::BackendFactory) that makes a
/// new [RecordingBackend] for every device the executor asks for.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    n_backends: usize,
}

impl RecordingFactory {
    /// Number of backends created so far
    pub fn n_backends(&self) -> usize {
        self.n_backends
    }
}

impl crate::executor::BackendFactory for RecordingFactory {
    fn create_backend(
        &mut self,
        requirements: &crate::requirements::Requirements,
        window_format: &WindowFormat,
        _device_id: Option<usize>,
    ) -> Result<crate::backend::SharedBackend, backend::Error> {
        let mut backend = RecordingBackend::new(window_format);

        // Pretend to support everything the script asks for
        backend.device_info.api_version =
            requirements.version().max(backend.device_info.api_version);
        backend.device_info.extensions =
            requirements.extensions().iter().cloned().collect();
        backend.device_info.features =
            requirements.features().map(str::to_owned).collect();

        self.n_backends += 1;

        Ok(std::rc::Rc::new(std::cell::RefCell::new(backend)))
    }
}
