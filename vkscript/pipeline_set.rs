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

//! Everything the tester needs that can be created before the
//! commands run. One pipeline is created for each distinct pipeline
//! key of the script and the commands refer to them by index.

use crate::backend::{
    self, DescriptorBinding, DescriptorSetLayoutHandle,
    PipelineHandle, PipelineInfo, PipelineLayoutHandle, SharedBackend,
    ShaderModuleHandle, VertexAttrib, VertexInput,
};
use crate::compiler::{self, Compiler};
use crate::format::{Format, VkFormat};
use crate::logger::Logger;
use crate::pipeline_key;
use crate::result;
use crate::script::{Buffer, Operation, Script};
use crate::shader_stage::{self, Stage};
use std::mem;
use std::rc::Rc;

#[derive(Debug)]
pub struct PipelineSet {
    // The fields are dropped in this order, which is the reverse of
    // the order that they were created in
    pipelines: PipelineVec,
    layout: PipelineLayout,
    descriptor_set_layouts: DescriptorSetLayoutVec,
    stages: u32,
    modules: [Option<ShaderModule>; shader_stage::N_STAGES],
}

/// One vertex of the rectangle drawn by `draw rect`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangleVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RectangleVertex {
    pub fn to_ne_bytes(self) -> [u8; mem::size_of::<RectangleVertex>()] {
        let mut bytes = [0u8; mem::size_of::<RectangleVertex>()];

        for (chunk, value) in bytes.chunks_exact_mut(4).zip([self.x, self.y, self.z]) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }

        bytes
    }
}

/// An error that can be returned by [PipelineSet::new].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Compiling one of the shaders in the script failed
    #[error(transparent)]
    CompileError(#[from] compiler::Error),
    /// Creating one of the objects failed
    #[error(transparent)]
    Backend(#[from] backend::Error),
}

impl Error {
    pub fn result(&self) -> result::Result {
        match self {
            Error::CompileError(_) => result::Result::Fail,
            Error::Backend(e) => e.result(),
        }
    }
}

#[derive(Debug)]
struct ShaderModule {
    handle: ShaderModuleHandle,
    // needed for the destructor
    backend: SharedBackend,
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        self.backend.borrow_mut().destroy_shader_module(self.handle);
    }
}

#[derive(Debug)]
struct DescriptorSetLayoutVec {
    handles: Vec<DescriptorSetLayoutHandle>,
    // needed for the destructor
    backend: SharedBackend,
}

impl Drop for DescriptorSetLayoutVec {
    fn drop(&mut self) {
        let mut backend = self.backend.borrow_mut();

        for &handle in self.handles.iter().rev() {
            backend.destroy_descriptor_set_layout(handle);
        }
    }
}

// Groups the buffers of one descriptor set into bindings. Buffers
// with the same binding number but different array indices share one
// binding with enough elements for the highest index.
fn set_bindings(buffers: &[Buffer], stages: u32) -> Vec<DescriptorBinding> {
    let mut bindings: Vec<DescriptorBinding> = Vec::new();

    for buffer in buffers {
        let count = buffer.binding.array_index + 1;

        match bindings.last_mut() {
            Some(last) if last.binding == buffer.binding.binding => {
                last.count = last.count.max(count);
            },
            _ => bindings.push(DescriptorBinding {
                binding: buffer.binding.binding,
                buffer_type: buffer.buffer_type,
                count,
                stages,
            }),
        }
    }

    bindings
}

/// The number of descriptor sets is the highest used descriptor set
/// index + 1. The buffers are in order so the highest one should be
/// the last one. Unused sets in between get an empty layout.
pub fn n_desc_sets(buffers: &[Buffer]) -> usize {
    match buffers.last() {
        Some(last) => last.binding.desc_set as usize + 1,
        None => 0,
    }
}

fn create_descriptor_set_layouts(
    backend: &SharedBackend,
    buffers: &[Buffer],
    stages: u32,
) -> Result<DescriptorSetLayoutVec, Error> {
    let mut layouts = DescriptorSetLayoutVec {
        handles: Vec::new(),
        backend: Rc::clone(backend),
    };

    for desc_set in 0..n_desc_sets(buffers) {
        let set_buffers = buffers
            .iter()
            .filter(|buffer| buffer.binding.desc_set as usize == desc_set)
            .cloned()
            .collect::<Vec<Buffer>>();

        let handle = backend
            .borrow_mut()
            .create_descriptor_set_layout(&set_bindings(&set_buffers, stages))?;

        layouts.handles.push(handle);
    }

    Ok(layouts)
}

fn compile_shaders(
    logger: &mut Logger,
    compiler: &mut dyn Compiler,
    backend: &SharedBackend,
    script: &Script,
    show_disassembly: bool,
) -> Result<[Option<ShaderModule>; shader_stage::N_STAGES], Error> {
    let mut modules: [Option<ShaderModule>; shader_stage::N_STAGES] =
        Default::default();

    for &stage in shader_stage::ALL_STAGES.iter() {
        if script.shaders(stage).is_empty() {
            continue;
        }

        let code = compiler::build_stage(
            logger,
            compiler,
            script,
            stage,
            show_disassembly,
        )?;

        let handle = backend.borrow_mut().create_shader_module(stage, &code)?;

        modules[stage as usize] = Some(ShaderModule {
            handle,
            backend: Rc::clone(backend),
        });
    }

    Ok(modules)
}

fn push_constant_size(script: &Script) -> usize {
    script.commands()
        .iter()
        .map(|command| match &command.op {
            Operation::SetPushCommand { offset, data } => offset + data.len(),
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

#[derive(Debug)]
struct PipelineLayout {
    handle: PipelineLayoutHandle,
    // needed for the destructor
    backend: SharedBackend,
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.backend.borrow_mut().destroy_pipeline_layout(self.handle);
    }
}

fn vertex_input(
    script: &Script,
    key: &pipeline_key::Key,
) -> Option<VertexInput> {
    match key.source() {
        pipeline_key::Source::Rectangle => Some(VertexInput {
            stride: mem::size_of::<RectangleVertex>(),
            attribs: vec![VertexAttrib {
                location: 0,
                format: Format::lookup_by_vk_format(
                    VkFormat::R32G32B32_SFLOAT
                ),
                offset: 0,
            }],
        }),
        pipeline_key::Source::VertexData => {
            script.vertex_data().map(|vbo| VertexInput {
                stride: vbo.stride(),
                attribs: vbo.attribs().iter().map(|attrib| VertexAttrib {
                    location: attrib.location(),
                    format: attrib.format(),
                    offset: attrib.offset(),
                }).collect(),
            })
        },
    }
}

#[derive(Debug)]
struct PipelineVec {
    handles: Vec<PipelineHandle>,
    // needed for the destructor
    backend: SharedBackend,
}

impl Drop for PipelineVec {
    fn drop(&mut self) {
        let mut backend = self.backend.borrow_mut();

        for &handle in self.handles.iter().rev() {
            backend.destroy_pipeline(handle);
        }
    }
}

impl PipelineVec {
    fn new(
        backend: &SharedBackend,
        script: &Script,
        layout: PipelineLayoutHandle,
        modules: &[Option<ShaderModule>],
    ) -> Result<PipelineVec, Error> {
        let mut vec = PipelineVec {
            handles: Vec::new(),
            backend: Rc::clone(backend),
        };

        let mut first_graphics_pipeline: Option<PipelineHandle> = None;

        for key in script.pipeline_keys().iter() {
            let info = match key.pipeline_type() {
                pipeline_key::Type::Graphics => PipelineInfo {
                    key,
                    layout,
                    stages: PipelineVec::graphics_stages(modules),
                    vertex_input: vertex_input(script, key),
                    allow_derivatives: first_graphics_pipeline.is_none()
                        && script.pipeline_keys().len() > 1,
                    parent: first_graphics_pipeline,
                },
                pipeline_key::Type::Compute => PipelineInfo {
                    key,
                    layout,
                    stages: modules[Stage::Compute as usize]
                        .iter()
                        .map(|module| (Stage::Compute, module.handle))
                        .collect(),
                    vertex_input: None,
                    allow_derivatives: false,
                    parent: None,
                },
            };

            let pipeline = backend.borrow_mut().create_pipeline(&info)?;

            if key.pipeline_type() == pipeline_key::Type::Graphics {
                first_graphics_pipeline.get_or_insert(pipeline);
            }

            vec.handles.push(pipeline);
        }

        Ok(vec)
    }

    fn graphics_stages(
        modules: &[Option<ShaderModule>],
    ) -> Vec<(Stage, ShaderModuleHandle)> {
        shader_stage::ALL_STAGES
            .iter()
            .filter(|&&stage| stage != Stage::Compute)
            .filter_map(|&stage| {
                modules[stage as usize]
                    .as_ref()
                    .map(|module| (stage, module.handle))
            })
            .collect()
    }
}

impl PipelineSet {
    pub fn new(
        logger: &mut Logger,
        compiler: &mut dyn Compiler,
        backend: SharedBackend,
        script: &Script,
        show_disassembly: bool,
    ) -> Result<PipelineSet, Error> {
        let modules = compile_shaders(
            logger,
            compiler,
            &backend,
            script,
            show_disassembly,
        )?;

        let stages = script.stages_mask();

        let descriptor_set_layouts = create_descriptor_set_layouts(
            &backend,
            script.buffers(),
            stages,
        )?;

        let layout = PipelineLayout {
            handle: backend.borrow_mut().create_pipeline_layout(
                &descriptor_set_layouts.handles,
                push_constant_size(script),
                stages,
            )?,
            backend: Rc::clone(&backend),
        };

        let pipelines = PipelineVec::new(
            &backend,
            script,
            layout.handle,
            &modules,
        )?;

        tracing::debug!(
            pipelines = pipelines.handles.len(),
            descriptor_sets = descriptor_set_layouts.handles.len(),
            "created pipeline set",
        );

        Ok(PipelineSet {
            modules,
            stages,
            descriptor_set_layouts,
            layout,
            pipelines,
        })
    }

    pub fn descriptor_set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.descriptor_set_layouts.handles
    }

    /// Mask of [Stage::flag] bits for every stage with a shader
    pub fn stages(&self) -> u32 {
        self.stages
    }

    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout.handle
    }

    pub fn pipelines(&self) -> &[PipelineHandle] {
        &self.pipelines.handles
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::test::FakeCompiler;
    use crate::recording::{Call, RecordingBackend};
    use crate::script::BufferType;
    use crate::source::Source;
    use std::cell::RefCell;

    struct TestData {
        backend: Rc<RefCell<RecordingBackend>>,
        pipeline_set: Result<PipelineSet, Error>,
    }

    impl TestData {
        fn new_with_errors(source: &str, failing_call: Option<&'static str>) -> TestData {
            let script = Script::load(
                &Source::from_string(source.to_owned())
            ).unwrap();
            let backend = Rc::new(RefCell::new(
                RecordingBackend::new(script.window_format())
            ));

            if let Some(name) = failing_call {
                backend.borrow_mut().fail_call(name);
            }

            let pipeline_set = PipelineSet::new(
                &mut Logger::new(Some(Rc::new(|_: &str| ()))),
                &mut FakeCompiler::default(),
                Rc::clone(&backend) as SharedBackend,
                &script,
                false,
            );

            TestData { backend, pipeline_set }
        }

        fn new(source: &str) -> TestData {
            TestData::new_with_errors(source, None)
        }

        fn calls(&self) -> Vec<Call> {
            self.backend.borrow().calls().to_vec()
        }
    }

    #[test]
    fn base() {
        let data = TestData::new(
            "[vertex shader]\n\
             vert\n\
             [fragment shader]\n\
             frag\n\
             [test]\n\
             ubo 0:1 8\n\
             ssbo 0:3 16\n\
             uniform float 4 2.0\n\
             draw rect -1 -1 2 2\n\
             lineWidth 2.0\n\
             draw rect -1 -1 2 2\n"
        );

        let pipeline_set = data.pipeline_set.as_ref().unwrap();
        let calls = data.calls();

        let stages = Stage::Vertex.flag() | Stage::Fragment.flag();
        assert_eq!(pipeline_set.stages(), stages);
        assert_eq!(pipeline_set.pipelines().len(), 2);
        assert_eq!(pipeline_set.descriptor_set_layouts().len(), 1);

        assert!(matches!(
            calls[0],
            Call::CreateShaderModule { stage: Stage::Vertex, .. },
        ));
        assert!(matches!(
            calls[1],
            Call::CreateShaderModule { stage: Stage::Fragment, .. },
        ));

        assert_eq!(
            calls[2],
            Call::CreateDescriptorSetLayout {
                layout: pipeline_set.descriptor_set_layouts()[0],
                bindings: vec![
                    DescriptorBinding {
                        binding: 1,
                        buffer_type: BufferType::Ubo,
                        count: 1,
                        stages,
                    },
                    DescriptorBinding {
                        binding: 3,
                        buffer_type: BufferType::Ssbo,
                        count: 1,
                        stages,
                    },
                ],
            },
        );

        assert_eq!(
            calls[3],
            Call::CreatePipelineLayout {
                layout: pipeline_set.layout(),
                set_layouts: pipeline_set.descriptor_set_layouts().to_vec(),
                push_constant_size: 8,
                stages,
            },
        );

        let Call::CreatePipeline {
            allow_derivatives,
            parent,
            ref vertex_input,
            ref stages,
            ..
        } = calls[4] else {
            unreachable!("expected a pipeline");
        };
        assert!(allow_derivatives);
        assert_eq!(parent, None);
        assert_eq!(stages, &[Stage::Vertex, Stage::Fragment]);
        let vertex_input = vertex_input.as_ref().unwrap();
        assert_eq!(vertex_input.stride, 12);
        assert_eq!(vertex_input.attribs[0].format.vk_format, VkFormat::R32G32B32_SFLOAT);

        let Call::CreatePipeline { allow_derivatives, parent, .. } = calls[5]
        else {
            unreachable!("expected a pipeline");
        };
        assert!(!allow_derivatives);
        assert_eq!(parent, Some(pipeline_set.pipelines()[0]));

        drop(data.pipeline_set);
        assert_eq!(data.backend.borrow().n_live_objects(), 0);

        // Destroyed in the reverse order of creation
        let calls = data.backend.borrow().calls().to_vec();
        let destroys = &calls[6..];
        assert!(matches!(destroys[0], Call::DestroyPipeline(_)));
        assert!(matches!(destroys[1], Call::DestroyPipeline(_)));
        assert!(matches!(destroys[2], Call::DestroyPipelineLayout(_)));
        assert!(matches!(destroys[3], Call::DestroyDescriptorSetLayout(_)));
        assert!(matches!(destroys[4], Call::DestroyShaderModule(_)));
        assert!(matches!(destroys[5], Call::DestroyShaderModule(_)));
        assert_eq!(destroys.len(), 6);
    }

    #[test]
    fn descriptor_set_gaps() {
        let data = TestData::new(
            "[compute shader]\n\
             comp\n\
             [test]\n\
             ssbo 0:1 4\n\
             ssbo 2:0 4\n\
             ubo 2:5:0 4\n\
             ubo 2:5:3 4\n\
             compute 1 1 1\n"
        );

        let pipeline_set = data.pipeline_set.as_ref().unwrap();
        assert_eq!(pipeline_set.descriptor_set_layouts().len(), 3);

        let layouts = data.calls().into_iter().filter_map(|call| match call {
            Call::CreateDescriptorSetLayout { bindings, .. } => Some(bindings),
            _ => None,
        }).collect::<Vec<_>>();

        assert_eq!(layouts.len(), 3);
        assert_eq!(layouts[0].len(), 1);
        assert!(layouts[1].is_empty());
        assert_eq!(
            layouts[2].iter()
                .map(|b| (b.binding, b.buffer_type, b.count))
                .collect::<Vec<_>>(),
            [(0, BufferType::Ssbo, 1), (5, BufferType::Ubo, 4)],
        );

        let Some(Call::CreatePipeline { stages, vertex_input, parent, .. }) =
            data.calls().into_iter().find(
                |call| matches!(call, Call::CreatePipeline { .. })
            )
        else {
            unreachable!("no pipeline was created");
        };
        assert_eq!(stages, [Stage::Compute]);
        assert_eq!(vertex_input, None);
        assert_eq!(parent, None);
    }

    #[test]
    fn no_buffers() {
        let data = TestData::new(
            "[vertex shader passthrough]\n\
             [test]\n\
             draw rect -1 -1 2 2\n"
        );

        let pipeline_set = data.pipeline_set.as_ref().unwrap();

        assert!(pipeline_set.descriptor_set_layouts().is_empty());
        assert!(data.calls().iter().any(|call| matches!(
            call,
            Call::CreatePipelineLayout { set_layouts, push_constant_size: 0, .. }
                if set_layouts.is_empty()
        )));
    }

    #[test]
    fn vertex_data_input() {
        let data = TestData::new(
            "[vertex data]\n\
             0/R32G32_SFLOAT 1/R8_UNORM\n\
             1 2 3\n\
             [test]\n\
             draw arrays TRIANGLE_LIST 0 1\n"
        );

        let Some(Call::CreatePipeline { vertex_input, .. }) =
            data.calls().into_iter().find(
                |call| matches!(call, Call::CreatePipeline { .. })
            )
        else {
            unreachable!("no pipeline was created");
        };

        let vertex_input = vertex_input.unwrap();
        assert_eq!(
            vertex_input.attribs.iter()
                .map(|a| (a.location, a.format.name, a.offset))
                .collect::<Vec<_>>(),
            [(0, "R32G32_SFLOAT", 0), (1, "R8_UNORM", 8)],
        );
    }

    #[test]
    fn create_errors() {
        for name in [
            "vkCreateShaderModule",
            "vkCreateDescriptorSetLayout",
            "vkCreatePipelineLayout",
            "vkCreateGraphicsPipelines",
        ] {
            let data = TestData::new_with_errors(
                "[vertex shader]\n\
                 vert\n\
                 [test]\n\
                 ssbo 0 4\n\
                 draw rect -1 -1 2 2\n",
                Some(name),
            );

            let Err(error) = data.pipeline_set else {
                unreachable!("pipeline set creation should fail");
            };

            assert_eq!(error.to_string(), format!("{} failed", name));
            assert_eq!(error.result(), result::Result::Fail);
            assert_eq!(data.backend.borrow().n_live_objects(), 0);
        }
    }

    #[test]
    fn compile_error() {
        let script = Script::load(&Source::from_string(
            "[fragment shader]\nbad\n".to_owned()
        )).unwrap();
        let backend = Rc::new(RefCell::new(
            RecordingBackend::new(script.window_format())
        ));

        let error = PipelineSet::new(
            &mut Logger::new(Some(Rc::new(|_: &str| ()))),
            &mut FakeCompiler { fail: true, ..Default::default() },
            Rc::clone(&backend) as SharedBackend,
            &script,
            false,
        ).unwrap_err();

        assert!(matches!(error, Error::CompileError(_)));
        assert!(backend.borrow().calls().is_empty());
    }

    #[test]
    fn rectangle_vertex_bytes() {
        let vertex = RectangleVertex { x: 1.0, y: -2.0, z: 0.5 };
        let bytes = vertex.to_ne_bytes();

        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &(-2.0f32).to_ne_bytes());
        assert_eq!(&bytes[8..12], &0.5f32.to_ne_bytes());
    }
}
