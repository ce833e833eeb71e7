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

//! Parser for the script format. A script is split into sections
//! introduced by a line like `[test]`. Lines in the `[test]` section
//! are tried against each command in turn, and the settings made by
//! earlier lines (pipeline properties, tolerance, clear values and
//! block layouts) apply to the commands that follow them.

use crate::vbo;
use crate::source::Source;
use crate::stream::{Stream, StreamError};
use crate::tolerance::Tolerance;
use crate::pipeline_key::{self, SetPropertyError, Topology};
use crate::shader_stage::{Stage, ALL_STAGES, N_STAGES};
use crate::value::{BoxType, Comparison, Layout, LayoutStd, MajorAxis};
use crate::requirements::Requirements;
use crate::window_format::WindowFormat;
use crate::format::Format;
use crate::lexer::{
    self, next_word, strip_words_prefix, trim_line_or_skip, NumError, Scan,
};
use std::fmt;
use std::mem;

#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Glsl(String),
    Spirv(String),
    Binary(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    Ubo,
    Ssbo,
}

/// Identifies a buffer in the descriptor sets. The array index is
/// only non-zero for bindings that are arrays of buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferBinding {
    pub desc_set: u32,
    pub binding: u32,
    pub array_index: u32,
}

impl fmt::Display for BufferBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.desc_set, self.binding)?;

        if self.array_index != 0 {
            write!(f, ":{}", self.array_index)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub binding: BufferBinding,
    pub buffer_type: BufferType,
    /// The largest size declared or written by any command
    pub size: usize,
}

#[derive(Debug, PartialEq)]
pub struct Script {
    filename: String,
    stages: [Box<[Shader]>; N_STAGES],
    commands: Box<[Command]>,
    pipeline_keys: Box<[pipeline_key::Key]>,
    requirements: Requirements,
    window_format: WindowFormat,
    vertex_data: Option<vbo::VertexData>,
    indices: Box<[u16]>,
    buffers: Box<[Buffer]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    DrawRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        pipeline_key: usize,
    },
    DrawArrays {
        topology: Topology,
        indexed: bool,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
        pipeline_key: usize,
    },
    DispatchCompute {
        x: u32,
        y: u32,
        z: u32,
        pipeline_key: usize,
    },
    ProbeRect {
        n_components: u32,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        color: [f64; 4],
        tolerance: Tolerance,
    },
    ProbeSsbo {
        binding: BufferBinding,
        comparison: Comparison,
        offset: usize,
        box_type: BoxType,
        layout: Layout,
        /// Expected values packed one after the other with no
        /// padding in between
        values: Box<[u8]>,
        tolerance: Tolerance,
    },
    SetPushCommand {
        offset: usize,
        data: Box<[u8]>,
    },
    SetBufferData {
        binding: BufferBinding,
        offset: usize,
        data: Box<[u8]>,
    },
    Clear {
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub line_num: usize,
    pub op: Operation,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("line {line_num}: {detail}")]
    VertexData { line_num: usize, detail: vbo::Error },
    #[error("line {line_num}: {message}")]
    Invalid { line_num: usize, message: String },
    #[error("line {line_num}: {detail}")]
    Number { line_num: usize, detail: NumError },
}

impl LoadError {
    /// The line that caused the error, if the error came from a
    /// particular line.
    pub fn line_num(&self) -> Option<usize> {
        match self {
            LoadError::Stream(_) => None,
            LoadError::VertexData { line_num, .. }
            | LoadError::Invalid { line_num, .. }
            | LoadError::Number { line_num, .. } => Some(*line_num),
        }
    }
}

impl Shader {
    /// Whether the shader is already SPIR-V, either as assembly or
    /// as a binary. These can’t be linked with other shaders.
    pub fn is_spirv(&self) -> bool {
        match self {
            Shader::Binary(_) | Shader::Spirv(_) => true,
            Shader::Glsl(_) => false,
        }
    }
}

// SPIR-V for a vertex shader that copies the attribute at location 0
// to gl_Position
static PASSTHROUGH_VERTEX_SHADER: [u32; 69] = [
    0x07230203, 0x00010000, 0x00070000, 0x0000000c, 0x00000000, 0x00020011,
    0x00000001, 0x0003000e, 0x00000000, 0x00000001, 0x0007000f, 0x00000000,
    0x00000001, 0x6e69616d, 0x00000000, 0x00000002, 0x00000003, 0x00040047,
    0x00000002, 0x0000001e, 0x00000000, 0x00040047, 0x00000003, 0x0000000b,
    0x00000000, 0x00020013, 0x00000004, 0x00030021, 0x00000005, 0x00000004,
    0x00030016, 0x00000006, 0x00000020, 0x00040017, 0x00000007, 0x00000006,
    0x00000004, 0x00040020, 0x00000008, 0x00000001, 0x00000007, 0x00040020,
    0x00000009, 0x00000003, 0x00000007, 0x0004003b, 0x00000008, 0x00000002,
    0x00000001, 0x0004003b, 0x00000009, 0x00000003, 0x00000003, 0x00050036,
    0x00000004, 0x00000001, 0x00000000, 0x00000005, 0x000200f8, 0x0000000a,
    0x0004003d, 0x00000007, 0x0000000b, 0x00000002, 0x0003003e, 0x00000003,
    0x0000000b, 0x000100fd, 0x00010038
];

/// The kinds of data block whose layout can be changed with a
/// `<block> layout` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Push,
    Ubo,
    Ssbo,
}

impl Block {
    const ALL: [Block; 3] = [Block::Push, Block::Ubo, Block::Ssbo];

    fn default_layout(self) -> Layout {
        match self {
            Block::Ubo => Layout::new(LayoutStd::Std140, MajorAxis::Column),
            Block::Push | Block::Ssbo => {
                Layout::new(LayoutStd::Std430, MajorAxis::Column)
            },
        }
    }
}

impl From<BufferType> for Block {
    fn from(buffer_type: BufferType) -> Block {
        match buffer_type {
            BufferType::Ubo => Block::Ubo,
            BufferType::Ssbo => Block::Ssbo,
        }
    }
}

// Settings made by earlier lines of the [test] section
#[derive(Debug)]
struct TestState {
    tolerance: Tolerance,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: u32,
    key: pipeline_key::Key,
    layouts: [Layout; Block::ALL.len()],
}

impl Default for TestState {
    fn default() -> TestState {
        TestState {
            tolerance: Tolerance::default(),
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            key: pipeline_key::Key::default(),
            layouts: Block::ALL.map(Block::default_layout),
        }
    }
}

impl TestState {
    fn layout(&self, block: Block) -> Layout {
        self.layouts[block as usize]
    }
}

// The section being parsed. Sections that gather their lines before
// doing anything with them carry the partial result.
enum Section {
    None,
    Comment,
    Require,
    Shader { stage: Stage, shader: Shader },
    VertexData(vbo::Parser),
    Indices,
    Test,
}

/// The part of a line that hasn’t been parsed yet, together with the
/// line number to report errors against.
#[derive(Clone, Copy)]
struct Args<'l> {
    line_num: usize,
    rest: &'l str,
}

impl<'l> Args<'l> {
    fn error(&self, message: impl Into<String>) -> LoadError {
        LoadError::Invalid {
            line_num: self.line_num,
            message: message.into(),
        }
    }

    fn number_error(&self, detail: NumError) -> LoadError {
        LoadError::Number { line_num: self.line_num, detail }
    }

    fn at_end(&self) -> bool {
        self.rest.trim().is_empty()
    }

    fn remainder(&self) -> &'l str {
        self.rest.trim()
    }

    fn finish(&self, message: &str) -> Result<(), LoadError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    // Consumes the given whitespace-separated words if the line
    // continues with all of them
    fn keyword(&mut self, words: &str) -> bool {
        match strip_words_prefix(self.rest, words) {
            Some(tail) => {
                self.rest = tail;
                true
            },
            None => false,
        }
    }

    fn any_keyword<T: Copy>(&mut self, choices: &[(&str, T)]) -> Option<T> {
        choices
            .iter()
            .find(|&&(words, _)| self.keyword(words))
            .map(|&(_, value)| value)
    }

    // Matches a stage name followed by `suffix`
    fn stage_keyword(&mut self, suffix: &str) -> Option<Stage> {
        ALL_STAGES.iter().copied().find(|stage| {
            let mut attempt = *self;

            if attempt.keyword(stage.name()) && attempt.keyword(suffix) {
                *self = attempt;
                true
            } else {
                false
            }
        })
    }

    // Consumes `ch` only if it immediately follows
    fn suffix(&mut self, ch: char) -> bool {
        match self.rest.strip_prefix(ch) {
            Some(tail) => {
                self.rest = tail;
                true
            },
            None => false,
        }
    }

    fn punct(&mut self, ch: char) -> Result<(), LoadError> {
        self.rest = self.rest.trim_start();

        if self.suffix(ch) {
            Ok(())
        } else {
            Err(self.error(format!("Expected ‘{}’", ch)))
        }
    }

    fn word(&mut self) -> Option<&'l str> {
        let (word, tail) = next_word(self.rest)?;
        self.rest = tail;
        Some(word)
    }

    fn followed_by_blank(&self) -> bool {
        self.rest.chars().next().map_or(true, char::is_whitespace)
    }

    fn number<T: Scan>(&mut self) -> Result<T, LoadError> {
        let (value, tail) =
            lexer::scan::<T>(self.rest).map_err(|e| self.number_error(e))?;
        self.rest = tail;
        Ok(value)
    }

    fn numbers<T, const N: usize>(&mut self) -> Result<[T; N], LoadError>
    where
        T: Scan + Copy + Default,
    {
        let (values, tail) = lexer::scan_array::<T, N>(self.rest)
            .map_err(|e| self.number_error(e))?;
        self.rest = tail;
        Ok(values)
    }

    // A binding is written as `set:binding:index` where the index can
    // be left out. A single number is the binding in set 0.
    fn binding(&mut self) -> Result<BufferBinding, LoadError> {
        let word = self.word().unwrap_or("");
        let mut parts = [0u32; 3];
        let mut n_parts = 0;

        for part in word.split(':') {
            if n_parts >= parts.len() {
                return Err(self.error("Invalid buffer binding"));
            }

            let (value, tail) =
                u32::scan(part).map_err(|e| self.number_error(e))?;

            if !tail.is_empty() {
                return Err(self.error("Invalid buffer binding"));
            }

            parts[n_parts] = value;
            n_parts += 1;
        }

        Ok(match parts {
            [binding, _, _] if n_parts == 1 => {
                BufferBinding { binding, ..Default::default() }
            },
            [desc_set, binding, array_index] => {
                BufferBinding { desc_set, binding, array_index }
            },
        })
    }

    fn format(&self) -> Result<&'static Format, LoadError> {
        match self.remainder() {
            "" => Err(self.error("Missing format name")),
            name => Format::lookup_by_name(name).ok_or_else(|| {
                self.error(format!("Unknown format: {}", name))
            }),
        }
    }

    fn glsl_type(&mut self) -> Result<BoxType, LoadError> {
        let name = self
            .word()
            .ok_or_else(|| self.error("Expected GLSL type name"))?;

        BoxType::from_glsl_type(name).ok_or_else(|| {
            self.error(format!("Invalid GLSL type name: {}", name))
        })
    }

    // Reads values up to the end of the line. Each value starts
    // `stride` bytes after the previous one.
    fn values(
        &mut self,
        box_type: BoxType,
        layout: Layout,
        stride: usize,
    ) -> Result<Box<[u8]>, LoadError> {
        let base_type = box_type.base_type();
        let base_size = base_type.size();
        let type_size = box_type.size(layout);
        let mut data = Vec::new();

        for start in (0..).step_by(stride) {
            data.resize(start + type_size, 0u8);

            for component in box_type.components(layout) {
                let dest = start + component.offset;
                let line_num = self.line_num;

                self.rest = base_type
                    .scan_into(self.rest, &mut data[dest..dest + base_size])
                    .map_err(|detail| LoadError::Number { line_num, detail })?;
            }

            if self.at_end() {
                break;
            }
        }

        Ok(data.into_boxed_slice())
    }

    // Numbers in brackets separated by commas, as used by the probe
    // command
    fn bracketed<T: Scan + Copy + Default, const N: usize>(
        &mut self,
        count: usize,
    ) -> Result<[T; N], LoadError> {
        let mut values = [T::default(); N];

        self.punct('(')?;

        for (i, value) in values.iter_mut().take(count).enumerate() {
            if i > 0 {
                self.punct(',')?;
            }
            *value = self.number()?;
        }

        self.punct(')')?;

        Ok(values)
    }
}

fn parse_version(s: &str) -> Option<(u32, u32, u32)> {
    let mut words = s.split_whitespace();
    let version = words.next()?;

    if words.next().is_some() {
        return None;
    }

    let mut parts = version.split('.').map(str::parse::<u32>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);

    parts.next().is_none().then_some((major, minor, patch))
}

fn is_valid_extension_or_feature_name(s: &str) -> bool {
    s.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

// A matcher for one kind of line in the [test] section. It returns
// false without side effects if the line isn’t that command.
type TestCommand<'a> = fn(&mut Parser<'a>, &str) -> Result<bool, LoadError>;

struct Parser<'a> {
    source: &'a Source,
    stream: Stream<'a>,
    section: Section,
    // Whether a section other than [comment] has been seen, after
    // which [require] is no longer allowed
    had_content: bool,
    stages: [Vec<Shader>; N_STAGES],
    state: TestState,
    commands: Vec<Command>,
    pipeline_keys: Vec<pipeline_key::Key>,
    vertex_data: Option<vbo::VertexData>,
    indices: Vec<u16>,
    requirements: Requirements,
    window_format: WindowFormat,
    buffers: Vec<Buffer>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a Source) -> Result<Parser<'a>, LoadError> {
        Ok(Parser {
            source,
            stream: Stream::new(source)?,
            section: Section::None,
            had_content: false,
            stages: Default::default(),
            state: TestState::default(),
            commands: Vec::new(),
            pipeline_keys: Vec::new(),
            vertex_data: None,
            indices: Vec::new(),
            requirements: Requirements::new(),
            window_format: WindowFormat::default(),
            buffers: Vec::new(),
        })
    }

    fn args<'l>(&self, line: &'l str) -> Args<'l> {
        Args { line_num: self.stream.line_num(), rest: line }
    }

    fn error(&self, message: impl Into<String>) -> LoadError {
        self.args("").error(message)
    }

    fn end_section(&mut self) -> Result<(), LoadError> {
        match mem::replace(&mut self.section, Section::None) {
            Section::Shader { stage, shader } => {
                self.stages[stage as usize].push(shader);
            },
            Section::VertexData(parser) => {
                let vertex_data = parser.into_vertex_data().map_err(
                    |detail| LoadError::VertexData {
                        line_num: self.stream.line_num(),
                        detail,
                    },
                )?;
                self.vertex_data = Some(vertex_data);
            },
            Section::None
            | Section::Comment
            | Section::Require
            | Section::Indices
            | Section::Test => (),
        }

        Ok(())
    }

    fn begin_section(&mut self, section: Section) {
        if !matches!(section, Section::Comment) {
            self.had_content = true;
        }

        self.section = section;
    }

    fn check_add_shader(
        &self,
        stage: Stage,
        shader: &Shader,
    ) -> Result<(), LoadError> {
        match self.stages[stage as usize].last() {
            Some(other) if other.is_spirv() || shader.is_spirv() => {
                Err(self.error(
                    "SPIR-V source can not be linked with other shaders in \
                     the same stage",
                ))
            },
            _ => Ok(()),
        }
    }

    // Handles `<stage> shader [spirv|binary]`
    fn shader_section(&mut self, name: &str) -> Result<bool, LoadError> {
        let mut args = self.args(name);

        let Some(stage) = args.stage_keyword("shader") else {
            return Ok(false);
        };

        let shader = if args.keyword("spirv") {
            Shader::Spirv(String::new())
        } else if args.keyword("binary") {
            Shader::Binary(Vec::new())
        } else {
            Shader::Glsl(String::new())
        };

        if !args.at_end() {
            return Ok(false);
        }

        self.check_add_shader(stage, &shader)?;
        self.begin_section(Section::Shader { stage, shader });

        Ok(true)
    }

    fn open_section(&mut self, name: &str) -> Result<(), LoadError> {
        if self.shader_section(name)? {
            return Ok(());
        }

        let section = match name.trim() {
            "comment" => Section::Comment,
            "require" => {
                // The test commands depend on the window size so the
                // requirements have to be known first
                if self.had_content {
                    return Err(self.error(
                        "[require] must be the first section",
                    ));
                }
                Section::Require
            },
            "test" => Section::Test,
            "indices" => Section::Indices,
            "vertex data" => {
                if self.vertex_data.is_some() {
                    return Err(self.error("Duplicate vertex data section"));
                }
                Section::VertexData(vbo::Parser::new())
            },
            "vertex shader passthrough" => {
                let shader = Shader::Binary(PASSTHROUGH_VERTEX_SHADER.to_vec());
                self.check_add_shader(Stage::Vertex, &shader)?;
                self.stages[Stage::Vertex as usize].push(shader);
                // Nothing but comments can follow the header
                Section::None
            },
            other => {
                return Err(self.error(format!("Unknown section “{}”", other)));
            },
        };

        self.begin_section(section);

        Ok(())
    }

    fn section_header(&mut self, line: &str) -> Result<bool, LoadError> {
        let Some(inner) = line.strip_prefix('[') else {
            return Ok(false);
        };

        self.end_section()?;

        let Some((name, after)) = inner.split_once(']') else {
            return Err(self.error("Missing ‘]’"));
        };

        if !after.trim().is_empty() {
            return Err(self.error("Trailing data after ‘]’"));
        }

        self.open_section(name)?;

        Ok(true)
    }

    fn require_line(&mut self, line: &str) -> Result<(), LoadError> {
        let Some(line) = trim_line_or_skip(line) else {
            return Ok(());
        };

        let mut args = self.args(line);

        if args.keyword("framebuffer") {
            self.window_format.color_format = args.format()?;
        } else if args.keyword("depthstencil") {
            self.window_format.depth_stencil_format =
                Some(args.format()?);
        } else if args.keyword("fbsize") {
            let [width, height] = args.numbers::<u32, 2>()?;

            if !args.at_end() || width == 0 || height == 0 {
                return Err(args.error("Invalid fbsize"));
            }

            self.window_format.width = width as usize;
            self.window_format.height = height as usize;
        } else if args.keyword("vulkan") {
            let (major, minor, patch) = parse_version(args.rest)
                .ok_or_else(|| args.error("Invalid Vulkan version"))?;
            self.requirements.add_version(major, minor, patch);
        } else if is_valid_extension_or_feature_name(line) {
            self.requirements.add(line);
        } else {
            return Err(args.error("Invalid require line"));
        }

        Ok(())
    }

    // Shader source and vertex data are gathered by the section
    fn section_content_line(&mut self, line: &str) -> Result<(), LoadError> {
        let line_num = self.stream.line_num();

        match &mut self.section {
            Section::Shader {
                shader: Shader::Glsl(text) | Shader::Spirv(text),
                ..
            } => text.push_str(line),
            Section::Shader { shader: Shader::Binary(words), .. } => {
                let Some(line) = trim_line_or_skip(line) else {
                    return Ok(());
                };

                for hex in line.split_whitespace() {
                    let word = u32::from_str_radix(hex, 16).map_err(|_| {
                        LoadError::Invalid {
                            line_num,
                            message: format!("Invalid hex value: {}", hex),
                        }
                    })?;
                    words.push(word);
                }
            },
            Section::VertexData(parser) => {
                parser.parse_line(line).map_err(|detail| {
                    LoadError::VertexData { line_num, detail }
                })?;
            },
            Section::None
            | Section::Comment
            | Section::Require
            | Section::Indices
            | Section::Test => (),
        }

        Ok(())
    }

    fn indices_line(&mut self, line: &str) -> Result<(), LoadError> {
        let Some(line) = trim_line_or_skip(line) else {
            return Ok(());
        };

        let mut args = self.args(line);

        while !args.at_end() {
            let token = args.remainder();
            let index = args.number::<u16>()?;

            if !args.followed_by_blank() {
                return Err(args.error(format!("Invalid index: {}", token)));
            }

            self.indices.push(index);
        }

        Ok(())
    }

    // Declares the buffer if this is the first use of the binding and
    // makes sure it is at least `size` bytes
    fn grow_buffer(
        &mut self,
        binding: BufferBinding,
        buffer_type: BufferType,
        size: usize,
    ) -> Result<(), LoadError> {
        let args = self.args("");

        match self.buffers.iter_mut().find(|b| b.binding == binding) {
            Some(buffer) if buffer.buffer_type != buffer_type => {
                Err(args.error(format!(
                    "Buffer binding point {} used with different type",
                    binding,
                )))
            },
            Some(buffer) => {
                buffer.size = buffer.size.max(size);
                Ok(())
            },
            None => {
                self.buffers.push(Buffer { binding, buffer_type, size });
                Ok(())
            },
        }
    }

    /// Returns the index of an equal key if there already is one,
    /// otherwise adds the key to the end of the list.
    fn add_pipeline_key(&mut self, key: pipeline_key::Key) -> usize {
        self.pipeline_keys
            .iter()
            .position(|other| *other == key)
            .unwrap_or_else(|| {
                self.pipeline_keys.push(key);
                self.pipeline_keys.len() - 1
            })
    }

    fn push_command(&mut self, op: Operation) {
        let line_num = self.stream.line_num();
        self.commands.push(Command { line_num, op });
    }

    fn set_buffer_subdata(
        &mut self,
        binding: BufferBinding,
        buffer_type: BufferType,
        mut args: Args,
    ) -> Result<(), LoadError> {
        let box_type = args.glsl_type()?;
        let offset = args.number::<u32>()? as usize;
        let layout = self.state.layout(buffer_type.into());
        let data =
            args.values(box_type, layout, box_type.array_stride(layout))?;

        self.grow_buffer(binding, buffer_type, offset + data.len())?;
        self.push_command(Operation::SetBufferData { binding, offset, data });

        Ok(())
    }

    fn patch_parameter_vertices(
        &mut self,
        line: &str,
    ) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("patch parameter vertices") {
            return Ok(false);
        }

        let count = args.number::<u32>()?;
        args.finish("Invalid patch parameter vertices command")?;
        self.state.key.set_patch_control_points(count);

        Ok(true)
    }

    fn clear_values(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("clear") {
            return Ok(false);
        }

        if args.keyword("color") {
            let color = args.numbers::<f32, 4>()?;
            args.finish("Invalid clear color command")?;
            self.state.clear_color = color;
        } else if args.keyword("depth") {
            let depth = args.number::<f32>()?;
            args.finish("Invalid clear depth command")?;
            self.state.clear_depth = depth;
        } else if args.keyword("stencil") {
            let stencil = args.number::<u32>()?;
            args.finish("Invalid clear stencil command")?;
            self.state.clear_stencil = stencil;
        } else {
            return Ok(false);
        }

        Ok(true)
    }

    fn block_layout(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        let Some(block) = args.any_keyword(&[
            ("push layout", Block::Push),
            ("ubo layout", Block::Ubo),
            ("ssbo layout", Block::Ssbo),
        ]) else {
            return Ok(false);
        };

        // Anything not mentioned goes back to the default
        let mut layout = block.default_layout();

        for token in args.rest.split_whitespace() {
            match token {
                "std140" => layout.std = LayoutStd::Std140,
                "std430" => layout.std = LayoutStd::Std430,
                "row_major" => layout.major = MajorAxis::Row,
                "column_major" => layout.major = MajorAxis::Column,
                _ => {
                    return Err(args.error(format!(
                        "Unknown layout parameter “{}”",
                        token,
                    )));
                },
            }
        }

        self.state.layouts[block as usize] = layout;

        Ok(true)
    }

    fn buffer_command(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        let Some(buffer_type) = args.any_keyword(&[
            ("ssbo", BufferType::Ssbo),
            ("ubo", BufferType::Ubo),
        ]) else {
            return Ok(false);
        };

        let binding = args.binding()?;

        if args.keyword("subdata") {
            self.set_buffer_subdata(binding, buffer_type, args)?;
        } else {
            let size = args.number::<u32>()?;
            args.finish("Invalid buffer command")?;
            self.grow_buffer(binding, buffer_type, size as usize)?;
        }

        Ok(true)
    }

    fn tolerance(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("tolerance") {
            return Ok(false);
        }

        let mut values = Vec::with_capacity(4);
        let mut is_percent = false;

        while !args.at_end() {
            if values.len() >= 4 {
                return Err(args.error(
                    "tolerance command has extra arguments",
                ));
            }

            values.push(args.number::<f64>()?);

            let percent = args.suffix('%');

            if values.len() > 1 && percent != is_percent {
                return Err(args.error(
                    "Either all tolerance values must be a percentage or none",
                ));
            }

            is_percent = percent;
        }

        let value = match values[..] {
            [all] => [all; 4],
            [r, g, b, a] => [r, g, b, a],
            _ => {
                return Err(args.error(
                    "There must be either 1 or 4 tolerance values",
                ));
            },
        };

        self.state.tolerance = Tolerance::new(value, is_percent);

        Ok(true)
    }

    fn entrypoint(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        let Some(stage) = args.stage_keyword("entrypoint") else {
            return Ok(false);
        };

        match args.remainder() {
            "" => Err(args.error("Missing entrypoint name")),
            name => {
                self.state.key.set_entrypoint(stage, name.to_owned());
                Ok(true)
            },
        }
    }

    fn probe_ssbo(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("probe ssbo") {
            return Ok(false);
        }

        let box_type = args.glsl_type()?;
        let binding = args.binding()?;
        let offset = args.number::<u32>()? as usize;

        let operator = args
            .word()
            .ok_or_else(|| args.error("Expected comparison operator"))?;
        let comparison = Comparison::from_operator(operator).ok_or_else(|| {
            args.error(format!("Unknown comparison operator: {}", operator))
        })?;

        let layout = self.state.layout(Block::Ssbo);
        // The expected values are tightly packed
        let values = args.values(box_type, layout, box_type.size(layout))?;

        self.push_command(Operation::ProbeSsbo {
            binding,
            comparison,
            offset,
            box_type,
            layout,
            values,
            tolerance: self.state.tolerance.clone(),
        });

        Ok(true)
    }

    fn probe(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);
        let relative = args.keyword("relative");

        if !args.keyword("probe") {
            return Ok(false);
        }

        #[derive(Clone, Copy)]
        enum Region {
            Point,
            Rect,
            All,
        }

        let region = args
            .any_keyword(&[("rect", Region::Rect), ("all", Region::All)])
            .unwrap_or(Region::Point);

        let n_components = args
            .any_keyword(&[("rgb", 3), ("rgba", 4)])
            .ok_or_else(|| {
                args.error("Expected rgb or rgba in probe command")
            })?;

        let width = self.window_format.width;
        let height = self.window_format.height;

        let n_coords = match region {
            Region::All if relative => {
                return Err(args.error(
                    "‘all’ can’t be used with a relative probe",
                ));
            },
            Region::All => 0,
            Region::Point => 2,
            Region::Rect => 4,
        };

        let coords: [u32; 4] = if relative {
            let fractions = args.bracketed::<f32, 4>(n_coords)?;
            let mut coords = [0; 4];

            for (i, (coord, fraction)) in
                coords.iter_mut().zip(fractions).enumerate()
            {
                let scale = if i % 2 == 0 { width } else { height };
                *coord = (fraction * scale as f32) as u32;
            }

            coords
        } else if n_coords > 0 {
            args.bracketed::<u32, 4>(n_coords)?
        } else {
            [0, 0, width as u32, height as u32]
        };

        let color = if n_coords == 0 {
            // The color for “probe all” isn’t in brackets
            let mut color = [0.0; 4];
            for value in color.iter_mut().take(n_components) {
                *value = args.number::<f64>()?;
            }
            color
        } else {
            args.bracketed::<f64, 4>(n_components)?
        };

        args.finish("Extra data after probe command")?;

        let [x, y, w, h] = match region {
            Region::Point => [coords[0], coords[1], 1, 1],
            Region::Rect | Region::All => coords,
        };

        self.push_command(Operation::ProbeRect {
            n_components: n_components as u32,
            x,
            y,
            w,
            h,
            color,
            tolerance: self.state.tolerance.clone(),
        });

        Ok(true)
    }

    fn draw_arrays(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("draw arrays") {
            return Ok(false);
        }

        let mut instanced = false;
        let mut indexed = false;

        loop {
            if args.keyword("instanced") {
                instanced = true;
            } else if args.keyword("indexed") {
                indexed = true;
            } else {
                break;
            }
        }

        let name = args
            .word()
            .ok_or_else(|| args.error("Expected topology name"))?;
        let topology = Topology::from_name(name).ok_or_else(|| {
            args.error(format!("Unknown topology: {}", name))
        })?;

        let [first_vertex, vertex_count] = args.numbers::<u32, 2>()?;
        let instance_count = if instanced {
            args.number::<u32>()?
        } else {
            1
        };

        args.finish("Extra data at end of line")?;

        let mut key = self.state.key.clone();
        key.set_pipeline_type(pipeline_key::Type::Graphics);
        key.set_source(pipeline_key::Source::VertexData);
        key.set_topology(topology);
        let pipeline_key = self.add_pipeline_key(key);

        self.push_command(Operation::DrawArrays {
            topology,
            indexed,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance: 0,
            pipeline_key,
        });

        Ok(true)
    }

    fn compute(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("compute") {
            return Ok(false);
        }

        let [x, y, z] = args.numbers::<u32, 3>()?;
        args.finish("Extra data at end of line")?;

        let mut key = self.state.key.clone();
        key.set_pipeline_type(pipeline_key::Type::Compute);
        let pipeline_key = self.add_pipeline_key(key);

        self.push_command(Operation::DispatchCompute { x, y, z, pipeline_key });

        Ok(true)
    }

    fn uniform_ubo(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("uniform ubo") {
            return Ok(false);
        }

        let binding = args.binding()?;
        self.set_buffer_subdata(binding, BufferType::Ubo, args)?;

        Ok(true)
    }

    fn push_constant(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        // “uniform” is accepted for compatibility with piglit
        if !args.keyword("push") && !args.keyword("uniform") {
            return Ok(false);
        }

        let box_type = args.glsl_type()?;
        let offset = args.number::<u32>()? as usize;
        let layout = self.state.layout(Block::Push);
        let data =
            args.values(box_type, layout, box_type.array_stride(layout))?;

        self.push_command(Operation::SetPushCommand { offset, data });

        Ok(true)
    }

    fn clear(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("clear") || !args.at_end() {
            return Ok(false);
        }

        self.push_command(Operation::Clear {
            color: self.state.clear_color,
            depth: self.state.clear_depth,
            stencil: self.state.clear_stencil,
        });

        Ok(true)
    }

    fn draw_rect(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        if !args.keyword("draw rect") {
            return Ok(false);
        }

        let mut ortho = false;
        let mut patch = false;

        loop {
            if args.keyword("ortho") {
                ortho = true;
            } else if args.keyword("patch") {
                patch = true;
            } else {
                break;
            }
        }

        let [mut x, mut y, mut w, mut h] = args.numbers::<f32, 4>()?;
        args.finish("Extra data at end of line")?;

        if ortho {
            // Convert from framebuffer pixels to normalized coordinates
            let x_scale = 2.0 / self.window_format.width as f32;
            let y_scale = 2.0 / self.window_format.height as f32;
            x = x * x_scale - 1.0;
            y = y * y_scale - 1.0;
            w *= x_scale;
            h *= y_scale;
        }

        let mut key = self.state.key.clone();
        key.set_pipeline_type(pipeline_key::Type::Graphics);
        key.set_source(pipeline_key::Source::Rectangle);
        key.set_topology(if patch {
            Topology::PatchList
        } else {
            Topology::TriangleStrip
        });
        key.set_patch_control_points(4);
        let pipeline_key = self.add_pipeline_key(key);

        self.push_command(Operation::DrawRect { x, y, w, h, pipeline_key });

        Ok(true)
    }

    fn pipeline_property(&mut self, line: &str) -> Result<bool, LoadError> {
        let mut args = self.args(line);

        let Some(name) = args.word() else {
            return Ok(false);
        };

        let value = args.rest.trim_start();

        match self.state.key.set(name, value) {
            Ok(()) => Ok(true),
            Err(SetPropertyError::NotFound { .. }) => Ok(false),
            Err(SetPropertyError::InvalidValue { .. }) => {
                Err(args.error(format!("Invalid value: {}", value)))
            },
        }
    }

    fn test_line(&mut self, line: &str) -> Result<(), LoadError> {
        let Some(line) = trim_line_or_skip(line) else {
            return Ok(());
        };

        // The first command that recognises the line wins. The layout
        // commands start with the same word as the buffer and push
        // commands so they have to come first.
        let commands: [TestCommand<'a>; 15] = [
            Self::patch_parameter_vertices,
            Self::clear_values,
            Self::block_layout,
            Self::buffer_command,
            Self::tolerance,
            Self::entrypoint,
            Self::probe_ssbo,
            Self::probe,
            Self::draw_arrays,
            Self::compute,
            Self::uniform_ubo,
            Self::push_constant,
            Self::clear,
            Self::draw_rect,
            Self::pipeline_property,
        ];

        for command in commands {
            if command(self, line)? {
                return Ok(());
            }
        }

        Err(self.error("Invalid test command"))
    }

    fn process_line(&mut self, line: &str) -> Result<(), LoadError> {
        if self.section_header(line)? {
            return Ok(());
        }

        match self.section {
            Section::None => match trim_line_or_skip(line) {
                Some(_) => Err(self.error("expected empty line")),
                None => Ok(()),
            },
            Section::Comment => Ok(()),
            Section::Require => self.require_line(line),
            Section::Indices => self.indices_line(line),
            Section::Test => self.test_line(line),
            Section::Shader { .. } | Section::VertexData(_) => {
                self.section_content_line(line)
            },
        }
    }

    fn parse(mut self) -> Result<Script, LoadError> {
        let mut line = String::new();

        while self.stream.read_line(&mut line)? > 0 {
            self.process_line(&line)?;
            line.clear();
        }

        self.end_section()?;

        self.buffers.sort_by_key(|buffer| buffer.binding);

        tracing::debug!(
            filename = %self.source.filename(),
            commands = self.commands.len(),
            pipeline_keys = self.pipeline_keys.len(),
            buffers = self.buffers.len(),
            "loaded script",
        );

        Ok(Script {
            filename: self.source.filename().into_owned(),
            stages: self.stages.map(Vec::into_boxed_slice),
            commands: self.commands.into_boxed_slice(),
            pipeline_keys: self.pipeline_keys.into_boxed_slice(),
            requirements: self.requirements,
            window_format: self.window_format,
            vertex_data: self.vertex_data,
            indices: self.indices.into_boxed_slice(),
            buffers: self.buffers.into_boxed_slice(),
        })
    }
}

impl Script {
    /// Parses the whole source. The first error stops the parsing.
    pub fn load(source: &Source) -> Result<Script, LoadError> {
        Parser::new(source)?.parse()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn shaders(&self, stage: Stage) -> &[Shader] {
        &self.stages[stage as usize]
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The distinct pipeline keys. Draw and compute commands refer to
    /// these by index.
    pub fn pipeline_keys(&self) -> &[pipeline_key::Key] {
        &self.pipeline_keys
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn window_format(&self) -> &WindowFormat {
        &self.window_format
    }

    pub fn vertex_data(&self) -> Option<&vbo::VertexData> {
        self.vertex_data.as_ref()
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Every buffer used by the commands, sorted by binding
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Stages that have at least one shader, as a mask of
    /// [Stage::flag] bits
    pub fn stages_mask(&self) -> u32 {
        ALL_STAGES
            .iter()
            .filter(|&&stage| !self.shaders(stage).is_empty())
            .fold(0, |mask, &stage| mask | stage.flag())
    }
}
