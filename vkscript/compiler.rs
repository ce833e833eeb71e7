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

//! Turns the shaders of a script into SPIR-V. GLSL and SPIR-V
//! assembly are handed to external tools through temporary files.
//! The tools can be overridden with the environment variables
//! `PIGLIT_GLSLANG_VALIDATOR_BINARY`, `PIGLIT_SPIRV_AS_BINARY` and
//! `PIGLIT_SPIRV_DIS_BINARY`.

use crate::shader_stage::Stage;
use crate::logger::Logger;
use crate::script::{Script, Shader};
use crate::requirements::extract_version;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::mem;
use std::env;
use std::process::{Stdio, Command, Output};
use tempfile::NamedTempFile;

/// An error that can be returned by [build_stage].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// There were no shaders for this stage in the script
    #[error("No shaders for stage {0:?}")]
    MissingStageShaders(Stage),
    #[error(transparent)]
    IoError(#[from] io::Error),
    /// A compiler or assembler command returned a non-zero status
    #[error("A subprocess failed with a non-zero exit status")]
    CommandFailed,
    /// The generated shader binary didn’t have the right SPIR-V magic
    /// number or wasn’t a multiple of 32-bit integers.
    #[error("The compiler or assembler generated an invalid SPIR-V binary")]
    InvalidShaderBinary,
}

/// Something that can produce SPIR-V from the textual shader
/// formats. Any output from the tools should be written to the
/// logger.
pub trait Compiler: fmt::Debug {
    fn compile_glsl(
        &mut self,
        logger: &mut Logger,
        stage: Stage,
        sources: &[&str],
        target_env: &str,
    ) -> Result<Vec<u32>, Error>;

    fn assemble_spirv(
        &mut self,
        logger: &mut Logger,
        source: &str,
        target_env: &str,
    ) -> Result<Vec<u32>, Error>;

    fn disassemble(
        &mut self,
        logger: &mut Logger,
        code: &[u32],
    ) -> Result<(), Error>;
}

/// A [Compiler] that runs `glslangValidator`, `spirv-as` and
/// `spirv-dis`.
#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    glslang: OsString,
    spirv_as: OsString,
    spirv_dis: OsString,
}

fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Vertex => "vert",
        Stage::TessCtrl => "tesc",
        Stage::TessEval => "tese",
        Stage::Geometry => "geom",
        Stage::Fragment => "frag",
        Stage::Compute => "comp",
    }
}

fn handle_command_output(
    logger: &mut Logger,
    output: Output,
) -> Result<(), Error> {
    logger.write_all(output.stdout.as_slice())?;
    logger.write_all(output.stderr.as_slice())?;
    logger.flush()?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed)
    }
}

fn run_tool(
    logger: &mut Logger,
    command: &mut Command,
) -> Result<(), Error> {
    tracing::debug!(?command, "running shader tool");

    handle_command_output(
        logger,
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?,
    )
}

/// Converts the bytes of a SPIR-V module into words. The magic number
/// at the start decides the byte order.
pub fn parse_spirv_binary(bytes: &[u8]) -> Result<Vec<u32>, Error> {
    const WORD_SIZE: usize = mem::size_of::<u32>();

    if bytes.len() % WORD_SIZE != 0 || bytes.len() < WORD_SIZE {
        return Err(Error::InvalidShaderBinary);
    }

    let big_endian = match bytes[0..WORD_SIZE] {
        [0x07, 0x23, 0x02, 0x03] => true,
        [0x03, 0x02, 0x23, 0x07] => false,
        _ => return Err(Error::InvalidShaderBinary),
    };

    Ok(bytes.chunks_exact(WORD_SIZE).map(|chunk| {
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(chunk);

        if big_endian {
            u32::from_be_bytes(word)
        } else {
            u32::from_le_bytes(word)
        }
    }).collect())
}

fn create_temp_file_for_source(source: &[u8]) -> Result<NamedTempFile, Error> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(source)?;
    temp_file.flush()?;

    Ok(temp_file)
}

fn tool_from_env(var: &str, default: &str) -> OsString {
    env::var_os(var).unwrap_or_else(|| default.into())
}

impl ExternalCompiler {
    pub fn new<S: Into<OsString>>(
        glslang: S,
        spirv_as: S,
        spirv_dis: S,
    ) -> ExternalCompiler {
        ExternalCompiler {
            glslang: glslang.into(),
            spirv_as: spirv_as.into(),
            spirv_dis: spirv_dis.into(),
        }
    }

    /// Uses the tools named by the environment variables, or the
    /// default names to be found in the path.
    pub fn from_env() -> ExternalCompiler {
        ExternalCompiler {
            glslang: tool_from_env(
                "PIGLIT_GLSLANG_VALIDATOR_BINARY",
                "glslangValidator",
            ),
            spirv_as: tool_from_env("PIGLIT_SPIRV_AS_BINARY", "spirv-as"),
            spirv_dis: tool_from_env("PIGLIT_SPIRV_DIS_BINARY", "spirv-dis"),
        }
    }

    fn read_module(module_file: &NamedTempFile) -> Result<Vec<u32>, Error> {
        parse_spirv_binary(&fs::read(module_file.path())?)
    }
}

impl Compiler for ExternalCompiler {
    fn compile_glsl(
        &mut self,
        logger: &mut Logger,
        stage: Stage,
        sources: &[&str],
        target_env: &str,
    ) -> Result<Vec<u32>, Error> {
        let shader_files = sources
            .iter()
            .map(|source| create_temp_file_for_source(source.as_bytes()))
            .collect::<Result<Vec<_>, Error>>()?;

        let module_file = NamedTempFile::new()?;

        run_tool(
            logger,
            Command::new(&self.glslang)
                .args([
                    "-V",
                    "--target-env", target_env,
                    "-S", stage_name(stage),
                ])
                .arg("-o").arg(module_file.path())
                .args(shader_files.iter().map(|file| file.path())),
        )?;

        ExternalCompiler::read_module(&module_file)
    }

    fn assemble_spirv(
        &mut self,
        logger: &mut Logger,
        source: &str,
        target_env: &str,
    ) -> Result<Vec<u32>, Error> {
        let source_file = create_temp_file_for_source(source.as_bytes())?;
        let module_file = NamedTempFile::new()?;

        run_tool(
            logger,
            Command::new(&self.spirv_as)
                .args(["--target-env", target_env])
                .arg("-o").arg(module_file.path())
                .arg(source_file.path()),
        )?;

        ExternalCompiler::read_module(&module_file)
    }

    fn disassemble(
        &mut self,
        logger: &mut Logger,
        code: &[u32],
    ) -> Result<(), Error> {
        let bytes = code
            .iter()
            .flat_map(|word| word.to_ne_bytes())
            .collect::<Vec<u8>>();
        let module_file = create_temp_file_for_source(&bytes)?;

        run_tool(
            logger,
            Command::new(&self.spirv_dis).arg(module_file.path()),
        )
    }
}

fn version_string(version: u32) -> String {
    let (version_major, version_minor, _) = extract_version(version);
    format!("vulkan{}.{}", version_major, version_minor)
}

/// Builds the SPIR-V for one stage of the script. Binary shaders are
/// used as is.
pub fn build_stage(
    logger: &mut Logger,
    compiler: &mut dyn Compiler,
    script: &Script,
    stage: Stage,
    show_disassembly: bool,
) -> Result<Vec<u32>, Error> {
    let shaders = script.shaders(stage);
    let target_env = version_string(script.requirements().version());

    let code = match shaders.first() {
        None => return Err(Error::MissingStageShaders(stage)),
        Some(Shader::Glsl(_)) => {
            let sources = shaders.iter().map(|shader| match shader {
                Shader::Glsl(source) => source.as_str(),
                _ => unreachable!("Unexpected shader type"),
            }).collect::<Vec<&str>>();

            compiler.compile_glsl(logger, stage, &sources, &target_env)?
        },
        Some(Shader::Spirv(source)) => {
            // The script parser should have ensured that there’s
            // only one shader
            assert_eq!(shaders.len(), 1);
            compiler.assemble_spirv(logger, source, &target_env)?
        },
        Some(Shader::Binary(data)) => {
            assert_eq!(shaders.len(), 1);
            data.clone()
        },
    };

    tracing::debug!(
        stage = stage.name(),
        words = code.len(),
        "built shader stage",
    );

    if show_disassembly {
        compiler.disassemble(logger, &code)?;
    }

    Ok(code)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::source::Source;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A compiler that doesn’t run anything. GLSL sources are
    /// “compiled” to the SPIR-V magic number followed by the length
    /// of each source.
    #[derive(Debug, Default)]
    pub(crate) struct FakeCompiler {
        pub(crate) calls: Vec<String>,
        pub(crate) fail: bool,
    }

    impl Compiler for FakeCompiler {
        fn compile_glsl(
            &mut self,
            logger: &mut Logger,
            stage: Stage,
            sources: &[&str],
            target_env: &str,
        ) -> Result<Vec<u32>, Error> {
            self.calls.push(format!(
                "glsl {} {} {}",
                stage_name(stage),
                target_env,
                sources.len(),
            ));

            if self.fail {
                writeln!(logger, "error: fake compile failure")?;
                return Err(Error::CommandFailed);
            }

            let mut code = vec![0x07230203];
            code.extend(sources.iter().map(|source| source.len() as u32));
            Ok(code)
        }

        fn assemble_spirv(
            &mut self,
            _logger: &mut Logger,
            source: &str,
            target_env: &str,
        ) -> Result<Vec<u32>, Error> {
            self.calls.push(format!("spirv {}", target_env));
            Ok(vec![0x07230203, source.len() as u32])
        }

        fn disassemble(
            &mut self,
            logger: &mut Logger,
            code: &[u32],
        ) -> Result<(), Error> {
            self.calls.push(format!("dis {}", code.len()));
            writeln!(logger, "disassembly")?;
            Ok(())
        }
    }

    fn collecting_logger() -> (Logger, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let cb_lines = Rc::clone(&lines);
        let logger = Logger::new(Some(Rc::new(move |line: &str| {
            cb_lines.borrow_mut().push(line.to_owned());
        })));
        (logger, lines)
    }

    fn load(source: &str) -> Script {
        Script::load(&Source::from_string(source.to_owned())).unwrap()
    }

    #[test]
    fn spirv_binary_byte_order() {
        assert_eq!(
            parse_spirv_binary(&[3, 2, 0x23, 7, 1, 0, 0, 0]).unwrap(),
            [0x07230203, 1],
        );
        assert_eq!(
            parse_spirv_binary(&[7, 0x23, 2, 3, 0, 0, 0, 2]).unwrap(),
            [0x07230203, 2],
        );
        assert!(matches!(
            parse_spirv_binary(&[1, 2, 3, 4]),
            Err(Error::InvalidShaderBinary),
        ));
        assert!(matches!(
            parse_spirv_binary(&[3, 2, 0x23, 7, 1]),
            Err(Error::InvalidShaderBinary),
        ));
        assert!(matches!(
            parse_spirv_binary(&[]),
            Err(Error::InvalidShaderBinary),
        ));
    }

    #[test]
    fn glsl_stage() {
        let script = load(
            "[require]\n\
             vulkan 1.1\n\
             [fragment shader]\n\
             abc\n\
             [fragment shader]\n\
             defgh\n"
        );
        let (mut logger, _) = collecting_logger();
        let mut compiler = FakeCompiler::default();

        let code = build_stage(
            &mut logger,
            &mut compiler,
            &script,
            Stage::Fragment,
            false,
        ).unwrap();

        assert_eq!(code, [0x07230203, 4, 6]);
        assert_eq!(compiler.calls, ["glsl frag vulkan1.1 2"]);
    }

    #[test]
    fn spirv_and_binary_stages() {
        let script = load(
            "[vertex shader spirv]\n\
             OpCapability Shader\n\
             [compute shader binary]\n\
             7230203 99\n"
        );
        let (mut logger, lines) = collecting_logger();
        let mut compiler = FakeCompiler::default();

        let code = build_stage(
            &mut logger,
            &mut compiler,
            &script,
            Stage::Vertex,
            false,
        ).unwrap();
        assert_eq!(code.len(), 2);

        let code = build_stage(
            &mut logger,
            &mut compiler,
            &script,
            Stage::Compute,
            true,
        ).unwrap();
        assert_eq!(code, [0x7230203, 0x99]);

        assert_eq!(compiler.calls, ["spirv vulkan1.0", "dis 2"]);
        assert_eq!(*lines.borrow(), ["disassembly"]);
    }

    #[test]
    fn missing_stage() {
        let script = load("[test]\nclear\n");
        let (mut logger, _) = collecting_logger();

        let error = build_stage(
            &mut logger,
            &mut FakeCompiler::default(),
            &script,
            Stage::Geometry,
            false,
        ).unwrap_err();

        assert_eq!(error.to_string(), "No shaders for stage Geometry");
    }

    #[test]
    fn compile_failure_is_logged() {
        let script = load("[vertex shader]\nbad\n");
        let (mut logger, lines) = collecting_logger();
        let mut compiler = FakeCompiler { fail: true, ..Default::default() };

        let error = build_stage(
            &mut logger,
            &mut compiler,
            &script,
            Stage::Vertex,
            false,
        ).unwrap_err();

        assert!(matches!(error, Error::CommandFailed));
        assert_eq!(*lines.borrow(), ["error: fake compile failure"]);
    }

    #[cfg(unix)]
    #[test]
    fn external_tools() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-tool");

        fs::write(
            &tool,
            "#!/bin/sh\n\
             out=\"\"\n\
             while [ $# -gt 0 ]; do\n\
             \x20 case \"$1\" in\n\
             \x20   -o) out=\"$2\"; shift 2 ;;\n\
             \x20   *) echo \"arg: $1\"; shift ;;\n\
             \x20 esac\n\
             done\n\
             if [ -n \"$out\" ]; then\n\
             \x20 printf '\\003\\002\\043\\007\\052\\000\\000\\000' > \"$out\"\n\
             else\n\
             \x20 echo disassembly\n\
             fi\n",
        ).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755))
            .unwrap();

        let mut compiler = ExternalCompiler::new(&tool, &tool, &tool);
        let (mut logger, lines) = collecting_logger();

        let code = compiler.compile_glsl(
            &mut logger,
            Stage::Compute,
            &["void main() {}"],
            "vulkan1.0",
        ).unwrap();
        assert_eq!(code, [0x07230203, 42]);

        {
            let lines = lines.borrow();
            assert_eq!(&lines[0..5], [
                "arg: -V",
                "arg: --target-env",
                "arg: vulkan1.0",
                "arg: -S",
                "arg: comp",
            ]);
            assert_eq!(lines.len(), 6);
            assert!(lines[5].starts_with("arg: "));
        }

        lines.borrow_mut().clear();

        let code = compiler.assemble_spirv(
            &mut logger,
            "OpCapability Shader",
            "vulkan1.2",
        ).unwrap();
        assert_eq!(code, [0x07230203, 42]);

        lines.borrow_mut().clear();

        compiler.disassemble(&mut logger, &code).unwrap();
        assert_eq!(lines.borrow().last().unwrap(), "disassembly");

        let mut missing = ExternalCompiler::new(
            dir.path().join("missing"),
            dir.path().join("missing"),
            dir.path().join("missing"),
        );
        assert!(matches!(
            missing.disassemble(&mut logger, &code),
            Err(Error::IoError(_)),
        ));
    }
}
