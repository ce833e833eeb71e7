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

//! Command line driver for shader test scripts.
//!
//! The driver has no GPU backend of its own. Scripts run on the
//! recording backend, which checks that every command can be issued
//! and keeps host copies of the buffers but doesn’t rasterize
//! anything. Clears of simple color formats are applied to the
//! framebuffer so that probes of cleared areas still work.

use anyhow::{bail, Context};
use clap::Parser;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;
use vkscript::backend::Framebuffer;
use vkscript::compiler::ExternalCompiler;
use vkscript::recording::RecordingFactory;
use vkscript::source::TokenReplacement;
use vkscript::{inspect, result, Config, Executor, Source};

#[derive(Parser, Debug)]
#[command(
    name = "vkscript",
    about = "Runs the shader test script SCRIPT",
    long_about = "Runs the shader test script SCRIPT.\n\n\
                  The scripts are executed on a recording backend that \
                  issues every command without rendering anything, so \
                  only clears show up in the framebuffer."
)]
struct Args {
    /// The scripts to run
    #[arg(value_name = "SCRIPT", required = true)]
    scripts: Vec<PathBuf>,

    /// Write the final rendering to IMG as a PPM image
    #[arg(short, long, value_name = "IMG")]
    image: Option<PathBuf>,

    /// Dump contents of a UBO or SSBO to BUF
    #[arg(short, long, value_name = "BUF")]
    buffer: Option<PathBuf>,

    /// Select which buffer to dump using the -b option. Defaults to
    /// first buffer
    #[arg(short = 'B', long, value_name = "BINDING")]
    binding: Option<u32>,

    /// Show the SPIR-V disassembly
    #[arg(short, long)]
    disasm: bool,

    /// Replace occurences of TOK with REPL in the scripts
    #[arg(short = 'D', long = "replace", value_name = "TOK=REPL")]
    replacements: Vec<TokenReplacement>,

    /// Don’t print any non-error information to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Select the Vulkan device. The first device is 1.
    #[arg(
        long,
        value_name = "DEVID",
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    device_id: Option<u32>,
}

fn write_ppm(framebuffer: &Framebuffer, filename: &Path) -> anyhow::Result<()> {
    let mut file = BufWriter::new(
        File::create(filename)
            .with_context(|| format!("{}", filename.display()))?
    );

    write!(
        &mut file,
        "P6\n\
         {} {}\n\
         255\n",
        framebuffer.width,
        framebuffer.height,
    )?;

    for y in 0..framebuffer.height {
        for x in 0..framebuffer.width {
            let pixel = framebuffer.format.load_pixel(framebuffer.pixel(x, y));
            let mut bytes = [0u8; 3];

            for (i, component) in pixel[0..3].iter().enumerate() {
                bytes[i] = (component.clamp(0.0, 1.0) * 255.0).round() as u8;
            }

            file.write_all(&bytes)?;
        }
    }

    file.flush()?;

    Ok(())
}

fn write_buffer(
    buffers: &[inspect::Buffer],
    filename: &Path,
    binding: Option<u32>,
) -> anyhow::Result<()> {
    let buffer = match binding {
        None => match buffers.first() {
            Some(buffer) => buffer,
            None => bail!("Buffer dump requested but the script has no buffers"),
        },
        Some(binding) => match buffers.iter().find(
            |b| b.binding.binding == binding
        ) {
            Some(buffer) => buffer,
            None => bail!("No buffer with binding {} was found", binding),
        },
    };

    let mut file = File::create(filename)
        .with_context(|| format!("{}", filename.display()))?;

    file.write_all(buffer.data)?;

    Ok(())
}

// Writes the requested files from the inspect callback. Any failure
// is remembered so that the overall result can be a failure.
fn inspect_callback(args: &Args, failed: Rc<Cell<bool>>) -> inspect::Callback {
    let image = args.image.clone();
    let buffer = args.buffer.clone();
    let binding = args.binding;

    inspect::callback(move |data| {
        if let Some(filename) = &image {
            if let Err(e) = write_ppm(&data.color_buffer, filename) {
                eprintln!("{:#}", e);
                failed.set(true);
            }
        }

        if let Some(filename) = &buffer {
            if let Err(e) = write_buffer(data.buffers, filename, binding) {
                eprintln!("{:#}", e);
                failed.set(true);
            }
        }
    })
}

fn set_up_config(args: &Args, failed: &Rc<Cell<bool>>) -> Config {
    let mut config = Config::new();

    if args.image.is_some() || args.buffer.is_some() {
        config.set_inspect_cb(Some(inspect_callback(args, Rc::clone(failed))));
    }

    if let Some(device_id) = args.device_id {
        config.set_device_id(Some(device_id as usize - 1));
    }

    config.set_show_disassembly(args.disasm);

    config
}

fn format_result(result: result::Result) -> String {
    format!("PIGLIT: {{\"result\": \"{}\" }}", result.name())
}

fn run(args: &Args) -> result::Result {
    let failed = Rc::new(Cell::new(false));
    let config = Rc::new(RefCell::new(set_up_config(args, &failed)));

    let mut executor = Executor::new(
        Rc::clone(&config),
        Box::new(RecordingFactory::default()),
        Box::new(ExternalCompiler::from_env()),
    );

    let mut overall_result = result::Result::Skip;

    for script_filename in args.scripts.iter() {
        if args.scripts.len() > 1 && !args.quiet {
            println!("{}", script_filename.display());
        }

        let mut source = Source::from_file(script_filename);

        for replacement in args.replacements.iter() {
            source.add_token_replacement(
                replacement.token.clone(),
                replacement.replacement.clone(),
            );
        }

        let result = executor.run(&source);

        tracing::debug!(
            script = %script_filename.display(),
            result = result.name(),
        );

        overall_result = overall_result.merge(result);
    }

    if failed.get() {
        overall_result = overall_result.merge(result::Result::Fail);
    }

    overall_result
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        result::Result::Fail => {
            eprintln!("{}", format_result(result::Result::Fail));
            ExitCode::FAILURE
        },
        result::Result::Pass if args.quiet => ExitCode::SUCCESS,
        result => {
            println!("{}", format_result(result));
            ExitCode::SUCCESS
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsString;
    use vkscript::script::{BufferBinding, BufferType};
    use vkscript::{Format, VkFormat};

    #[test]
    fn command_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn all_arg_types() {
        let args = Args::try_parse_from([
            "vkscript",
            "-dB", "12",
            "--image", "screenshot.ppm",
            "--replace", "bad=aĉa",
            "-D", "good=bona",
            "--device-id", "2",
            "script.shader_test",
        ]).unwrap();

        assert!(args.disasm);
        assert!(!args.quiet);
        assert_eq!(args.binding, Some(12));
        assert_eq!(args.image, Some(PathBuf::from("screenshot.ppm")));
        assert_eq!(args.buffer, None);
        assert_eq!(args.device_id, Some(2));
        assert_eq!(
            args.replacements,
            [
                TokenReplacement {
                    token: "bad".to_owned(),
                    replacement: "aĉa".to_owned(),
                },
                TokenReplacement {
                    token: "good".to_owned(),
                    replacement: "bona".to_owned(),
                },
            ],
        );
        assert_eq!(args.scripts, [PathBuf::from("script.shader_test")]);

        let config = set_up_config(&args, &Rc::new(Cell::new(false)));
        assert!(format!("{:?}", config).contains("device_id: Some(1)"));
    }

    #[test]
    fn trailing_arguments() {
        let args = Args::try_parse_from([
            "vkscript",
            "-qi", "image.ppm",
            "--",
            "-i.shader_test",
        ]).unwrap();

        assert!(args.quiet);
        assert_eq!(args.image, Some(PathBuf::from("image.ppm")));
        assert_eq!(args.scripts, [PathBuf::from("-i.shader_test")]);
    }

    #[test]
    fn bad_arguments() {
        // No scripts
        assert!(Args::try_parse_from(["vkscript", "-d"]).is_err());
        assert!(Args::try_parse_from(["vkscript", "--bad-option", "a"]).is_err());
        assert!(Args::try_parse_from(["vkscript", "a", "--buffer"]).is_err());
        assert!(Args::try_parse_from(["vkscript", "a", "-B", "twelve"]).is_err());
        assert!(Args::try_parse_from(["vkscript", "a", "-D", "noequals"]).is_err());
        assert!(
            Args::try_parse_from(["vkscript", "a", "--device-id", "0"]).is_err()
        );
    }

    #[test]
    fn ppm() {
        let format = Format::lookup_by_vk_format(VkFormat::R8G8B8A8_UNORM);
        let data = [
            255, 0, 0, 255, 0, 255, 0, 255,
            0, 0, 255, 255, 128, 128, 128, 0,
        ];
        let framebuffer = Framebuffer {
            format,
            width: 2,
            height: 2,
            stride: 8,
            data: &data,
        };

        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("image.ppm");

        write_ppm(&framebuffer, &filename).unwrap();

        let contents = std::fs::read(&filename).unwrap();
        let header = b"P6\n2 2\n255\n";
        assert_eq!(&contents[0..header.len()], header);
        assert_eq!(
            &contents[header.len()..],
            &[255, 0, 0, 0, 255, 0, 0, 0, 255, 128, 128, 128],
        );
    }

    #[test]
    fn buffer_dump() {
        let first = [1u8, 2, 3];
        let second = [4u8, 5];
        let buffers = [
            inspect::Buffer {
                binding: BufferBinding { binding: 1, ..Default::default() },
                buffer_type: BufferType::Ubo,
                data: &first,
            },
            inspect::Buffer {
                binding: BufferBinding { binding: 3, ..Default::default() },
                buffer_type: BufferType::Ssbo,
                data: &second,
            },
        ];

        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("buffer.raw");

        write_buffer(&buffers, &filename, None).unwrap();
        assert_eq!(std::fs::read(&filename).unwrap(), first);

        write_buffer(&buffers, &filename, Some(3)).unwrap();
        assert_eq!(std::fs::read(&filename).unwrap(), second);

        assert_eq!(
            write_buffer(&buffers, &filename, Some(2)).unwrap_err().to_string(),
            "No buffer with binding 2 was found",
        );
        assert_eq!(
            write_buffer(&[], &filename, None).unwrap_err().to_string(),
            "Buffer dump requested but the script has no buffers",
        );
    }

    #[test]
    fn result_line() {
        assert_eq!(
            format_result(result::Result::Pass),
            "PIGLIT: {\"result\": \"pass\" }",
        );
    }

    #[test]
    fn run_scripts() {
        let dir = tempfile::tempdir().unwrap();

        let script = dir.path().join("clear.shader_test");
        std::fs::write(
            &script,
            "[require]\n\
             fbsize 2 2\n\
             [test]\n\
             clear color 1 0 0 1\n\
             clear\n\
             probe all rgba COLOR\n",
        ).unwrap();

        let image = dir.path().join("image.ppm");

        let args = Args::try_parse_from::<_, OsString>([
            "vkscript".into(),
            "-q".into(),
            "-D".into(),
            "COLOR=1 0 0 1".into(),
            "-i".into(),
            image.clone().into(),
            script.clone().into(),
        ]).unwrap();

        assert_eq!(run(&args), result::Result::Pass);
        assert_eq!(
            &std::fs::read(&image).unwrap()[11..],
            &[255, 0, 0, 255, 0, 0, 255, 0, 0, 255, 0, 0],
        );

        // Asking for a buffer that doesn’t exist fails the run
        let args = Args::try_parse_from::<_, OsString>([
            "vkscript".into(),
            "-b".into(),
            dir.path().join("buffer.raw").into(),
            script.clone().into(),
        ]).unwrap();

        assert_eq!(run(&args), result::Result::Fail);
    }
}
