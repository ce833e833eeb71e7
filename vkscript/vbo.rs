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

//! Parser for the `[vertex data]` section. The data is written in
//! columns, for example:
//!
//! ```text
//!   0/R32G32B32_SFLOAT 1/R32_UINT  3/int/int  4/int/int
//!   0.0 0.0 0.0        10          0          0        # comment
//!   0.0 1.0 0.0         5          1          1
//! ```
//!
//! The first line has one header per column of the form
//! `LOCATION/FORMAT`, where `FORMAT` is a VkFormat name without the
//! `VK_FORMAT_` prefix. A header can also be given in the Piglit style
//! `LOCATION/GL_TYPE/GLSL_TYPE`, in which case the format is picked to
//! match the number of components of the GLSL type.

use crate::format::{Format, Mode};
use crate::util;
use crate::value::BaseType;
use crate::lexer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidHeader(String),
    #[error("{0}")]
    InvalidData(String),
}

/// Interleaved vertex attributes ready to be copied into a vertex
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexData {
    attribs: Box<[Attrib]>,
    raw_data: Box<[u8]>,
    // Number of bytes in each row of raw_data
    stride: usize,
    num_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attrib {
    format: &'static Format,
    location: u32,
    // Byte offset of this attribute within a row
    offset: usize,
}

impl VertexData {
    pub fn attribs(&self) -> &[Attrib] {
        &self.attribs
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }
}

impl Attrib {
    pub fn format(&self) -> &'static Format {
        self.format
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Builds a [VertexData] one line at a time. The first non-blank
/// line is taken as the header.
#[derive(Debug, Default)]
pub struct Parser {
    attribs: Option<Vec<Attrib>>,
    raw_data: Vec<u8>,
    stride: usize,
    num_rows: usize,
}

macro_rules! invalid_header {
    ($($message:expr),+) => {
        return Err(Error::InvalidHeader(format!($($message),+)))
    };
}

impl std::str::FromStr for VertexData {
    type Err = Error;

    fn from_str(s: &str) -> Result<VertexData, Error> {
        let mut parser = Parser::new();

        for line in s.lines() {
            parser.parse_line(line)?;
        }

        parser.into_vertex_data()
    }
}

fn lookup_gl_type(gl_type: &str) -> Result<(Mode, usize), Error> {
    static GL_TYPES: [(&str, Mode, usize); 9] = [
        ("byte", Mode::SINT, 8),
        ("ubyte", Mode::UINT, 8),
        ("short", Mode::SINT, 16),
        ("ushort", Mode::UINT, 16),
        ("int", Mode::SINT, 32),
        ("uint", Mode::UINT, 32),
        ("half", Mode::SFLOAT, 16),
        ("float", Mode::SFLOAT, 32),
        ("double", Mode::SFLOAT, 64),
    ];

    match GL_TYPES.iter().find(|&&(name, _, _)| name == gl_type) {
        Some(&(_, mode, bit_size)) => Ok((mode, bit_size)),
        None => invalid_header!("Unknown GL type: {}", gl_type),
    }
}

fn components_for_glsl_type(glsl_type: &str) -> Result<usize, Error> {
    if ["int", "uint", "float", "double"].contains(&glsl_type) {
        return Ok(1);
    }

    let vec_part = glsl_type
        .strip_prefix(['i', 'u', 'd'])
        .unwrap_or(glsl_type);

    let size = match vec_part.strip_prefix("vec") {
        Some(size) => size,
        None => invalid_header!("Unknown GLSL type: {}", glsl_type),
    };

    match size.parse::<usize>() {
        Ok(n) if (2..=4).contains(&n) => Ok(n),
        _ => invalid_header!("Invalid vec size: {}", glsl_type),
    }
}

fn decode_type(
    gl_type: &str,
    glsl_type: &str,
) -> Result<&'static Format, Error> {
    let (mode, bit_size) = lookup_gl_type(gl_type)?;
    let n_components = components_for_glsl_type(glsl_type)?;

    match Format::lookup_by_details(bit_size, mode, n_components) {
        Some(format) => Ok(format),
        None => invalid_header!("Invalid type combo: {}/{}", gl_type, glsl_type),
    }
}

fn parse_attrib(s: &str, offset: usize) -> Result<Attrib, Error> {
    let mut parts = s.split('/');

    let location = match parts.next().map(str::parse::<u32>) {
        Some(Ok(n)) => n,
        _ => invalid_header!("Invalid attrib location in {}", s),
    };

    let format_name = match parts.next() {
        Some(name) => name,
        None => invalid_header!(
            "Column headers must be in the form location/format. Got: {}",
            s
        ),
    };

    let format = match parts.next() {
        None => match Format::lookup_by_name(format_name) {
            Some(format) => format,
            None => invalid_header!("Unknown format: {}", format_name),
        },
        Some(glsl_type) => {
            if parts.next().is_some() {
                invalid_header!("Extra data at end of column header: {}", s);
            }

            decode_type(format_name, glsl_type)?
        },
    };

    Ok(Attrib {
        format,
        location,
        offset: util::align(offset, format.alignment()),
    })
}

// Picks the type used to parse a single component. UNORM and the
// other normalized modes are written as the raw integer.
fn component_type(mode: Mode, bits: usize) -> BaseType {
    match (mode, bits) {
        (Mode::SFLOAT, 16) => BaseType::Float16,
        (Mode::SFLOAT, 32) => BaseType::Float,
        (Mode::SFLOAT, 64) => BaseType::Double,
        (Mode::SNORM | Mode::SSCALED | Mode::SINT, 8) => BaseType::Int8,
        (Mode::SNORM | Mode::SSCALED | Mode::SINT, 16) => BaseType::Int16,
        (Mode::SNORM | Mode::SSCALED | Mode::SINT, 32) => BaseType::Int,
        (Mode::SNORM | Mode::SSCALED | Mode::SINT, 64) => BaseType::Int64,
        (_, 8) => BaseType::UInt8,
        (_, 16) => BaseType::UInt16,
        (_, 32) => BaseType::UInt,
        (_, 64) => BaseType::UInt64,
        _ => unreachable!("unexpected component {:?}/{}", mode, bits),
    }
}

fn type_description(base_type: BaseType) -> &'static str {
    match base_type {
        BaseType::UInt8 => "unsigned byte",
        BaseType::UInt16 => "unsigned short",
        BaseType::UInt => "unsigned int",
        BaseType::UInt64 => "unsigned long",
        BaseType::Int8 => "signed byte",
        BaseType::Int16 => "signed short",
        BaseType::Int => "signed int",
        BaseType::Int64 => "signed long",
        BaseType::Float16 => "half float",
        BaseType::Float => "float",
        BaseType::Double => "double",
    }
}

// Parses one number into the start of `data` and returns the text
// after it
fn parse_datum<'a>(
    base_type: BaseType,
    text: &'a str,
    data: &mut [u8],
) -> Result<&'a str, Error> {
    base_type
        .scan_into(text, &mut data[0..base_type.size()])
        .map_err(|_| Error::InvalidData(format!(
            "Couldn’t parse as {}",
            type_description(base_type),
        )))
}

impl Parser {
    pub fn new() -> Parser {
        Parser::default()
    }

    fn parse_header_line(&mut self, line: &str) -> Result<(), Error> {
        let mut attribs = Vec::new();
        let mut stride = 0;
        let mut max_alignment = 1;

        for attrib in line.split_whitespace() {
            let attrib = parse_attrib(attrib, stride)?;

            stride = attrib.offset + attrib.format.size();
            max_alignment = max_alignment.max(attrib.format.alignment());

            attribs.push(attrib);
        }

        self.attribs = Some(attribs);
        self.stride = util::align(stride, max_alignment);

        Ok(())
    }

    fn parse_data_line(
        &mut self,
        attribs: &[Attrib],
        mut line: &str,
    ) -> Result<(), Error> {
        let row_start = self.raw_data.len();
        self.raw_data.resize(row_start + self.stride, 0);

        for attrib in attribs.iter() {
            let mut data = &mut self.raw_data[row_start + attrib.offset..];

            match attrib.format.packed_size {
                Some(packed_size) => {
                    let base_type = component_type(Mode::UINT, packed_size);
                    line = parse_datum(base_type, line, data)?;
                },
                None => {
                    for part in attrib.format.parts() {
                        let base_type = component_type(part.mode, part.bits);
                        line = parse_datum(base_type, line, data)?;
                        data = &mut data[part.bits / 8..];
                    }
                },
            }
        }

        if !line.trim_end().is_empty() {
            return Err(Error::InvalidData(
                "Extra data at end of line".to_string()
            ));
        }

        self.num_rows += 1;

        Ok(())
    }

    /// Adds one line of the section. Blank and comment lines are
    /// ignored.
    pub fn parse_line(&mut self, line: &str) -> Result<(), Error> {
        let line = match lexer::trim_line_or_skip(line) {
            Some(line) => line,
            None => return Ok(()),
        };

        match self.attribs.take() {
            None => self.parse_header_line(line),
            Some(attribs) => {
                let res = self.parse_data_line(&attribs, line);
                self.attribs = Some(attribs);
                res
            },
        }
    }

    /// Finishes parsing. Fails if no header line was seen.
    pub fn into_vertex_data(self) -> Result<VertexData, Error> {
        let attribs = match self.attribs {
            Some(attribs) => attribs,
            None => invalid_header!("Missing header line"),
        };

        Ok(VertexData {
            attribs: attribs.into_boxed_slice(),
            raw_data: self.raw_data.into_boxed_slice(),
            stride: self.stride,
            num_rows: self.num_rows,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::VkFormat;

    #[test]
    fn test_general() {
        let source = "# position      color \n\
                      0/R32G32_SFLOAT 1/A8B8G8R8_UNORM_PACK32 \n\
                      \n\
                      # Top-left red \n\
                      -1 -1           0xff0000ff \n\
                      0  -1           0xff1200ff";

        let data = source.parse::<VertexData>().unwrap();

        assert_eq!(data.attribs().len(), 2);
        assert_eq!(data.stride(), 12);
        assert_eq!(data.num_rows(), 2);

        assert_eq!(
            data.attribs()[0].format(),
            Format::lookup_by_vk_format(VkFormat::R32G32_SFLOAT),
        );
        assert_eq!(data.attribs()[0].location(), 0);
        assert_eq!(data.attribs()[0].offset(), 0);
        assert_eq!(
            data.attribs()[1].format(),
            Format::lookup_by_vk_format(VkFormat::A8B8G8R8_UNORM_PACK32),
        );
        assert_eq!(data.attribs()[1].location(), 1);
        assert_eq!(data.attribs()[1].offset(), 8);

        let mut expected = Vec::<u8>::new();
        expected.extend((-1.0f32).to_ne_bytes());
        expected.extend((-1.0f32).to_ne_bytes());
        expected.extend(0xff0000ffu32.to_ne_bytes());
        expected.extend(0.0f32.to_ne_bytes());
        expected.extend((-1.0f32).to_ne_bytes());
        expected.extend(0xff1200ffu32.to_ne_bytes());
        assert_eq!(data.raw_data(), &expected);
    }

    #[test]
    fn test_no_header() {
        let err = "# only a comment".parse::<VertexData>().unwrap_err();
        assert_eq!(err.to_string(), "Missing header line");
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    fn check_gl_type(name: &str, values: &str, expected_bytes: &[u8]) {
        let source = format!("0/{}/int\n{}", name, values);
        let data = source.parse::<VertexData>().unwrap();
        assert_eq!(data.raw_data(), expected_bytes);
        assert_eq!(data.attribs()[0].format().parts().len(), 1);
        assert_eq!(
            data.attribs()[0].format().parts()[0].bits,
            expected_bytes.len() * 8
        );
    }

    fn check_glsl_type(name: &str, values: &str, expected: &[f32]) {
        let source = format!("1/float/{}\n{}", name, values);
        let data = source.parse::<VertexData>().unwrap();
        let expected_bytes = expected
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect::<Vec<u8>>();
        assert_eq!(data.raw_data(), &expected_bytes);
        assert_eq!(data.attribs()[0].location(), 1);
        assert_eq!(data.attribs()[0].format().parts().len(), expected.len());
    }

    #[test]
    fn test_piglit_style_header() {
        check_gl_type("byte", "-42", &(-42i8).to_ne_bytes());
        check_gl_type("ubyte", "42", &[42u8]);
        check_gl_type("short", "-30000", &(-30000i16).to_ne_bytes());
        check_gl_type("ushort", "65534", &65534u16.to_ne_bytes());
        check_gl_type("int", "-70000", &(-70000i32).to_ne_bytes());
        check_gl_type("uint", "0xffffffff", &u32::MAX.to_ne_bytes());
        check_gl_type("half", "-2", &0xc000u16.to_ne_bytes());
        check_gl_type("float", "1.0000", &1.0f32.to_ne_bytes());
        check_gl_type("double", "32.0000", &32.0f64.to_ne_bytes());

        check_glsl_type("int", "1.0", &[1.0]);
        check_glsl_type("vec3", "1.0 2.0 3.0", &[1.0, 2.0, 3.0]);
        check_glsl_type("dvec2", "1.0 2.0", &[1.0, 2.0]);

        for (header, message) in [
            ("1/uverylong/int", "Unknown GL type: uverylong"),
            ("1/int/ituple2", "Unknown GLSL type: ituple2"),
            ("1/int/ivecfoo", "Invalid vec size: ivecfoo"),
            ("1/int/vec1", "Invalid vec size: vec1"),
            ("1/int/dvec5", "Invalid vec size: dvec5"),
        ] {
            let err = header.parse::<VertexData>().unwrap_err();
            assert_eq!(err, Error::InvalidHeader(message.to_string()));
        }
    }

    #[test]
    fn test_bad_attrib() {
        let check = |source: &str, message: &str| {
            assert_eq!(
                source.parse::<VertexData>().unwrap_err().to_string(),
                message,
            );
        };

        check("foo/int/int", "Invalid attrib location in foo/int/int");
        check(
            "12",
            "Column headers must be in the form location/format. Got: 12",
        );
        check("1/R76_SFLOAT", "Unknown format: R76_SFLOAT");
        check(
            "1/int/int/more_int",
            "Extra data at end of column header: 1/int/int/more_int",
        );
    }

    #[test]
    fn test_alignment() {
        let source = "1/R8_UNORM 2/R64_SFLOAT 3/R8_UNORM\n \
                      1 12.0 24";
        let data = source.parse::<VertexData>().unwrap();
        let offsets = data.attribs().iter().map(Attrib::offset);
        assert_eq!(offsets.collect::<Vec<_>>(), [0, 8, 16]);
        assert_eq!(data.stride(), 24);
        assert_eq!(data.raw_data()[0], 1);
        assert_eq!(data.raw_data()[16], 24);
    }

    fn check_value(format: &str, values: &str, expected_bytes: &[u8]) {
        // The extra attribute checks that the offset moved on properly
        let source = format!("8/{} 9/R8_UNORM\n{} 42", format, values);
        let data = source.parse::<VertexData>().unwrap();
        let mut full_expected = expected_bytes.to_owned();
        full_expected.push(42);
        full_expected.resize(data.stride(), 0);
        assert_eq!(data.raw_data(), full_expected);
    }

    fn check_value_error(format: &str, error_text: &str) {
        let source = format!("0/{}\nfoo", format);
        let err = source.parse::<VertexData>().unwrap_err();
        assert_eq!(err, Error::InvalidData(error_text.to_string()));
    }

    #[test]
    fn test_parse_datum() {
        check_value("R8_UNORM", "12", &[12u8]);
        check_value_error("R8_UNORM", "Couldn’t parse as unsigned byte");
        check_value("R16_UNORM", "65000", &65000u16.to_ne_bytes());
        check_value_error("R16_UINT", "Couldn’t parse as unsigned short");
        check_value("R32_UINT", "66000", &66000u32.to_ne_bytes());
        check_value_error("R32_UINT", "Couldn’t parse as unsigned int");
        check_value("R64_UINT", "0xffffffffffffffff", &u64::MAX.to_ne_bytes());
        check_value_error("R64_UINT", "Couldn’t parse as unsigned long");

        check_value("R8_SNORM", "-12", &(-12i8).to_ne_bytes());
        check_value_error("R8_SNORM", "Couldn’t parse as signed byte");
        check_value("R32_SINT", "-66000", &(-66000i32).to_ne_bytes());
        check_value_error("R64_SINT", "Couldn’t parse as signed long");

        check_value("R16_SFLOAT", "-2", &0xc000u16.to_ne_bytes());
        check_value_error("R16_SFLOAT", "Couldn’t parse as half float");
        check_value("R32_SFLOAT", "-2", &(-2.0f32).to_ne_bytes());
        check_value_error("R32_SFLOAT", "Couldn’t parse as float");
        check_value("R64_SFLOAT", "-4", &(-4.0f64).to_ne_bytes());
        check_value_error("R64_SFLOAT", "Couldn’t parse as double");
    }

    #[test]
    fn test_packed_data() {
        let source = "1/B10G11R11_UFLOAT_PACK32\n\
                      0xfedcba98";
        let data = source.parse::<VertexData>().unwrap();
        assert_eq!(data.raw_data(), &0xfedcba98u32.to_ne_bytes());
    }

    #[test]
    fn test_trailing_data() {
        let err = "1/R8_UNORM\n23 25 ".parse::<VertexData>().unwrap_err();
        assert_eq!(err.to_string(), "Extra data at end of line");
    }
}
