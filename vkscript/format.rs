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

//! Image and vertex attribute formats along with a decoder that
//! turns the bytes of a pixel into normalized floating-point values.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    R,
    G,
    B,
    A,
    D,
    S,
    X,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    UNORM,
    SNORM,
    USCALED,
    SSCALED,
    UINT,
    SINT,
    UFLOAT,
    SFLOAT,
    SRGB,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub bits: usize,
    pub component: Component,
    pub mode: Mode,
}

#[derive(Debug)]
pub struct Format {
    pub vk_format: VkFormat,
    pub name: &'static str,
    pub packed_size: Option<usize>,
    parts: &'static [Part],
}

macro_rules! formats {
    ($($name:ident = $value:literal, $packed:expr,
       [$($bits:literal $comp:ident $mode:ident),+];)+) => {
        /// The subset of `VkFormat` values that a script can name.
        /// The discriminants match the Vulkan headers.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum VkFormat {
            $($name = $value,)+
        }

        static FORMATS: &[Format] = &[
            $(
                Format {
                    vk_format: VkFormat::$name,
                    name: stringify!($name),
                    packed_size: $packed,
                    parts: &[
                        $(
                            Part {
                                bits: $bits,
                                component: Component::$comp,
                                mode: Mode::$mode,
                            },
                        )+
                    ],
                },
            )+
        ];
    };
}

formats! {
    R4G4_UNORM_PACK8 = 1, Some(8), [4 R UNORM, 4 G UNORM];
    R4G4B4A4_UNORM_PACK16 = 2, Some(16),
    [4 R UNORM, 4 G UNORM, 4 B UNORM, 4 A UNORM];
    B4G4R4A4_UNORM_PACK16 = 3, Some(16),
    [4 B UNORM, 4 G UNORM, 4 R UNORM, 4 A UNORM];
    R5G6B5_UNORM_PACK16 = 4, Some(16), [5 R UNORM, 6 G UNORM, 5 B UNORM];
    B5G6R5_UNORM_PACK16 = 5, Some(16), [5 B UNORM, 6 G UNORM, 5 R UNORM];
    R5G5B5A1_UNORM_PACK16 = 6, Some(16),
    [5 R UNORM, 5 G UNORM, 5 B UNORM, 1 A UNORM];
    B5G5R5A1_UNORM_PACK16 = 7, Some(16),
    [5 B UNORM, 5 G UNORM, 5 R UNORM, 1 A UNORM];
    A1R5G5B5_UNORM_PACK16 = 8, Some(16),
    [1 A UNORM, 5 R UNORM, 5 G UNORM, 5 B UNORM];
    R8_UNORM = 9, None, [8 R UNORM];
    R8_SNORM = 10, None, [8 R SNORM];
    R8_USCALED = 11, None, [8 R USCALED];
    R8_SSCALED = 12, None, [8 R SSCALED];
    R8_UINT = 13, None, [8 R UINT];
    R8_SINT = 14, None, [8 R SINT];
    R8_SRGB = 15, None, [8 R SRGB];
    R8G8_UNORM = 16, None, [8 R UNORM, 8 G UNORM];
    R8G8_SNORM = 17, None, [8 R SNORM, 8 G SNORM];
    R8G8_UINT = 20, None, [8 R UINT, 8 G UINT];
    R8G8_SINT = 21, None, [8 R SINT, 8 G SINT];
    R8G8_SRGB = 22, None, [8 R SRGB, 8 G SRGB];
    R8G8B8_UNORM = 23, None, [8 R UNORM, 8 G UNORM, 8 B UNORM];
    R8G8B8_SNORM = 24, None, [8 R SNORM, 8 G SNORM, 8 B SNORM];
    R8G8B8_UINT = 27, None, [8 R UINT, 8 G UINT, 8 B UINT];
    R8G8B8_SINT = 28, None, [8 R SINT, 8 G SINT, 8 B SINT];
    R8G8B8_SRGB = 29, None, [8 R SRGB, 8 G SRGB, 8 B SRGB];
    B8G8R8_UNORM = 30, None, [8 B UNORM, 8 G UNORM, 8 R UNORM];
    B8G8R8_UINT = 34, None, [8 B UINT, 8 G UINT, 8 R UINT];
    B8G8R8_SRGB = 36, None, [8 B SRGB, 8 G SRGB, 8 R SRGB];
    R8G8B8A8_UNORM = 37, None, [8 R UNORM, 8 G UNORM, 8 B UNORM, 8 A UNORM];
    R8G8B8A8_SNORM = 38, None, [8 R SNORM, 8 G SNORM, 8 B SNORM, 8 A SNORM];
    R8G8B8A8_USCALED = 39, None,
    [8 R USCALED, 8 G USCALED, 8 B USCALED, 8 A USCALED];
    R8G8B8A8_SSCALED = 40, None,
    [8 R SSCALED, 8 G SSCALED, 8 B SSCALED, 8 A SSCALED];
    R8G8B8A8_UINT = 41, None, [8 R UINT, 8 G UINT, 8 B UINT, 8 A UINT];
    R8G8B8A8_SINT = 42, None, [8 R SINT, 8 G SINT, 8 B SINT, 8 A SINT];
    R8G8B8A8_SRGB = 43, None, [8 R SRGB, 8 G SRGB, 8 B SRGB, 8 A SRGB];
    B8G8R8A8_UNORM = 44, None, [8 B UNORM, 8 G UNORM, 8 R UNORM, 8 A UNORM];
    B8G8R8A8_SNORM = 45, None, [8 B SNORM, 8 G SNORM, 8 R SNORM, 8 A SNORM];
    B8G8R8A8_UINT = 48, None, [8 B UINT, 8 G UINT, 8 R UINT, 8 A UINT];
    B8G8R8A8_SINT = 49, None, [8 B SINT, 8 G SINT, 8 R SINT, 8 A SINT];
    B8G8R8A8_SRGB = 50, None, [8 B SRGB, 8 G SRGB, 8 R SRGB, 8 A SRGB];
    A8B8G8R8_UNORM_PACK32 = 51, Some(32),
    [8 A UNORM, 8 B UNORM, 8 G UNORM, 8 R UNORM];
    A8B8G8R8_SNORM_PACK32 = 52, Some(32),
    [8 A SNORM, 8 B SNORM, 8 G SNORM, 8 R SNORM];
    A8B8G8R8_UINT_PACK32 = 55, Some(32),
    [8 A UINT, 8 B UINT, 8 G UINT, 8 R UINT];
    A8B8G8R8_SINT_PACK32 = 56, Some(32),
    [8 A SINT, 8 B SINT, 8 G SINT, 8 R SINT];
    A8B8G8R8_SRGB_PACK32 = 57, Some(32),
    [8 A SRGB, 8 B SRGB, 8 G SRGB, 8 R SRGB];
    A2R10G10B10_UNORM_PACK32 = 58, Some(32),
    [2 A UNORM, 10 R UNORM, 10 G UNORM, 10 B UNORM];
    A2R10G10B10_UINT_PACK32 = 62, Some(32),
    [2 A UINT, 10 R UINT, 10 G UINT, 10 B UINT];
    A2B10G10R10_UNORM_PACK32 = 64, Some(32),
    [2 A UNORM, 10 B UNORM, 10 G UNORM, 10 R UNORM];
    A2B10G10R10_UINT_PACK32 = 68, Some(32),
    [2 A UINT, 10 B UINT, 10 G UINT, 10 R UINT];
    R16_UNORM = 70, None, [16 R UNORM];
    R16_SNORM = 71, None, [16 R SNORM];
    R16_UINT = 74, None, [16 R UINT];
    R16_SINT = 75, None, [16 R SINT];
    R16_SFLOAT = 76, None, [16 R SFLOAT];
    R16G16_UNORM = 77, None, [16 R UNORM, 16 G UNORM];
    R16G16_SNORM = 78, None, [16 R SNORM, 16 G SNORM];
    R16G16_UINT = 81, None, [16 R UINT, 16 G UINT];
    R16G16_SINT = 82, None, [16 R SINT, 16 G SINT];
    R16G16_SFLOAT = 83, None, [16 R SFLOAT, 16 G SFLOAT];
    R16G16B16_UNORM = 84, None, [16 R UNORM, 16 G UNORM, 16 B UNORM];
    R16G16B16_SFLOAT = 90, None, [16 R SFLOAT, 16 G SFLOAT, 16 B SFLOAT];
    R16G16B16A16_UNORM = 91, None,
    [16 R UNORM, 16 G UNORM, 16 B UNORM, 16 A UNORM];
    R16G16B16A16_SNORM = 92, None,
    [16 R SNORM, 16 G SNORM, 16 B SNORM, 16 A SNORM];
    R16G16B16A16_UINT = 95, None,
    [16 R UINT, 16 G UINT, 16 B UINT, 16 A UINT];
    R16G16B16A16_SINT = 96, None,
    [16 R SINT, 16 G SINT, 16 B SINT, 16 A SINT];
    R16G16B16A16_SFLOAT = 97, None,
    [16 R SFLOAT, 16 G SFLOAT, 16 B SFLOAT, 16 A SFLOAT];
    R32_UINT = 98, None, [32 R UINT];
    R32_SINT = 99, None, [32 R SINT];
    R32_SFLOAT = 100, None, [32 R SFLOAT];
    R32G32_UINT = 101, None, [32 R UINT, 32 G UINT];
    R32G32_SINT = 102, None, [32 R SINT, 32 G SINT];
    R32G32_SFLOAT = 103, None, [32 R SFLOAT, 32 G SFLOAT];
    R32G32B32_UINT = 104, None, [32 R UINT, 32 G UINT, 32 B UINT];
    R32G32B32_SINT = 105, None, [32 R SINT, 32 G SINT, 32 B SINT];
    R32G32B32_SFLOAT = 106, None, [32 R SFLOAT, 32 G SFLOAT, 32 B SFLOAT];
    R32G32B32A32_UINT = 107, None,
    [32 R UINT, 32 G UINT, 32 B UINT, 32 A UINT];
    R32G32B32A32_SINT = 108, None,
    [32 R SINT, 32 G SINT, 32 B SINT, 32 A SINT];
    R32G32B32A32_SFLOAT = 109, None,
    [32 R SFLOAT, 32 G SFLOAT, 32 B SFLOAT, 32 A SFLOAT];
    R64_UINT = 110, None, [64 R UINT];
    R64_SINT = 111, None, [64 R SINT];
    R64_SFLOAT = 112, None, [64 R SFLOAT];
    R64G64_SFLOAT = 115, None, [64 R SFLOAT, 64 G SFLOAT];
    R64G64B64_SFLOAT = 118, None, [64 R SFLOAT, 64 G SFLOAT, 64 B SFLOAT];
    R64G64B64A64_UINT = 119, None,
    [64 R UINT, 64 G UINT, 64 B UINT, 64 A UINT];
    R64G64B64A64_SINT = 120, None,
    [64 R SINT, 64 G SINT, 64 B SINT, 64 A SINT];
    R64G64B64A64_SFLOAT = 121, None,
    [64 R SFLOAT, 64 G SFLOAT, 64 B SFLOAT, 64 A SFLOAT];
    B10G11R11_UFLOAT_PACK32 = 122, Some(32),
    [10 B UFLOAT, 11 G UFLOAT, 11 R UFLOAT];
    D16_UNORM = 124, None, [16 D UNORM];
    X8_D24_UNORM_PACK32 = 125, Some(32), [8 X UNORM, 24 D UNORM];
    D32_SFLOAT = 126, None, [32 D SFLOAT];
    S8_UINT = 127, None, [8 S UINT];
    D16_UNORM_S8_UINT = 128, None, [16 D UNORM, 8 S UINT];
    D24_UNORM_S8_UINT = 129, None, [24 D UNORM, 8 S UINT];
    D32_SFLOAT_S8_UINT = 130, None, [32 D SFLOAT, 8 S UINT];
}

impl Format {
    pub fn lookup_by_name(name: &str) -> Option<&'static Format> {
        FORMATS.iter().find(|format| format.name == name)
    }

    pub fn lookup_by_vk_format(vk_format: VkFormat) -> &'static Format {
        match FORMATS.iter().find(|format| format.vk_format == vk_format) {
            Some(format) => format,
            None => unreachable!("lookup failed for format {:?}", vk_format),
        }
    }

    /// Finds the unpacked format whose components are laid out in
    /// RGBA order with the same bit size and mode for each one.
    pub fn lookup_by_details(
        bit_size: usize,
        mode: Mode,
        n_components: usize,
    ) -> Option<&'static Format> {
        static COMP_ORDER: [Component; 4] = [
            Component::R,
            Component::G,
            Component::B,
            Component::A,
        ];

        FORMATS.iter().find(|format| {
            format.packed_size.is_none()
                && format.parts.len() == n_components
                && format.parts.iter().zip(COMP_ORDER.iter()).all(
                    |(part, &component)| {
                        part.bits == bit_size
                            && part.mode == mode
                            && part.component == component
                    },
                )
        })
    }

    pub fn parts(&self) -> &'static [Part] {
        self.parts
    }

    pub fn has_component(&self, component: Component) -> bool {
        self.parts.iter().any(|part| part.component == component)
    }

    /// Size in bytes of one texel or one vertex attribute.
    pub fn size(&self) -> usize {
        match self.packed_size {
            Some(size) => size / 8,
            None => self.parts.iter().map(|part| part.bits / 8).sum(),
        }
    }

    pub fn alignment(&self) -> usize {
        match self.packed_size {
            Some(size) => size / 8,
            None => self
                .parts
                .iter()
                .map(|part| part.bits / 8)
                .max()
                .unwrap_or(1),
        }
    }

    /// Decodes one pixel into RGBA values. Components missing from
    /// the format default to 0 except alpha, which defaults to 1.
    /// Depth is reported in the red channel.
    pub fn load_pixel(&self, source: &[u8]) -> [f64; 4] {
        let mut pixel = [0.0, 0.0, 0.0, 1.0];
        let mut write_part = |component: Component, value: f64| {
            match component {
                Component::R | Component::D => pixel[0] = value,
                Component::G => pixel[1] = value,
                Component::B => pixel[2] = value,
                Component::A => pixel[3] = value,
                Component::S | Component::X => (),
            }
        };

        match self.packed_size {
            Some(size) => {
                let mut packed = load_packed(source, size);

                for part in self.parts.iter().rev() {
                    let part_bits = packed & (u64::MAX >> (64 - part.bits));
                    write_part(part.component, part.mode.decode_packed(
                        part.bits,
                        part_bits,
                    ));
                    packed >>= part.bits;
                }
            },
            None => {
                let mut offset = 0;

                for part in self.parts.iter() {
                    let value = part.mode.decode(
                        part.bits,
                        &source[offset..offset + part.bits / 8],
                    );
                    write_part(part.component, value);
                    offset += part.bits / 8;
                }
            },
        }

        pixel
    }
}

impl PartialEq for Format {
    fn eq(&self, other: &Format) -> bool {
        self.vk_format == other.vk_format
    }
}

impl Eq for Format {}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn load_packed(source: &[u8], size: usize) -> u64 {
    match size {
        8 => source[0] as u64,
        16 => u16::from_ne_bytes(bytes(source)) as u64,
        32 => u32::from_ne_bytes(bytes(source)) as u64,
        64 => u64::from_ne_bytes(bytes(source)),
        _ => unreachable!("unsupported packed size {}", size),
    }
}

fn bytes<const N: usize>(source: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&source[0..N]);
    array
}

fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

// Decodes an unsigned float with no sign bit, such as the 10 and 11
// bit components of B10G11R11_UFLOAT_PACK32.
fn decode_small_float(part: u64, e_bits: u32, m_bits: u32) -> f64 {
    let e_max = (1u64 << e_bits) - 1;
    let bias = (1i32 << (e_bits - 1)) - 1;
    let exponent = (part >> m_bits) & e_max;
    let mantissa = part & ((1u64 << m_bits) - 1);
    let m_scale = (1u64 << m_bits) as f64;

    if exponent == 0 {
        if mantissa == 0 {
            0.0
        } else {
            (mantissa as f64 / m_scale) * 2f64.powi(1 - bias)
        }
    } else if exponent == e_max {
        if mantissa == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        (1.0 + mantissa as f64 / m_scale)
            * 2f64.powi(exponent as i32 - bias)
    }
}

impl Mode {
    fn decode_packed(self, bits: usize, part: u64) -> f64 {
        match self {
            Mode::UNORM | Mode::SRGB => {
                part as f64 / (u64::MAX >> (64 - bits)) as f64
            },
            Mode::SNORM => {
                let max = (1u64 << (bits - 1)) - 1;
                (sign_extend(part, bits) as f64 / max as f64).max(-1.0)
            },
            Mode::UINT | Mode::USCALED => part as f64,
            Mode::SINT | Mode::SSCALED => sign_extend(part, bits) as f64,
            Mode::UFLOAT => match bits {
                10 => decode_small_float(part, 5, 5),
                11 => decode_small_float(part, 5, 6),
                _ => unreachable!("unsupported small float size {}", bits),
            },
            Mode::SFLOAT => {
                unreachable!("packed signed floats are not supported")
            },
        }
    }

    fn decode(self, bits: usize, source: &[u8]) -> f64 {
        if self == Mode::SFLOAT {
            return match bits {
                16 => half::f16::from_bits(
                    u16::from_ne_bytes(bytes(source))
                ).to_f64(),
                32 => f32::from_ne_bytes(bytes(source)) as f64,
                64 => f64::from_ne_bytes(bytes(source)),
                _ => unreachable!("unsupported float size {}", bits),
            };
        }

        let part = match bits {
            8 => source[0] as u64,
            16 => u16::from_ne_bytes(bytes(source)) as u64,
            24 => {
                let mut wide = [0u8; 4];
                if cfg!(target_endian = "little") {
                    wide[0..3].copy_from_slice(&source[0..3]);
                } else {
                    wide[1..4].copy_from_slice(&source[0..3]);
                }
                u32::from_ne_bytes(wide) as u64
            },
            32 => u32::from_ne_bytes(bytes(source)) as u64,
            64 => u64::from_ne_bytes(bytes(source)),
            _ => unreachable!("unsupported component size {}", bits),
        };

        self.decode_packed(bits, part)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup() {
        let format = Format::lookup_by_name("R8G8B8A8_UNORM").unwrap();
        assert_eq!(format.vk_format, VkFormat::R8G8B8A8_UNORM);
        assert!(Format::lookup_by_name("R8G8B8A8_UNORMX").is_none());

        let format = Format::lookup_by_vk_format(VkFormat::D24_UNORM_S8_UINT);
        assert_eq!(format.name, "D24_UNORM_S8_UINT");
        assert!(format.has_component(Component::D));
        assert!(format.has_component(Component::S));
        assert!(!format.has_component(Component::R));
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in FORMATS.iter().enumerate() {
            for b in FORMATS[i + 1..].iter() {
                assert_ne!(a.name, b.name);
                assert_ne!(a.vk_format, b.vk_format);
            }
        }
    }

    #[test]
    fn test_lookup_by_details() {
        let format = Format::lookup_by_details(32, Mode::SFLOAT, 3).unwrap();
        assert_eq!(format.vk_format, VkFormat::R32G32B32_SFLOAT);

        let format = Format::lookup_by_details(8, Mode::UNORM, 4).unwrap();
        assert_eq!(format.vk_format, VkFormat::R8G8B8A8_UNORM);

        // BGR ordering and packed formats are never picked
        assert!(Format::lookup_by_details(10, Mode::UINT, 4).is_none());
        assert!(Format::lookup_by_details(8, Mode::UFLOAT, 1).is_none());
    }

    #[test]
    fn test_size_and_alignment() {
        let format = Format::lookup_by_vk_format(VkFormat::R8G8B8_UNORM);
        assert_eq!(format.size(), 3);
        assert_eq!(format.alignment(), 1);

        let format = Format::lookup_by_vk_format(VkFormat::R16G16B16_SFLOAT);
        assert_eq!(format.size(), 6);
        assert_eq!(format.alignment(), 2);

        let format =
            Format::lookup_by_vk_format(VkFormat::B5G6R5_UNORM_PACK16);
        assert_eq!(format.size(), 2);
        assert_eq!(format.alignment(), 2);

        let format =
            Format::lookup_by_vk_format(VkFormat::D32_SFLOAT_S8_UINT);
        assert_eq!(format.size(), 5);
        assert_eq!(format.alignment(), 4);
    }

    fn load(vk_format: VkFormat, source: &[u8]) -> [f64; 4] {
        Format::lookup_by_vk_format(vk_format).load_pixel(source)
    }

    #[test]
    fn test_load_unorm() {
        assert_eq!(
            load(VkFormat::B8G8R8A8_UNORM, &[0, 255, 51, 255]),
            [0.2, 1.0, 0.0, 1.0],
        );
        assert_eq!(load(VkFormat::R8_UNORM, &[255]), [1.0, 0.0, 0.0, 1.0]);

        let pixel = load(VkFormat::R16G16_UNORM, &[0xff, 0xff, 0, 0]);
        assert_eq!(pixel, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_load_snorm_and_ints() {
        let pixel = load(VkFormat::R8G8B8A8_SNORM, &[127, 0x81, 0x80, 0]);
        assert_eq!(pixel, [1.0, -1.0, -1.0, 0.0]);

        let pixel = load(VkFormat::R8G8_SINT, &[0xff, 12]);
        assert_eq!(pixel, [-1.0, 12.0, 0.0, 1.0]);

        let source = 300u16.to_ne_bytes();
        assert_eq!(load(VkFormat::R16_UINT, &source), [300.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_load_floats() {
        let mut source = Vec::new();
        for value in [1.5f32, -2.0, 0.25, 8.0] {
            source.extend_from_slice(&value.to_ne_bytes());
        }
        assert_eq!(
            load(VkFormat::R32G32B32A32_SFLOAT, &source),
            [1.5, -2.0, 0.25, 8.0],
        );

        let source = half::f16::from_f32(0.5).to_bits().to_ne_bytes();
        assert_eq!(load(VkFormat::R16_SFLOAT, &source), [0.5, 0.0, 0.0, 1.0]);

        let source = 0.75f32.to_ne_bytes();
        assert_eq!(load(VkFormat::D32_SFLOAT, &source), [0.75, 0.0, 0.0, 1.0]);

        let source = 0.75f64.to_ne_bytes();
        assert_eq!(load(VkFormat::R64_SFLOAT, &source)[0], 0.75);
    }

    #[test]
    fn test_load_packed() {
        // Red is in the top five bits
        let source = (0x1fu16 << 11).to_ne_bytes();
        assert_eq!(
            load(VkFormat::R5G6B5_UNORM_PACK16, &source),
            [1.0, 0.0, 0.0, 1.0],
        );

        let source = (0x3fu16 << 5).to_ne_bytes();
        assert_eq!(
            load(VkFormat::B5G6R5_UNORM_PACK16, &source),
            [0.0, 1.0, 0.0, 1.0],
        );

        let source = 0xff00_00ffu32.to_ne_bytes();
        assert_eq!(
            load(VkFormat::A8B8G8R8_UNORM_PACK32, &source),
            [1.0, 0.0, 0.0, 1.0],
        );
    }

    #[test]
    fn test_load_small_float() {
        // 1.0 has exponent 15 and no mantissa in both sizes
        let r = 15u32 << 6;
        let g = 15u32 << 6;
        let b = (15u32 << 5) | 16;
        let packed = (b << 22) | (g << 11) | r;
        let pixel = load(VkFormat::B10G11R11_UFLOAT_PACK32, &packed.to_ne_bytes());
        assert_eq!(pixel, [1.0, 1.0, 1.5, 1.0]);

        assert_eq!(decode_small_float(0, 5, 6), 0.0);
        assert_eq!(decode_small_float(31 << 6, 5, 6), f64::INFINITY);
        assert!(decode_small_float((31 << 6) | 1, 5, 6).is_nan());
        // Smallest denormal is 2^-14 / 64
        assert_eq!(decode_small_float(1, 5, 6), 2f64.powi(-20));
    }

    #[test]
    fn test_load_depth() {
        assert_eq!(
            load(VkFormat::D24_UNORM_S8_UINT, &[0xff, 0xff, 0xff, 7]),
            [1.0, 0.0, 0.0, 1.0],
        );
    }
}
