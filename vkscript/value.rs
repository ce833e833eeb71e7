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

//! Typed values stored in buffers according to the GLSL layout
//! rules. These are described in detail in the OpenGL specs here:
//! https://registry.khronos.org/OpenGL/specs/gl/glspec45.core.pdf#page=159

use crate::lexer::{self, NumError};
use crate::tolerance::Tolerance;
use crate::util;
use half::f16;
use std::fmt;
use std::ops::ControlFlow;

/// The layout standard of a block. The only difference is that with
/// [Std140](LayoutStd::Std140) the offset between array members and
/// between the minor-axis vectors of a matrix is rounded up to a
/// multiple of 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStd {
    Std140,
    Std430,
}

/// For matrix types, which axis is stored consecutively in memory.
/// The numbers below are the memory order of the components:
///
/// ```text
/// Column major     Row major
/// [0 3 6]          [0 1 2]
/// [1 4 7]          [3 4 5]
/// [2 5 8]          [6 7 8]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorAxis {
    Column,
    Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub std: LayoutStd,
    pub major: MajorAxis,
}

impl Layout {
    pub const fn new(std: LayoutStd, major: MajorAxis) -> Layout {
        Layout { std, major }
    }
}

/// The type of a single component of a [BoxType].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Int,
    UInt,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int64,
    UInt64,
    Float16,
    Float,
    Double,
}

/// A single component loaded out of a buffer. Integers are widened
/// to 64 bits which keeps their ordering. Floats keep their original
/// bit pattern so that equality can be exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Signed(i64),
    Unsigned(u64),
    Float { value: f64, bits: u64 },
}

fn read_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

fn scan_bytes<'a, T: lexer::Scan>(
    s: &'a str,
    buf: &mut [u8],
    to_bytes: impl FnOnce(T) -> Vec<u8>,
) -> Result<&'a str, NumError> {
    let (value, tail) = lexer::scan::<T>(s)?;
    buf.copy_from_slice(&to_bytes(value));
    Ok(tail)
}

impl BaseType {
    /// Size in bytes of a component of this type.
    pub fn size(self) -> usize {
        match self {
            BaseType::Int8 | BaseType::UInt8 => 1,
            BaseType::Int16 | BaseType::UInt16 | BaseType::Float16 => 2,
            BaseType::Int | BaseType::UInt | BaseType::Float => 4,
            BaseType::Int64 | BaseType::UInt64 | BaseType::Double => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BaseType::Float16 | BaseType::Float | BaseType::Double)
    }

    /// Reads a component from the start of `bytes` which must be at
    /// least [size](BaseType::size) bytes long.
    pub fn load(self, bytes: &[u8]) -> Scalar {
        match self {
            BaseType::Int => Scalar::Signed(i32::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::UInt => Scalar::Unsigned(u32::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::Int8 => Scalar::Signed(i8::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::UInt8 => Scalar::Unsigned(u8::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::Int16 => Scalar::Signed(i16::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::UInt16 => Scalar::Unsigned(u16::from_ne_bytes(read_bytes(bytes)).into()),
            BaseType::Int64 => Scalar::Signed(i64::from_ne_bytes(read_bytes(bytes))),
            BaseType::UInt64 => Scalar::Unsigned(u64::from_ne_bytes(read_bytes(bytes))),
            BaseType::Float16 => {
                let bits = u16::from_ne_bytes(read_bytes(bytes));
                Scalar::Float {
                    value: f16::from_bits(bits).to_f64(),
                    bits: bits.into(),
                }
            },
            BaseType::Float => {
                let bits = u32::from_ne_bytes(read_bytes(bytes));
                Scalar::Float {
                    value: f32::from_bits(bits).into(),
                    bits: bits.into(),
                }
            },
            BaseType::Double => {
                let bits = u64::from_ne_bytes(read_bytes(bytes));
                Scalar::Float { value: f64::from_bits(bits), bits }
            },
        }
    }

    /// Parses a component from the start of `s` and stores it in
    /// `buf`, which must be exactly [size](BaseType::size) bytes.
    /// Returns the rest of the string.
    pub fn scan_into<'a>(
        self,
        s: &'a str,
        buf: &mut [u8],
    ) -> Result<&'a str, NumError> {
        match self {
            BaseType::Int => scan_bytes(s, buf, |v: i32| v.to_ne_bytes().to_vec()),
            BaseType::UInt => scan_bytes(s, buf, |v: u32| v.to_ne_bytes().to_vec()),
            BaseType::Int8 => scan_bytes(s, buf, |v: i8| v.to_ne_bytes().to_vec()),
            BaseType::UInt8 => scan_bytes(s, buf, |v: u8| v.to_ne_bytes().to_vec()),
            BaseType::Int16 => scan_bytes(s, buf, |v: i16| v.to_ne_bytes().to_vec()),
            BaseType::UInt16 => scan_bytes(s, buf, |v: u16| v.to_ne_bytes().to_vec()),
            BaseType::Int64 => scan_bytes(s, buf, |v: i64| v.to_ne_bytes().to_vec()),
            BaseType::UInt64 => scan_bytes(s, buf, |v: u64| v.to_ne_bytes().to_vec()),
            BaseType::Float16 => scan_bytes(s, buf, |v: f16| v.to_ne_bytes().to_vec()),
            BaseType::Float => scan_bytes(s, buf, |v: f32| v.to_ne_bytes().to_vec()),
            BaseType::Double => scan_bytes(s, buf, |v: f64| v.to_ne_bytes().to_vec()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Signed(v) => v.fmt(f),
            Scalar::Unsigned(v) => v.fmt(f),
            Scalar::Float { value, .. } => value.fmt(f),
        }
    }
}

// Generates the BoxType enum along with its shape and its GLSL names.
// The shape is written as columns x rows. The first name is the one
// used to display the type.
macro_rules! box_types {
    (@first $first:literal $(| $rest:literal)*) => { $first };
    ($($variant:ident: $base:ident, $columns:literal x $rows:literal
       => $($name:literal)|+;)+) => {
        /// All of the types that a [BoxValue] can have. These are
        /// the scalar, vector and matrix types of GLSL.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BoxType {
            $($variant,)+
        }

        impl BoxType {
            pub const ALL: &'static [BoxType] = &[$(BoxType::$variant,)+];

            fn shape(self) -> (BaseType, usize, usize) {
                match self {
                    $(BoxType::$variant => {
                        (BaseType::$base, $columns, $rows)
                    },)+
                }
            }

            /// Looks up a type by its GLSL name, for example `dmat2`
            /// or `i64vec3`.
            pub fn from_glsl_type(name: &str) -> Option<BoxType> {
                match name {
                    $($($name)|+ => Some(BoxType::$variant),)+
                    _ => None,
                }
            }

            pub fn glsl_name(self) -> &'static str {
                match self {
                    $(BoxType::$variant => box_types!(@first $($name)|+),)+
                }
            }
        }
    };
}

box_types! {
    Int: Int, 1 x 1 => "int";
    UInt: UInt, 1 x 1 => "uint";
    Int8: Int8, 1 x 1 => "int8_t";
    UInt8: UInt8, 1 x 1 => "uint8_t";
    Int16: Int16, 1 x 1 => "int16_t";
    UInt16: UInt16, 1 x 1 => "uint16_t";
    Int64: Int64, 1 x 1 => "int64_t";
    UInt64: UInt64, 1 x 1 => "uint64_t";
    Float16: Float16, 1 x 1 => "float16_t";
    Float: Float, 1 x 1 => "float";
    Double: Double, 1 x 1 => "double";
    F16Vec2: Float16, 1 x 2 => "f16vec2";
    F16Vec3: Float16, 1 x 3 => "f16vec3";
    F16Vec4: Float16, 1 x 4 => "f16vec4";
    Vec2: Float, 1 x 2 => "vec2";
    Vec3: Float, 1 x 3 => "vec3";
    Vec4: Float, 1 x 4 => "vec4";
    DVec2: Double, 1 x 2 => "dvec2";
    DVec3: Double, 1 x 3 => "dvec3";
    DVec4: Double, 1 x 4 => "dvec4";
    IVec2: Int, 1 x 2 => "ivec2";
    IVec3: Int, 1 x 3 => "ivec3";
    IVec4: Int, 1 x 4 => "ivec4";
    UVec2: UInt, 1 x 2 => "uvec2";
    UVec3: UInt, 1 x 3 => "uvec3";
    UVec4: UInt, 1 x 4 => "uvec4";
    I8Vec2: Int8, 1 x 2 => "i8vec2";
    I8Vec3: Int8, 1 x 3 => "i8vec3";
    I8Vec4: Int8, 1 x 4 => "i8vec4";
    U8Vec2: UInt8, 1 x 2 => "u8vec2";
    U8Vec3: UInt8, 1 x 3 => "u8vec3";
    U8Vec4: UInt8, 1 x 4 => "u8vec4";
    I16Vec2: Int16, 1 x 2 => "i16vec2";
    I16Vec3: Int16, 1 x 3 => "i16vec3";
    I16Vec4: Int16, 1 x 4 => "i16vec4";
    U16Vec2: UInt16, 1 x 2 => "u16vec2";
    U16Vec3: UInt16, 1 x 3 => "u16vec3";
    U16Vec4: UInt16, 1 x 4 => "u16vec4";
    I64Vec2: Int64, 1 x 2 => "i64vec2";
    I64Vec3: Int64, 1 x 3 => "i64vec3";
    I64Vec4: Int64, 1 x 4 => "i64vec4";
    U64Vec2: UInt64, 1 x 2 => "u64vec2";
    U64Vec3: UInt64, 1 x 3 => "u64vec3";
    U64Vec4: UInt64, 1 x 4 => "u64vec4";
    Mat2: Float, 2 x 2 => "mat2" | "mat2x2";
    Mat2x3: Float, 2 x 3 => "mat2x3";
    Mat2x4: Float, 2 x 4 => "mat2x4";
    Mat3x2: Float, 3 x 2 => "mat3x2";
    Mat3: Float, 3 x 3 => "mat3" | "mat3x3";
    Mat3x4: Float, 3 x 4 => "mat3x4";
    Mat4x2: Float, 4 x 2 => "mat4x2";
    Mat4x3: Float, 4 x 3 => "mat4x3";
    Mat4: Float, 4 x 4 => "mat4" | "mat4x4";
    DMat2: Double, 2 x 2 => "dmat2" | "dmat2x2";
    DMat2x3: Double, 2 x 3 => "dmat2x3";
    DMat2x4: Double, 2 x 4 => "dmat2x4";
    DMat3x2: Double, 3 x 2 => "dmat3x2";
    DMat3: Double, 3 x 3 => "dmat3" | "dmat3x3";
    DMat3x4: Double, 3 x 4 => "dmat3x4";
    DMat4x2: Double, 4 x 2 => "dmat4x2";
    DMat4x3: Double, 4 x 3 => "dmat4x3";
    DMat4: Double, 4 x 4 => "dmat4" | "dmat4x4";
}

/// One scalar component of a [BoxType] along with where to find it
/// in the bytes of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub column: usize,
    pub row: usize,
    pub offset: usize,
}

impl BoxType {
    pub fn base_type(self) -> BaseType {
        self.shape().0
    }

    /// Number of columns. This is 1 for everything except matrices.
    pub fn columns(self) -> usize {
        self.shape().1
    }

    /// Number of rows. This is 1 for scalars and the vector size for
    /// vectors.
    pub fn rows(self) -> usize {
        self.shape().2
    }

    pub fn is_matrix(self) -> bool {
        self.columns() > 1
    }

    // The major axis setting only affects matrices
    fn effective_major_axis(self, layout: Layout) -> MajorAxis {
        if self.is_matrix() {
            layout.major
        } else {
            MajorAxis::Column
        }
    }

    // Sizes of the major and minor axes, in that order
    fn major_minor(self, layout: Layout) -> (usize, usize) {
        match self.effective_major_axis(layout) {
            MajorAxis::Column => (self.columns(), self.rows()),
            MajorAxis::Row => (self.rows(), self.columns()),
        }
    }

    /// The alignment of one vector of the minor axis. A vector of 3
    /// components is aligned like a vector of 4.
    pub fn base_alignment(self, layout: Layout) -> usize {
        let (_major, minor) = self.major_minor(layout);
        let component_size = self.base_type().size();

        component_size * if minor == 3 { 4 } else { minor }
    }

    /// The offset in bytes between consecutive vectors of the minor
    /// axis. For example the matrix stride of a column-major `mat4`
    /// is 16 because that is the distance to the next column.
    pub fn matrix_stride(self, layout: Layout) -> usize {
        let base_alignment = self.base_alignment(layout);

        match layout.std {
            LayoutStd::Std140 => util::align(base_alignment, 16),
            LayoutStd::Std430 => base_alignment,
        }
    }

    /// The offset between consecutive elements in an array of this
    /// type, including any padding required by the layout.
    pub fn array_stride(self, layout: Layout) -> usize {
        let (major, _minor) = self.major_minor(layout);

        self.matrix_stride(layout) * major
    }

    /// The size of a single value without the trailing padding that
    /// [array_stride](BoxType::array_stride) includes.
    pub fn size(self, layout: Layout) -> usize {
        let (major, minor) = self.major_minor(layout);

        (major - 1) * self.matrix_stride(layout)
            + self.base_type().size() * minor
    }

    /// Iterates the components in column-major order, ie all of the
    /// rows of a column before moving to the next column. The
    /// offsets take the layout’s major axis into account.
    pub fn components(
        self,
        layout: Layout,
    ) -> impl Iterator<Item = Component> + Clone {
        let stride = self.matrix_stride(layout);
        let base_size = self.base_type().size();
        let major = self.effective_major_axis(layout);
        let rows = self.rows();

        (0..self.columns() * rows).map(move |i| {
            let (column, row) = (i / rows, i % rows);

            let offset = match major {
                MajorAxis::Column => column * stride + row * base_size,
                MajorAxis::Row => row * stride + column * base_size,
            };

            Component { column, row, offset }
        })
    }

    /// Calls `visitor` for each component in the order of
    /// [components](BoxType::components) until it returns
    /// [ControlFlow::Break].
    pub fn for_each_component<B>(
        self,
        layout: Layout,
        visitor: impl FnMut(Component) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        self.components(layout).try_for_each(visitor)
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A view of the bytes of one value laid out according to a [Layout].
#[derive(Debug, Clone, Copy)]
pub struct BoxValue<'a> {
    pub box_type: BoxType,
    pub layout: Layout,
    pub bytes: &'a [u8],
}

impl<'a> BoxValue<'a> {
    pub fn new(box_type: BoxType, layout: Layout, bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= box_type.size(layout));

        BoxValue { box_type, layout, bytes }
    }

    pub fn scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        let base_type = self.box_type.base_type();

        self.box_type
            .components(self.layout)
            .map(move |c| base_type.load(&self.bytes[c.offset..]))
    }
}

impl<'a> fmt::Display for BoxValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, scalar) in self.scalars().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            scalar.fmt(f)?;
        }

        Ok(())
    }
}

/// How to compare two values with [compare](Comparison::compare).
/// All of the components must pass for the comparison to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Exactly equal. Floats compare equal if they have the same
    /// value or the same bit pattern.
    Equal,
    /// Floats only need to be within the [Tolerance]. Integers must
    /// be exactly equal.
    FuzzyEqual,
    NotEqual,
    Less,
    GreaterEqual,
    Greater,
    LessEqual,
}

static COMPARISON_OPERATORS: [(&str, Comparison); 7] = [
    ("==", Comparison::Equal),
    ("~=", Comparison::FuzzyEqual),
    ("!=", Comparison::NotEqual),
    ("<", Comparison::Less),
    (">=", Comparison::GreaterEqual),
    (">", Comparison::Greater),
    ("<=", Comparison::LessEqual),
];

impl Comparison {
    pub fn from_operator(operator: &str) -> Option<Comparison> {
        COMPARISON_OPERATORS
            .iter()
            .find(|&&(name, _)| name == operator)
            .map(|&(_, comparison)| comparison)
    }

    pub fn operator(self) -> &'static str {
        COMPARISON_OPERATORS
            .iter()
            .find(|&&(_, comparison)| comparison == self)
            .map_or("?", |&(name, _)| name)
    }

    fn compare_ord<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Comparison::Equal | Comparison::FuzzyEqual => a == b,
            Comparison::NotEqual => a != b,
            Comparison::Less => a < b,
            Comparison::GreaterEqual => a >= b,
            Comparison::Greater => a > b,
            Comparison::LessEqual => a <= b,
        }
    }

    fn compare_scalar(
        self,
        tolerance: &Tolerance,
        row: usize,
        a: Scalar,
        b: Scalar,
    ) -> bool {
        match (a, b) {
            (Scalar::Signed(a), Scalar::Signed(b)) => self.compare_ord(a, b),
            (Scalar::Unsigned(a), Scalar::Unsigned(b)) => {
                self.compare_ord(a, b)
            },
            (
                Scalar::Float { value: a, bits: a_bits },
                Scalar::Float { value: b, bits: b_bits },
            ) => {
                let identical = a == b || a_bits == b_bits;

                match self {
                    Comparison::Equal => identical,
                    Comparison::FuzzyEqual => {
                        identical || tolerance.equal(row, a, b)
                    },
                    Comparison::NotEqual => !identical,
                    _ => self.compare_ord(a, b),
                }
            },
            _ => unreachable!("compared scalars of different base types"),
        }
    }

    /// Compares the value in `a` with the value in `b`, both laid out
    /// as `box_type` with `layout`. For fuzzy comparisons, `b` is the
    /// expected value and the tolerance for a component is picked by
    /// its row.
    pub fn compare(
        self,
        tolerance: &Tolerance,
        box_type: BoxType,
        layout: Layout,
        a: &[u8],
        b: &[u8],
    ) -> bool {
        let base_type = box_type.base_type();

        box_type.for_each_component(layout, |c| {
            let a = base_type.load(&a[c.offset..]);
            let b = base_type.load(&b[c.offset..]);

            if self.compare_scalar(tolerance, c.row, a, b) {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        }).is_continue()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.operator())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    const STD140: Layout = Layout::new(LayoutStd::Std140, MajorAxis::Column);
    const STD430: Layout = Layout::new(LayoutStd::Std430, MajorAxis::Column);
    const STD140_ROW: Layout = Layout::new(LayoutStd::Std140, MajorAxis::Row);
    const STD430_ROW: Layout = Layout::new(LayoutStd::Std430, MajorAxis::Row);

    static ALL_LAYOUTS: [Layout; 4] = [STD140, STD430, STD140_ROW, STD430_ROW];

    #[test]
    fn test_shape() {
        assert_eq!(BoxType::ALL.len(), 62);

        assert_eq!(BoxType::Int.base_type(), BaseType::Int);
        assert_eq!((BoxType::Int.columns(), BoxType::Int.rows()), (1, 1));
        assert!(!BoxType::Int.is_matrix());

        assert_eq!(BoxType::Vec4.base_type(), BaseType::Float);
        assert_eq!((BoxType::Vec4.columns(), BoxType::Vec4.rows()), (1, 4));
        assert!(!BoxType::Vec4.is_matrix());

        assert_eq!(BoxType::DMat4x3.base_type(), BaseType::Double);
        assert_eq!(
            (BoxType::DMat4x3.columns(), BoxType::DMat4x3.rows()),
            (4, 3),
        );
        assert!(BoxType::DMat4x3.is_matrix());
    }

    #[test]
    fn test_base_type_size() {
        assert_eq!(BaseType::Int8.size(), 1);
        assert_eq!(BaseType::UInt16.size(), 2);
        assert_eq!(BaseType::Float16.size(), 2);
        assert_eq!(BaseType::UInt.size(), 4);
        assert_eq!(BaseType::Float.size(), 4);
        assert_eq!(BaseType::Int64.size(), 8);
        assert_eq!(BaseType::Double.size(), 8);
    }

    #[test]
    fn test_base_alignment() {
        assert_eq!(BoxType::Float.base_alignment(STD140), 4);
        assert_eq!(BoxType::Vec2.base_alignment(STD140), 8);
        assert_eq!(BoxType::Vec3.base_alignment(STD140), 16);
        assert_eq!(BoxType::Vec4.base_alignment(STD140), 16);
        assert_eq!(BoxType::DVec3.base_alignment(STD430), 32);
        // Row major matrices are aligned by the size of a row
        assert_eq!(BoxType::Mat4x2.base_alignment(STD430), 8);
        assert_eq!(BoxType::Mat4x2.base_alignment(STD430_ROW), 16);
    }

    #[test]
    fn test_matrix_stride() {
        assert_eq!(BoxType::Mat4.matrix_stride(STD430), 16);
        // std140 rounds the minor axis up to a vec4
        assert_eq!(BoxType::Mat4x2.matrix_stride(STD140), 16);
        assert_eq!(BoxType::Mat4x2.matrix_stride(STD430), 8);
        // 3 components are always aligned like 4
        assert_eq!(BoxType::Mat4x3.matrix_stride(STD430), 16);
        // Row major swaps the axes
        assert_eq!(BoxType::Mat4x2.matrix_stride(STD430_ROW), 16);
        assert_eq!(BoxType::Mat2x4.matrix_stride(STD430_ROW), 8);
        // The major axis doesn’t affect vectors
        assert_eq!(BoxType::Vec2.matrix_stride(STD430_ROW), 8);
        assert_eq!(BoxType::Float.matrix_stride(STD430), 4);
        assert_eq!(BoxType::Float.matrix_stride(STD140), 16);
    }

    #[test]
    fn test_array_stride() {
        assert_eq!(BoxType::UInt8.array_stride(STD430), 1);
        assert_eq!(BoxType::I8Vec2.array_stride(STD430), 2);
        assert_eq!(BoxType::I8Vec3.array_stride(STD430), 4);
        assert_eq!(BoxType::Mat4x3.array_stride(STD430), 64);
        assert_eq!(BoxType::Float.array_stride(STD140), 16);
        assert_eq!(BoxType::Mat2.array_stride(STD140), 32);
        assert_eq!(BoxType::Mat2.array_stride(STD430), 16);
    }

    #[test]
    fn test_size() {
        assert_eq!(BoxType::UInt8.size(STD430), 1);
        assert_eq!(BoxType::I8Vec3.size(STD430), 3);
        assert_eq!(BoxType::Vec3.size(STD140), 12);
        assert_eq!(BoxType::Mat4x3.size(STD430), 3 * 4 * 4 + 3 * 4);
        assert_eq!(BoxType::Mat2.size(STD140), 16 + 8);
    }

    #[test]
    fn test_components() {
        let offsets = |t: BoxType, layout: Layout| {
            t.components(layout).map(|c| c.offset).collect::<Vec<_>>()
        };

        assert_eq!(offsets(BoxType::Vec4, STD140), vec![0, 4, 8, 12]);
        assert_eq!(offsets(BoxType::Vec4, STD140_ROW), vec![0, 4, 8, 12]);
        assert_eq!(
            offsets(BoxType::Mat4x3, STD140),
            vec![0, 4, 8, 16, 20, 24, 32, 36, 40, 48, 52, 56],
        );
        // The components are still visited a column at a time but
        // their offsets follow the row-major layout
        assert_eq!(
            offsets(BoxType::Mat3x4, STD140_ROW),
            vec![0, 16, 32, 48, 4, 20, 36, 52, 8, 24, 40, 56],
        );

        let components = BoxType::Mat2.components(STD430).collect::<Vec<_>>();
        assert_eq!(
            components[2],
            Component { column: 1, row: 0, offset: 8 },
        );
    }

    #[test]
    fn test_for_each_component_stops() {
        let mut visited = Vec::new();

        let result = BoxType::Vec4.for_each_component(STD430, |c| {
            visited.push(c.row);

            if c.row == 1 {
                ControlFlow::Break(c.offset)
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(result, ControlFlow::Break(4));
        assert_eq!(visited, vec![0, 1]);

        let mut count = 0;
        let result = BoxType::DMat3.for_each_component(STD140, |_| {
            count += 1;
            ControlFlow::<()>::Continue(())
        });
        assert!(result.is_continue());
        assert_eq!(count, 9);
    }

    #[test]
    fn test_from_glsl_type() {
        assert_eq!(BoxType::from_glsl_type("vec3"), Some(BoxType::Vec3));
        assert_eq!(BoxType::from_glsl_type("dmat2x2"), Some(BoxType::DMat2));
        assert_eq!(BoxType::from_glsl_type("i64vec4"), Some(BoxType::I64Vec4));
        assert_eq!(BoxType::from_glsl_type("uint16_t"), Some(BoxType::UInt16));
        assert_eq!(BoxType::from_glsl_type("dvec5"), None);

        for &box_type in BoxType::ALL {
            assert_eq!(
                BoxType::from_glsl_type(box_type.glsl_name()),
                Some(box_type),
            );
        }

        assert_eq!(BoxType::Mat3.to_string(), "mat3");
    }

    fn bytes_of<T: Copy>(values: &[T], to_bytes: fn(T) -> Vec<u8>) -> Vec<u8> {
        values.iter().flat_map(|&v| to_bytes(v)).collect()
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        bytes_of(values, |v| v.to_ne_bytes().to_vec())
    }

    #[test]
    fn test_compare_integers() {
        let t = Tolerance::default();
        let cmp = |c: Comparison, a: u8, b: u8| {
            c.compare(&t, BoxType::UInt8, STD140, &[a], &[b])
        };

        assert!(cmp(Comparison::Equal, 5, 5));
        assert!(!cmp(Comparison::Equal, 6, 5));
        assert!(cmp(Comparison::NotEqual, 6, 5));
        assert!(!cmp(Comparison::NotEqual, 5, 5));
        assert!(cmp(Comparison::Less, 4, 5));
        assert!(!cmp(Comparison::Less, 5, 5));
        assert!(cmp(Comparison::LessEqual, 5, 5));
        assert!(!cmp(Comparison::LessEqual, 6, 5));
        assert!(cmp(Comparison::Greater, 6, 5));
        assert!(!cmp(Comparison::Greater, 5, 5));
        assert!(cmp(Comparison::GreaterEqual, 5, 5));
        assert!(!cmp(Comparison::GreaterEqual, 4, 5));
        // Integers never use the tolerance
        assert!(!cmp(Comparison::FuzzyEqual, 6, 5));

        // Signed values keep their sign
        let a = (-3i16).to_ne_bytes();
        let b = 2i16.to_ne_bytes();
        assert!(Comparison::Less.compare(&t, BoxType::Int16, STD430, &a, &b));

        // Every component has to pass
        assert!(!Comparison::Equal.compare(
            &t,
            BoxType::U8Vec4,
            STD140,
            &[5, 6, 7, 8],
            &[5, 6, 7, 9],
        ));
    }

    #[test]
    fn test_compare_floats() {
        let t = Tolerance::new([0.1, 0.2, 0.3, 0.4], false);
        let a = f32_bytes(&[1.05, 2.15, 3.0, 4.0]);
        let b = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);

        assert!(!Comparison::Equal.compare(&t, BoxType::Vec4, STD430, &a, &b));
        assert!(Comparison::FuzzyEqual.compare(&t, BoxType::Vec4, STD430, &a, &b));

        // The tolerance is chosen by the row so the second row of a
        // 2-row matrix uses the second tolerance
        let a = f32_bytes(&[1.0, 2.15, 1.0, 2.15]);
        let b = f32_bytes(&[1.0, 2.0, 1.0, 2.0]);
        assert!(Comparison::FuzzyEqual.compare(&t, BoxType::Mat2, STD430, &a, &b));
        let a = f32_bytes(&[1.15, 2.0, 1.0, 2.0]);
        assert!(!Comparison::FuzzyEqual.compare(&t, BoxType::Mat2, STD430, &a, &b));

        // NaN is equal to itself when the bits match
        let nan = f32_bytes(&[f32::NAN]);
        assert!(Comparison::Equal.compare(&t, BoxType::Float, STD430, &nan, &nan));
        assert!(!Comparison::NotEqual.compare(&t, BoxType::Float, STD430, &nan, &nan));

        // Negative zero still equals zero
        let zero = f32_bytes(&[0.0]);
        let neg_zero = f32_bytes(&[-0.0]);
        assert!(Comparison::Equal.compare(&t, BoxType::Float, STD430, &zero, &neg_zero));

        let a = 1.5f64.to_ne_bytes();
        let b = 2.5f64.to_ne_bytes();
        assert!(Comparison::Less.compare(&t, BoxType::Double, STD430, &a, &b));

        let a = f16::from_f32(0.5).to_ne_bytes();
        let b = f16::from_f32(0.505).to_ne_bytes();
        assert!(!Comparison::Equal.compare(&t, BoxType::Float16, STD430, &a, &b));
        assert!(Comparison::FuzzyEqual.compare(&t, BoxType::Float16, STD430, &a, &b));
    }

    #[test]
    fn test_operators() {
        for &(name, comparison) in COMPARISON_OPERATORS.iter() {
            assert_eq!(Comparison::from_operator(name), Some(comparison));
            assert_eq!(comparison.to_string(), name);
        }
        assert_eq!(Comparison::from_operator("=~"), None);
    }

    #[test]
    fn test_scan_and_display() {
        let layout = STD140;
        let mut bytes = vec![0u8; BoxType::Mat2.size(layout)];
        let mut tail = "1 2.5 -3 0x40800000 rest";

        for c in BoxType::Mat2.components(layout) {
            tail = BaseType::Float
                .scan_into(tail, &mut bytes[c.offset..c.offset + 4])
                .unwrap();
        }

        assert_eq!(tail, " rest");
        assert_eq!(
            BoxValue::new(BoxType::Mat2, layout, &bytes).to_string(),
            "1 2.5 -3 4",
        );

        let mut buf = [0u8; 2];
        assert_eq!(
            BaseType::Int16.scan_into("40000", &mut buf),
            Err(NumError::SignedOverflow),
        );
        assert_eq!(BaseType::UInt16.scan_into("40000", &mut buf), Ok(""));
        assert_eq!(BaseType::UInt16.load(&buf), Scalar::Unsigned(40000));
    }

    fn type_and_layout() -> impl Strategy<Value = (BoxType, Layout)> {
        (
            proptest::sample::select(BoxType::ALL),
            proptest::sample::select(&ALL_LAYOUTS[..]),
        )
    }

    fn type_layout_and_bytes()
        -> impl Strategy<Value = (BoxType, Layout, Vec<u8>, Vec<u8>)>
    {
        type_and_layout().prop_flat_map(|(box_type, layout)| {
            let size = box_type.size(layout);
            (
                Just(box_type),
                Just(layout),
                proptest::collection::vec(any::<u8>(), size),
                proptest::collection::vec(any::<u8>(), size),
            )
        })
    }

    proptest! {
        #[test]
        fn layout_law((box_type, layout) in type_and_layout()) {
            let array_stride = box_type.array_stride(layout);
            let matrix_stride = box_type.matrix_stride(layout);

            prop_assert_eq!(array_stride % matrix_stride, 0);
            prop_assert!(array_stride >= box_type.size(layout));

            // A lone vector of 3 components is smaller than its
            // alignment
            if box_type.is_matrix() || box_type.rows() != 3 {
                prop_assert!(
                    box_type.size(layout) >= box_type.base_alignment(layout)
                );
            }

            // Every component fits inside the value
            let base_size = box_type.base_type().size();
            for c in box_type.components(layout) {
                prop_assert!(c.offset + base_size <= box_type.size(layout));
            }
        }

        #[test]
        fn equal_is_reflexive((box_type, layout, a, _b) in type_layout_and_bytes()) {
            prop_assert!(Comparison::Equal.compare(
                &Tolerance::default(),
                box_type,
                layout,
                &a,
                &a,
            ));
        }

        #[test]
        fn zero_tolerance_fuzzy_is_equal(
            (box_type, layout, a, b) in type_layout_and_bytes()
        ) {
            let zero = Tolerance::new([0.0; 4], false);

            prop_assert_eq!(
                Comparison::FuzzyEqual.compare(&zero, box_type, layout, &a, &b),
                Comparison::Equal.compare(&zero, box_type, layout, &a, &b),
            );
            prop_assert_eq!(
                Comparison::FuzzyEqual.compare(&zero, box_type, layout, &a, &a),
                true,
            );
        }
    }

    #[test]
    fn std140_vec3_aligns_like_vec4() {
        for (vec3, vec4) in [
            (BoxType::Vec3, BoxType::Vec4),
            (BoxType::DVec3, BoxType::DVec4),
            (BoxType::IVec3, BoxType::IVec4),
            (BoxType::F16Vec3, BoxType::F16Vec4),
        ] {
            assert_eq!(vec3.base_alignment(STD140), vec4.base_alignment(STD140));
        }
    }
}
