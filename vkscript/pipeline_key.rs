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

//! Pipeline state that commands in the `[test]` section accumulate.
//! Each draw or dispatch takes a snapshot of the current [Key] and
//! equal keys share a single pipeline.

use crate::lexer;
use crate::shader_stage::{Stage, N_STAGES};
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Type {
    Graphics,
    Compute,
}

/// Whether a graphics pipeline draws the built-in rectangle or uses
/// the data from the `[vertex data]` section.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Source {
    Rectangle,
    VertexData,
}

/// `VkPrimitiveTopology`
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum Topology {
    PointList = 0,
    LineList = 1,
    LineStrip = 2,
    TriangleList = 3,
    TriangleStrip = 4,
    TriangleFan = 5,
    LineListWithAdjacency = 6,
    LineStripWithAdjacency = 7,
    TriangleListWithAdjacency = 8,
    TriangleStripWithAdjacency = 9,
    PatchList = 10,
}

static TOPOLOGY_NAMES: [(&str, Topology); 22] = [
    ("GL_LINES", Topology::LineList),
    ("GL_LINES_ADJACENCY", Topology::LineListWithAdjacency),
    ("GL_LINE_STRIP", Topology::LineStrip),
    ("GL_LINE_STRIP_ADJACENCY", Topology::LineStripWithAdjacency),
    ("GL_PATCHES", Topology::PatchList),
    ("GL_POINTS", Topology::PointList),
    ("GL_TRIANGLES", Topology::TriangleList),
    ("GL_TRIANGLES_ADJACENCY", Topology::TriangleListWithAdjacency),
    ("GL_TRIANGLE_FAN", Topology::TriangleFan),
    ("GL_TRIANGLE_STRIP", Topology::TriangleStrip),
    ("GL_TRIANGLE_STRIP_ADJACENCY", Topology::TriangleStripWithAdjacency),
    ("LINE_LIST", Topology::LineList),
    ("LINE_LIST_WITH_ADJACENCY", Topology::LineListWithAdjacency),
    ("LINE_STRIP", Topology::LineStrip),
    ("LINE_STRIP_WITH_ADJACENCY", Topology::LineStripWithAdjacency),
    ("PATCH_LIST", Topology::PatchList),
    ("POINT_LIST", Topology::PointList),
    ("TRIANGLE_FAN", Topology::TriangleFan),
    ("TRIANGLE_LIST", Topology::TriangleList),
    ("TRIANGLE_LIST_WITH_ADJACENCY", Topology::TriangleListWithAdjacency),
    ("TRIANGLE_STRIP", Topology::TriangleStrip),
    ("TRIANGLE_STRIP_WITH_ADJACENCY", Topology::TriangleStripWithAdjacency),
];

impl Topology {
    /// Looks up either a GL primitive name or a Vulkan topology name.
    /// The Vulkan name can optionally have the
    /// `VK_PRIMITIVE_TOPOLOGY_` prefix.
    pub fn from_name(name: &str) -> Option<Topology> {
        let name = name
            .strip_prefix("VK_PRIMITIVE_TOPOLOGY_")
            .unwrap_or(name);

        TOPOLOGY_NAMES
            .binary_search_by(|&(probe, _)| probe.cmp(name))
            .ok()
            .map(|pos| TOPOLOGY_NAMES[pos].1)
    }

    fn from_i32(value: i32) -> Option<Topology> {
        TOPOLOGY_NAMES
            .iter()
            .map(|&(_, topology)| topology)
            .find(|&topology| topology as i32 == value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetPropertyError<'a> {
    #[error("Unknown property: {property}")]
    NotFound { property: &'a str },
    #[error("Invalid value: {value}")]
    InvalidValue { value: &'a str },
}

/// The value of a single property as reported by
/// [Key::properties]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

// The property names are the member names of the structs that hang
// off VkGraphicsPipelineCreateInfo. Stencil state members are
// prefixed with `front.` or `back.`.

static BOOL_PROPERTIES: [(&str, bool); 10] = [
    ("primitiveRestartEnable", false),
    ("depthClampEnable", false),
    ("rasterizerDiscardEnable", false),
    ("depthBiasEnable", false),
    ("logicOpEnable", false),
    ("blendEnable", false),
    ("depthTestEnable", false),
    ("depthWriteEnable", false),
    ("depthBoundsTestEnable", false),
    ("stencilTestEnable", false),
];

const TOPOLOGY_PROP: usize = 0;
const PATCH_CONTROL_POINTS_PROP: usize = 1;

const STENCIL_OP_KEEP: i32 = 0;
const COMPARE_OP_ALWAYS: i32 = 7;
const ALL_COLOR_COMPONENTS: i32 = 0xf;

static INT_PROPERTIES: [(&str, i32); 28] = [
    ("topology", Topology::TriangleStrip as i32),
    ("patchControlPoints", 0),
    ("polygonMode", 0), // FILL
    ("cullMode", 0), // NONE
    ("frontFace", 0), // COUNTER_CLOCKWISE
    ("logicOp", 15), // SET
    ("srcColorBlendFactor", 6), // SRC_ALPHA
    ("dstColorBlendFactor", 7), // ONE_MINUS_SRC_ALPHA
    ("colorBlendOp", 0), // ADD
    ("srcAlphaBlendFactor", 6),
    ("dstAlphaBlendFactor", 7),
    ("alphaBlendOp", 0),
    ("colorWriteMask", ALL_COLOR_COMPONENTS),
    ("depthCompareOp", 1), // LESS
    ("front.failOp", STENCIL_OP_KEEP),
    ("front.passOp", STENCIL_OP_KEEP),
    ("front.depthFailOp", STENCIL_OP_KEEP),
    ("front.compareOp", COMPARE_OP_ALWAYS),
    ("front.compareMask", -1),
    ("front.writeMask", -1),
    ("front.reference", 0),
    ("back.failOp", STENCIL_OP_KEEP),
    ("back.passOp", STENCIL_OP_KEEP),
    ("back.depthFailOp", STENCIL_OP_KEEP),
    ("back.compareOp", COMPARE_OP_ALWAYS),
    ("back.compareMask", -1),
    ("back.writeMask", -1),
    ("back.reference", 0),
];

static FLOAT_PROPERTIES: [(&str, f32); 6] = [
    ("depthBiasConstantFactor", 0.0),
    ("depthBiasClamp", 0.0),
    ("depthBiasSlopeFactor", 0.0),
    ("lineWidth", 1.0),
    ("minDepthBounds", 0.0),
    ("maxDepthBounds", 0.0),
];

// Enum names that can be used in the value of an int property
static ENUM_VALUES: &[(&str, i32)] = &[
    ("VK_BLEND_FACTOR_CONSTANT_ALPHA", 12),
    ("VK_BLEND_FACTOR_CONSTANT_COLOR", 10),
    ("VK_BLEND_FACTOR_DST_ALPHA", 8),
    ("VK_BLEND_FACTOR_DST_COLOR", 4),
    ("VK_BLEND_FACTOR_ONE", 1),
    ("VK_BLEND_FACTOR_ONE_MINUS_CONSTANT_ALPHA", 13),
    ("VK_BLEND_FACTOR_ONE_MINUS_CONSTANT_COLOR", 11),
    ("VK_BLEND_FACTOR_ONE_MINUS_DST_ALPHA", 9),
    ("VK_BLEND_FACTOR_ONE_MINUS_DST_COLOR", 5),
    ("VK_BLEND_FACTOR_ONE_MINUS_SRC1_ALPHA", 18),
    ("VK_BLEND_FACTOR_ONE_MINUS_SRC1_COLOR", 16),
    ("VK_BLEND_FACTOR_ONE_MINUS_SRC_ALPHA", 7),
    ("VK_BLEND_FACTOR_ONE_MINUS_SRC_COLOR", 3),
    ("VK_BLEND_FACTOR_SRC1_ALPHA", 17),
    ("VK_BLEND_FACTOR_SRC1_COLOR", 15),
    ("VK_BLEND_FACTOR_SRC_ALPHA", 6),
    ("VK_BLEND_FACTOR_SRC_ALPHA_SATURATE", 14),
    ("VK_BLEND_FACTOR_SRC_COLOR", 2),
    ("VK_BLEND_FACTOR_ZERO", 0),
    ("VK_BLEND_OP_ADD", 0),
    ("VK_BLEND_OP_MAX", 4),
    ("VK_BLEND_OP_MIN", 3),
    ("VK_BLEND_OP_REVERSE_SUBTRACT", 2),
    ("VK_BLEND_OP_SUBTRACT", 1),
    ("VK_COLOR_COMPONENT_A_BIT", 8),
    ("VK_COLOR_COMPONENT_B_BIT", 4),
    ("VK_COLOR_COMPONENT_G_BIT", 2),
    ("VK_COLOR_COMPONENT_R_BIT", 1),
    ("VK_COMPARE_OP_ALWAYS", 7),
    ("VK_COMPARE_OP_EQUAL", 2),
    ("VK_COMPARE_OP_GREATER", 4),
    ("VK_COMPARE_OP_GREATER_OR_EQUAL", 6),
    ("VK_COMPARE_OP_LESS", 1),
    ("VK_COMPARE_OP_LESS_OR_EQUAL", 3),
    ("VK_COMPARE_OP_NEVER", 0),
    ("VK_COMPARE_OP_NOT_EQUAL", 5),
    ("VK_CULL_MODE_BACK_BIT", 2),
    ("VK_CULL_MODE_FRONT_AND_BACK", 3),
    ("VK_CULL_MODE_FRONT_BIT", 1),
    ("VK_CULL_MODE_NONE", 0),
    ("VK_FRONT_FACE_CLOCKWISE", 1),
    ("VK_FRONT_FACE_COUNTER_CLOCKWISE", 0),
    ("VK_LOGIC_OP_AND", 1),
    ("VK_LOGIC_OP_AND_INVERTED", 4),
    ("VK_LOGIC_OP_AND_REVERSE", 2),
    ("VK_LOGIC_OP_CLEAR", 0),
    ("VK_LOGIC_OP_COPY", 3),
    ("VK_LOGIC_OP_COPY_INVERTED", 12),
    ("VK_LOGIC_OP_EQUIVALENT", 9),
    ("VK_LOGIC_OP_INVERT", 10),
    ("VK_LOGIC_OP_NAND", 14),
    ("VK_LOGIC_OP_NOR", 8),
    ("VK_LOGIC_OP_NO_OP", 5),
    ("VK_LOGIC_OP_OR", 7),
    ("VK_LOGIC_OP_OR_INVERTED", 13),
    ("VK_LOGIC_OP_OR_REVERSE", 11),
    ("VK_LOGIC_OP_SET", 15),
    ("VK_LOGIC_OP_XOR", 6),
    ("VK_POLYGON_MODE_FILL", 0),
    ("VK_POLYGON_MODE_LINE", 1),
    ("VK_POLYGON_MODE_POINT", 2),
    ("VK_PRIMITIVE_TOPOLOGY_LINE_LIST", 1),
    ("VK_PRIMITIVE_TOPOLOGY_LINE_LIST_WITH_ADJACENCY", 6),
    ("VK_PRIMITIVE_TOPOLOGY_LINE_STRIP", 2),
    ("VK_PRIMITIVE_TOPOLOGY_LINE_STRIP_WITH_ADJACENCY", 7),
    ("VK_PRIMITIVE_TOPOLOGY_PATCH_LIST", 10),
    ("VK_PRIMITIVE_TOPOLOGY_POINT_LIST", 0),
    ("VK_PRIMITIVE_TOPOLOGY_TRIANGLE_FAN", 5),
    ("VK_PRIMITIVE_TOPOLOGY_TRIANGLE_LIST", 3),
    ("VK_PRIMITIVE_TOPOLOGY_TRIANGLE_LIST_WITH_ADJACENCY", 8),
    ("VK_PRIMITIVE_TOPOLOGY_TRIANGLE_STRIP", 4),
    ("VK_PRIMITIVE_TOPOLOGY_TRIANGLE_STRIP_WITH_ADJACENCY", 9),
    ("VK_STENCIL_OP_DECREMENT_AND_CLAMP", 4),
    ("VK_STENCIL_OP_DECREMENT_AND_WRAP", 7),
    ("VK_STENCIL_OP_INCREMENT_AND_CLAMP", 3),
    ("VK_STENCIL_OP_INCREMENT_AND_WRAP", 6),
    ("VK_STENCIL_OP_INVERT", 5),
    ("VK_STENCIL_OP_KEEP", 0),
    ("VK_STENCIL_OP_REPLACE", 2),
    ("VK_STENCIL_OP_ZERO", 1),
];

#[derive(Clone, Copy, Debug)]
enum PropertyKind {
    Bool(usize),
    Int(usize),
    Float(usize),
}

fn position<T>(table: &[(&str, T)], name: &str) -> Option<usize> {
    table.iter().position(|&(prop_name, _)| prop_name == name)
}

fn find_property(name: &str) -> Option<PropertyKind> {
    position(&BOOL_PROPERTIES, name).map(PropertyKind::Bool)
        .or_else(|| position(&INT_PROPERTIES, name).map(PropertyKind::Int))
        .or_else(|| {
            position(&FLOAT_PROPERTIES, name).map(PropertyKind::Float)
        })
}

// Looks up the enum name at the start of `s`. Returns the value and
// the rest of the string after the name.
fn lookup_enum(s: &str) -> Option<(i32, &str)> {
    let length = s
        .bytes()
        .take_while(|&b| b.is_ascii_alphanumeric() || b == b'_')
        .count();

    let (name, tail) = s.split_at(length);

    ENUM_VALUES
        .binary_search_by(|&(probe, _)| probe.cmp(name))
        .ok()
        .map(|pos| (ENUM_VALUES[pos].1, tail))
}

// Ints can be given as unsigned values such as 0xffffffff for masks
fn scan_int(s: &str) -> Option<(i32, &str)> {
    let (value, tail) = lexer::scan::<i64>(s).ok()?;

    if value < i32::MIN as i64 || value > u32::MAX as i64 {
        None
    } else {
        Some((value as u32 as i32, tail))
    }
}

/// A set of properties that can be used to create a pipeline. Equal
/// keys can share the same pipeline object.
#[derive(Clone)]
pub struct Key {
    pipeline_type: Type,
    source: Source,

    entrypoints: [Option<String>; N_STAGES],

    bool_properties: [bool; 10],
    int_properties: [i32; 28],
    float_properties: [f32; 6],
}

impl Default for Key {
    fn default() -> Key {
        Key {
            pipeline_type: Type::Graphics,
            source: Source::Rectangle,
            entrypoints: Default::default(),
            bool_properties: BOOL_PROPERTIES.map(|(_, value)| value),
            int_properties: INT_PROPERTIES.map(|(_, value)| value),
            float_properties: FLOAT_PROPERTIES.map(|(_, value)| value),
        }
    }
}

impl Key {
    pub fn set_pipeline_type(&mut self, pipeline_type: Type) {
        self.pipeline_type = pipeline_type;
    }

    pub fn pipeline_type(&self) -> Type {
        self.pipeline_type
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = source;
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn set_topology(&mut self, topology: Topology) {
        self.int_properties[TOPOLOGY_PROP] = topology as i32;
    }

    /// The topology property. A value set to a number that isn’t a
    /// valid topology is reported as `None`.
    pub fn topology(&self) -> Option<Topology> {
        Topology::from_i32(self.int_properties[TOPOLOGY_PROP])
    }

    pub fn set_patch_control_points(&mut self, patch_control_points: u32) {
        self.int_properties[PATCH_CONTROL_POINTS_PROP] =
            patch_control_points as i32;
    }

    pub fn patch_control_points(&self) -> u32 {
        self.int_properties[PATCH_CONTROL_POINTS_PROP] as u32
    }

    pub fn set_entrypoint(&mut self, stage: Stage, entrypoint: String) {
        self.entrypoints[stage as usize] = Some(entrypoint);
    }

    pub fn entrypoint(&self, stage: Stage) -> &str {
        self.entrypoints[stage as usize].as_deref().unwrap_or("main")
    }

    fn set_bool<'a>(
        &mut self,
        num: usize,
        value: &'a str,
    ) -> Result<(), SetPropertyError<'a>> {
        let value = match value {
            "true" => true,
            "false" => false,
            _ => match scan_int(value) {
                Some((v, "")) => v != 0,
                _ => return Err(SetPropertyError::InvalidValue { value }),
            },
        };

        self.bool_properties[num] = value;

        Ok(())
    }

    fn set_int<'a>(
        &mut self,
        num: usize,
        value: &'a str,
    ) -> Result<(), SetPropertyError<'a>> {
        let mut num_value = 0i32;

        for part in value.split('|') {
            let part = part.trim();

            let (v, tail) = match scan_int(part).or_else(|| lookup_enum(part)) {
                Some(result) => result,
                None => return Err(SetPropertyError::InvalidValue { value }),
            };

            if !tail.is_empty() {
                return Err(SetPropertyError::InvalidValue { value });
            }

            num_value |= v;
        }

        self.int_properties[num] = num_value;

        Ok(())
    }

    fn set_float<'a>(
        &mut self,
        num: usize,
        value: &'a str,
    ) -> Result<(), SetPropertyError<'a>> {
        match lexer::scan::<f32>(value) {
            Ok((v, "")) => {
                self.float_properties[num] = v;
                Ok(())
            },
            _ => Err(SetPropertyError::InvalidValue { value }),
        }
    }

    /// Sets a property by name. The names are the members of the
    /// structs used to create a graphics pipeline, for example
    /// `polygonMode` or `front.failOp`. The value is parsed according
    /// to the type of the property:
    ///
    /// bool: `true`, `false` or an integer which is true if non-zero.
    ///
    /// int: an integer or an enum name such as `VK_CULL_MODE_BACK_BIT`.
    /// Values can be combined with `|`, for example
    /// `VK_COLOR_COMPONENT_R_BIT | VK_COLOR_COMPONENT_G_BIT`.
    ///
    /// float: a decimal float or `0x` followed by the exact bits.
    pub fn set<'a>(
        &mut self,
        prop_name: &'a str,
        value: &'a str,
    ) -> Result<(), SetPropertyError<'a>> {
        let kind = match find_property(prop_name) {
            Some(kind) => kind,
            None => {
                return Err(SetPropertyError::NotFound { property: prop_name })
            },
        };

        let value = value.trim();

        match kind {
            PropertyKind::Bool(num) => self.set_bool(num, value),
            PropertyKind::Int(num) => self.set_int(num, value),
            PropertyKind::Float(num) => self.set_float(num, value),
        }
    }

    /// Gets a property by name, or `None` if there is no such
    /// property.
    pub fn get(&self, prop_name: &str) -> Option<PropertyValue> {
        find_property(prop_name).map(|kind| self.value_of(kind))
    }

    fn value_of(&self, kind: PropertyKind) -> PropertyValue {
        match kind {
            PropertyKind::Bool(num) => {
                PropertyValue::Bool(self.bool_properties[num])
            },
            PropertyKind::Int(num) => {
                PropertyValue::Int(self.int_properties[num])
            },
            PropertyKind::Float(num) => {
                PropertyValue::Float(self.float_properties[num])
            },
        }
    }

    /// Every property along with its current value. A backend uses
    /// this to fill in its pipeline create info.
    pub fn properties(
        &self
    ) -> impl Iterator<Item = (&'static str, PropertyValue)> + '_ {
        let bools = BOOL_PROPERTIES
            .iter()
            .enumerate()
            .map(|(num, &(name, _))| (name, PropertyKind::Bool(num)));
        let ints = INT_PROPERTIES
            .iter()
            .enumerate()
            .map(|(num, &(name, _))| (name, PropertyKind::Int(num)));
        let floats = FLOAT_PROPERTIES
            .iter()
            .enumerate()
            .map(|(num, &(name, _))| (name, PropertyKind::Float(num)));

        bools
            .chain(ints)
            .chain(floats)
            .map(|(name, kind)| (name, self.value_of(kind)))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        if self.pipeline_type != other.pipeline_type {
            return false;
        }

        match self.pipeline_type {
            Type::Graphics => {
                self.source == other.source
                    && self.bool_properties == other.bool_properties
                    && self.int_properties == other.int_properties
                    && self.float_properties == other.float_properties
                    // The compute entrypoint has no effect on a
                    // graphics pipeline
                    && self.entrypoints[..Stage::Compute as usize]
                    == other.entrypoints[..Stage::Compute as usize]
            },
            // None of the properties affect a compute pipeline
            Type::Compute => {
                self.entrypoints[Stage::Compute as usize]
                    == other.entrypoints[Stage::Compute as usize]
            },
        }
    }
}

// Reports the properties by name instead of as anonymous arrays
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Key {{ pipeline_type: {:?}, source: {:?}, entrypoints: {:?}",
            self.pipeline_type,
            self.source,
            &self.entrypoints,
        )?;

        for (name, value) in self.properties() {
            match value {
                PropertyValue::Bool(v) => write!(f, ", {}: {}", name, v)?,
                PropertyValue::Int(v) => write!(f, ", {}: {}", name, v)?,
                PropertyValue::Float(v) => write!(f, ", {}: {}", name, v)?,
            }
        }

        write!(f, " }}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tables_are_sorted() {
        for pair in ENUM_VALUES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} >= {}", pair[0].0, pair[1].0);
        }
        for pair in TOPOLOGY_NAMES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} >= {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_all_props() {
        let mut key = Key::default();

        // Check that setting every property works and isn’t confused
        // with another one
        for (i, &(name, _)) in BOOL_PROPERTIES.iter().enumerate() {
            key.set(name, "true").unwrap();
            assert!(key.bool_properties[..=i].iter().all(|&v| v));
        }
        for (i, &(name, _)) in INT_PROPERTIES.iter().enumerate() {
            key.set(name, &(i + 100).to_string()).unwrap();
            assert_eq!(key.get(name), Some(PropertyValue::Int(i as i32 + 100)));
        }
        for (i, &(name, _)) in FLOAT_PROPERTIES.iter().enumerate() {
            key.set(name, &format!("{}.5", i)).unwrap();
            assert_eq!(
                key.get(name),
                Some(PropertyValue::Float(i as f32 + 0.5)),
            );
        }

        assert_eq!(key.properties().count(), 44);
    }

    #[test]
    fn test_set_bool() {
        let mut key = Key::default();

        for (value, expected) in [
            ("true", true),
            ("false", false),
            ("1", true),
            (" 0 ", false),
            ("0x10", true),
        ] {
            key.set("depthTestEnable", value).unwrap();
            assert_eq!(
                key.get("depthTestEnable"),
                Some(PropertyValue::Bool(expected)),
            );
        }

        assert_eq!(
            key.set("depthTestEnable", "maybe"),
            Err(SetPropertyError::InvalidValue { value: "maybe" }),
        );
    }

    #[test]
    fn test_set_int() {
        let mut key = Key::default();

        key.set("cullMode", "VK_CULL_MODE_FRONT_BIT").unwrap();
        assert_eq!(key.get("cullMode"), Some(PropertyValue::Int(1)));

        key.set(
            "colorWriteMask",
            "VK_COLOR_COMPONENT_R_BIT | VK_COLOR_COMPONENT_A_BIT|2",
        ).unwrap();
        assert_eq!(key.get("colorWriteMask"), Some(PropertyValue::Int(0xb)));

        key.set("front.writeMask", "0xffffffff").unwrap();
        assert_eq!(key.get("front.writeMask"), Some(PropertyValue::Int(-1)));

        key.set("back.reference", "-3").unwrap();
        assert_eq!(key.get("back.reference"), Some(PropertyValue::Int(-3)));

        for value in ["", "VK_CULL_MODE_FRONT_BITS", "1 |", "1 2", "| 1"] {
            assert_eq!(
                key.set("cullMode", value),
                Err(SetPropertyError::InvalidValue { value: value.trim() }),
                "{}", value,
            );
        }
    }

    #[test]
    fn test_set_float() {
        let mut key = Key::default();

        key.set("lineWidth", "2.5").unwrap();
        assert_eq!(key.get("lineWidth"), Some(PropertyValue::Float(2.5)));

        key.set("lineWidth", "0x3f800000").unwrap();
        assert_eq!(key.get("lineWidth"), Some(PropertyValue::Float(1.0)));

        assert_eq!(
            key.set("lineWidth", "2.5x"),
            Err(SetPropertyError::InvalidValue { value: "2.5x" }),
        );
    }

    #[test]
    fn test_unknown_property() {
        let mut key = Key::default();
        let err = key.set("lineWidthx", "1").unwrap_err();
        assert_eq!(err, SetPropertyError::NotFound { property: "lineWidthx" });
        assert_eq!(err.to_string(), "Unknown property: lineWidthx");
        assert_eq!(key.get("lineWidthx"), None);
    }

    #[test]
    fn test_topology() {
        let mut key = Key::default();
        assert_eq!(key.topology(), Some(Topology::TriangleStrip));

        key.set_topology(Topology::PatchList);
        assert_eq!(key.get("topology"), Some(PropertyValue::Int(10)));

        key.set("topology", "99").unwrap();
        assert_eq!(key.topology(), None);

        assert_eq!(Topology::from_name("GL_LINES"), Some(Topology::LineList));
        assert_eq!(
            Topology::from_name("VK_PRIMITIVE_TOPOLOGY_POINT_LIST"),
            Some(Topology::PointList),
        );
        assert_eq!(Topology::from_name("TRIANGLE_FAN"), Some(Topology::TriangleFan));
        assert_eq!(Topology::from_name("GL_QUADS"), None);
    }

    #[test]
    fn test_equality() {
        let mut key_a = Key::default();
        let mut key_b = Key::default();
        assert_eq!(key_a, key_b);

        key_a.set("lineWidth", "3").unwrap();
        assert_ne!(key_a, key_b);
        key_b.set("lineWidth", "3").unwrap();
        assert_eq!(key_a, key_b);

        // The compute entrypoint doesn’t matter for graphics
        key_a.set_entrypoint(Stage::Compute, "foo".to_string());
        assert_eq!(key_a, key_b);
        key_a.set_entrypoint(Stage::Fragment, "bar".to_string());
        assert_ne!(key_a, key_b);
        key_b.set_entrypoint(Stage::Fragment, "bar".to_string());

        key_a.set_source(Source::VertexData);
        assert_ne!(key_a, key_b);

        // For compute only the compute entrypoint matters
        key_a.set_pipeline_type(Type::Compute);
        key_b.set_pipeline_type(Type::Compute);
        key_b.set("cullMode", "3").unwrap();
        assert_ne!(key_a, key_b);
        key_b.set_entrypoint(Stage::Compute, "foo".to_string());
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.entrypoint(Stage::Compute), "foo");
        assert_eq!(key_a.entrypoint(Stage::Vertex), "main");
    }

    #[test]
    fn test_debug() {
        let debug = format!("{:?}", Key::default());
        assert!(debug.starts_with("Key { pipeline_type: Graphics, "));
        assert!(debug.contains(", lineWidth: 1,"));
        assert!(debug.ends_with(", maxDepthBounds: 0 }"));
    }
}
