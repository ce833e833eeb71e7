// vkscript
//
// Copyright (C) 2019 Intel Corporation
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

//! The set of device capabilities that a script needs. A script that
//! asks for something the device can’t provide is skipped rather
//! than failed.

use std::collections::{HashMap, HashSet};
use std::fmt;

macro_rules! base_features {
    ($($name:ident),+ $(,)?) => {
        // Members of VkPhysicalDeviceFeatures in declaration order
        static BASE_FEATURES: &[&str] = &[$(stringify!($name)),+];
    };
}

base_features! {
    robustBufferAccess,
    fullDrawIndexUint32,
    imageCubeArray,
    independentBlend,
    geometryShader,
    tessellationShader,
    sampleRateShading,
    dualSrcBlend,
    logicOp,
    multiDrawIndirect,
    drawIndirectFirstInstance,
    depthClamp,
    depthBiasClamp,
    fillModeNonSolid,
    depthBounds,
    wideLines,
    largePoints,
    alphaToOne,
    multiViewport,
    samplerAnisotropy,
    textureCompressionETC2,
    textureCompressionASTC_LDR,
    textureCompressionBC,
    occlusionQueryPrecise,
    pipelineStatisticsQuery,
    vertexPipelineStoresAndAtomics,
    fragmentStoresAndAtomics,
    shaderTessellationAndGeometryPointSize,
    shaderImageGatherExtended,
    shaderStorageImageExtendedFormats,
    shaderStorageImageMultisample,
    shaderStorageImageReadWithoutFormat,
    shaderStorageImageWriteWithoutFormat,
    shaderUniformBufferArrayDynamicIndexing,
    shaderSampledImageArrayDynamicIndexing,
    shaderStorageBufferArrayDynamicIndexing,
    shaderStorageImageArrayDynamicIndexing,
    shaderClipDistance,
    shaderCullDistance,
    shaderFloat64,
    shaderInt64,
    shaderInt16,
    shaderResourceResidency,
    shaderResourceMinLod,
    sparseBinding,
    sparseResidencyBuffer,
    sparseResidencyImage2D,
    sparseResidencyImage3D,
    sparseResidency2Samples,
    sparseResidency4Samples,
    sparseResidency8Samples,
    sparseResidency16Samples,
    sparseResidencyAliased,
    variableMultisampleRate,
    inheritedQueries,
}

#[derive(Debug)]
struct Extension {
    // The extension that provides the features struct
    name: &'static str,
    // Feature names as written in the struct definition
    features: &'static [&'static str],
}

static EXTENSIONS: &[Extension] = &[
    Extension {
        name: "VK_KHR_16bit_storage",
        features: &[
            "storageBuffer16BitAccess",
            "uniformAndStorageBuffer16BitAccess",
            "storagePushConstant16",
            "storageInputOutput16",
        ],
    },
    Extension {
        name: "VK_KHR_8bit_storage",
        features: &[
            "storageBuffer8BitAccess",
            "uniformAndStorageBuffer8BitAccess",
            "storagePushConstant8",
        ],
    },
    Extension {
        name: "VK_KHR_shader_float16_int8",
        features: &["shaderFloat16", "shaderInt8"],
    },
    Extension {
        name: "VK_KHR_variable_pointers",
        features: &["variablePointersStorageBuffer", "variablePointers"],
    },
    Extension {
        name: "VK_KHR_vulkan_memory_model",
        features: &[
            "vulkanMemoryModel",
            "vulkanMemoryModelDeviceScope",
            "vulkanMemoryModelAvailabilityVisibilityChains",
        ],
    },
    Extension {
        name: "VK_EXT_scalar_block_layout",
        features: &["scalarBlockLayout"],
    },
    Extension {
        name: "VK_KHR_shader_subgroup_extended_types",
        features: &["shaderSubgroupExtendedTypes"],
    },
    Extension {
        name: "VK_EXT_blend_operation_advanced",
        features: &["advancedBlendCoherentOperations"],
    },
];

pub const fn make_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 22) | (minor << 12) | patch
}

pub const fn extract_version(version: u32) -> (u32, u32, u32) {
    (version >> 22, (version >> 12) & 0x3ff, version & 0xfff)
}

/// What a device reports that it supports. The backend fills this in
/// so that the requirements can be checked before any resources are
/// created.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub api_version: u32,
    pub extensions: HashSet<String>,
    /// Names of all of the supported features, both from
    /// VkPhysicalDeviceFeatures and the extension structs
    pub features: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    version: u32,
    // Extension names in the order they were first required
    extensions: Vec<String>,
    // Indexed by extension number. Each bool says whether the
    // corresponding feature of the extension is required.
    features: HashMap<usize, Box<[bool]>>,
    base_features: Box<[bool]>,
}

/// Error returned by [Requirements::check]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("Missing required feature: {0}")]
    MissingBaseFeature(&'static str),
    #[error("Missing required extension: {0}")]
    MissingExtension(String),
    #[error("Missing required feature “{feature}” from extension “{extension}”")]
    MissingFeature {
        extension: &'static str,
        feature: &'static str,
    },
    #[error("{}", version_too_low_message(.required_version, .actual_version))]
    VersionTooLow { required_version: u32, actual_version: u32 },
}

fn version_too_low_message(required: &u32, actual: &u32) -> String {
    let (req_major, req_minor, req_patch) = extract_version(*required);
    let (major, minor, patch) = extract_version(*actual);

    format!(
        "Vulkan API version {}.{}.{} required but the driver reported \
         {}.{}.{}",
        req_major, req_minor, req_patch,
        major, minor, patch,
    )
}

fn find_feature(name: &str) -> Option<(usize, usize)> {
    EXTENSIONS.iter().enumerate().find_map(|(extension_num, extension)| {
        extension
            .features
            .iter()
            .position(|&feature| feature == name)
            .map(|feature_num| (extension_num, feature_num))
    })
}

fn find_base_feature(name: &str) -> Option<usize> {
    BASE_FEATURES.iter().position(|&feature| feature == name)
}

impl Requirements {
    pub fn new() -> Requirements {
        Requirements {
            version: make_version(1, 0, 0),
            extensions: Vec::new(),
            features: HashMap::new(),
            base_features: vec![false; BASE_FEATURES.len()]
                .into_boxed_slice(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn add_version(&mut self, major: u32, minor: u32, patch: u32) {
        self.version = make_version(major, minor, patch);
    }

    fn add_extension_name(&mut self, name: &str) {
        if !self.extensions.iter().any(|e| e == name) {
            self.extensions.push(name.to_owned());
        }
    }

    /// Adds either a feature or an extension. Features that belong to
    /// an extension struct also pull in the extension.
    pub fn add(&mut self, name: &str) {
        if let Some((extension_num, feature_num)) = find_feature(name) {
            let extension = &EXTENSIONS[extension_num];

            self.add_extension_name(extension.name);

            self.features
                .entry(extension_num)
                .or_insert_with(|| {
                    vec![false; extension.features.len()].into_boxed_slice()
                })[feature_num] = true;
        } else if let Some(num) = find_base_feature(name) {
            self.base_features[num] = true;
        } else {
            self.add_extension_name(name);
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Names of every required feature, base features first
    pub fn features(&self) -> impl Iterator<Item = &'static str> + '_ {
        let base = BASE_FEATURES
            .iter()
            .zip(self.base_features.iter())
            .filter_map(|(&name, &required)| required.then_some(name));

        let mut extension_nums =
            self.features.keys().copied().collect::<Vec<_>>();
        extension_nums.sort_unstable();

        let extended = extension_nums.into_iter().flat_map(move |num| {
            EXTENSIONS[num]
                .features
                .iter()
                .zip(self.features[&num].iter())
                .filter_map(|(&name, &required)| required.then_some(name))
        });

        base.chain(extended)
    }

    pub fn check(&self, device: &DeviceInfo) -> Result<(), CheckError> {
        for (&name, &required) in
            BASE_FEATURES.iter().zip(self.base_features.iter())
        {
            if required && !device.features.contains(name) {
                return Err(CheckError::MissingBaseFeature(name));
            }
        }

        for extension in self.extensions.iter() {
            if !device.extensions.contains(extension) {
                return Err(CheckError::MissingExtension(extension.clone()));
            }
        }

        for (&extension_num, features) in self.features.iter() {
            let extension = &EXTENSIONS[extension_num];

            for (&feature, &required) in
                extension.features.iter().zip(features.iter())
            {
                if required && !device.features.contains(feature) {
                    return Err(CheckError::MissingFeature {
                        extension: extension.name,
                        feature,
                    });
                }
            }
        }

        if device.api_version < self.version {
            return Err(CheckError::VersionTooLow {
                required_version: self.version,
                actual_version: device.api_version,
            });
        }

        Ok(())
    }
}

impl Default for Requirements {
    fn default() -> Requirements {
        Requirements::new()
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (major, minor, patch) = extract_version(self.version);
        write!(f, "vulkan {}.{}.{}", major, minor, patch)?;

        for extension in self.extensions.iter() {
            write!(f, "\n{}", extension)?;
        }

        for feature in self.features() {
            write!(f, "\n{}", feature)?;
        }

        Ok(())
    }
}
