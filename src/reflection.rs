use ash::vk;
use serde::{Deserialize, Serialize};

mod spirv;

/// reflected data for one single-stage shader module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedShaderModule {
    pub entry_point_name: String,
    pub stage: ShaderStage,
    #[serde(default)]
    pub descriptor_bindings: Vec<ReflectedDescriptorBinding>,
    #[serde(default)]
    pub push_constant_blocks: Vec<ReflectedPushConstantBlock>,
    #[serde(default)]
    pub input_variables: Vec<ReflectedInterfaceVariable>,
    #[serde(default)]
    pub output_variables: Vec<ReflectedInterfaceVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedDescriptorBinding {
    #[serde(default)]
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: ReflectedDescriptorType,
    #[serde(default)]
    pub array_dimensions: Vec<ArrayDimension>,
    /// only meaningful for input attachments
    #[serde(default)]
    pub input_attachment_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedPushConstantBlock {
    #[serde(default)]
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// a shader input or output variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedInterfaceVariable {
    #[serde(default)]
    pub name: String,
    pub location: u32,
    #[serde(default)]
    pub format: VariableFormat,
    #[serde(default)]
    pub built_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub type_description: Option<ReflectedTypeDescription>,
}

impl ReflectedInterfaceVariable {
    /// built-ins are implicit stage contracts, never user data
    pub fn is_built_in(&self) -> bool {
        self.built_in || self.name.starts_with(BUILT_IN_PREFIX)
    }

    pub fn is_array(&self) -> bool {
        self.type_description
            .as_ref()
            .is_some_and(|description| description.kind == TypeKind::Array)
    }

    /// outermost first, empty for non-arrays
    pub fn array_dimensions(&self) -> &[ArrayDimension] {
        match &self.type_description {
            Some(description) if description.kind == TypeKind::Array => {
                &description.array_dimensions
            }
            _ => &[],
        }
    }

    /// how many consecutive locations the variable occupies, counting a
    /// runtime-sized dimension as 1
    pub fn location_count(&self) -> u32 {
        self.array_dimensions()
            .iter()
            .map(|dimension| match dimension {
                ArrayDimension::Sized(extent) => *extent,
                ArrayDimension::RuntimeSized => 1,
            })
            .fold(1, u32::saturating_mul)
    }
}

/// identifiers reserved for built-in variables in glsl
pub const BUILT_IN_PREFIX: &str = "gl_";

/// a recursive type description
///
/// For arrays, the numeric fields describe the element type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectedTypeDescription {
    /// only present for named aggregates
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(default)]
    pub struct_member_name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub scalar_kind: Option<ScalarKind>,
    /// zero for unsigned integers
    #[serde(default)]
    pub signedness: u32,
    #[serde(default)]
    pub component_count: u32,
    #[serde(default)]
    pub column_count: u32,
    #[serde(default)]
    pub row_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub array_dimensions: Vec<ArrayDimension>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub members: Vec<ReflectedTypeDescription>,
}

impl ReflectedTypeDescription {
    /// the format a struct member would have if it were an interface variable
    pub fn implied_format(&self) -> VariableFormat {
        let components = if self.component_count == 0 {
            1
        } else {
            self.component_count
        };

        match (self.scalar_kind, self.signedness, components) {
            (Some(ScalarKind::Float), _, 1) => VariableFormat::R32_SFLOAT,
            (Some(ScalarKind::Float), _, 2) => VariableFormat::R32G32_SFLOAT,
            (Some(ScalarKind::Float), _, 3) => VariableFormat::R32G32B32_SFLOAT,
            (Some(ScalarKind::Float), _, 4) => VariableFormat::R32G32B32A32_SFLOAT,
            (Some(ScalarKind::Int), 0, 1) => VariableFormat::R32_UINT,
            (Some(ScalarKind::Int), 0, 2) => VariableFormat::R32G32_UINT,
            (Some(ScalarKind::Int), 0, 3) => VariableFormat::R32G32B32_UINT,
            (Some(ScalarKind::Int), 0, 4) => VariableFormat::R32G32B32A32_UINT,
            (Some(ScalarKind::Int), _, 1) => VariableFormat::R32_SINT,
            (Some(ScalarKind::Int), _, 2) => VariableFormat::R32G32_SINT,
            (Some(ScalarKind::Int), _, 3) => VariableFormat::R32G32B32_SINT,
            (Some(ScalarKind::Int), _, 4) => VariableFormat::R32G32B32A32_SINT,
            _ => VariableFormat::Undefined,
        }
    }
}

/// the structural kind of a reflected type, roughly its spirv type opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    Vector,
    Matrix,
    /// the element kind is not recorded and has to be inferred
    Array,
    Struct,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "extent", rename_all = "camelCase")]
pub enum ArrayDimension {
    Sized(u32),
    RuntimeSized,
}

impl ArrayDimension {
    pub fn from_extent(extent: u32) -> Self {
        match extent {
            0 => Self::RuntimeSized,
            n => Self::Sized(n),
        }
    }

    pub fn glsl_suffix(&self) -> String {
        match self {
            Self::Sized(n) => format!("[{n}]"),
            Self::RuntimeSized => "[]".to_string(),
        }
    }
}

/// the memory format assigned to an interface variable
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableFormat {
    #[default]
    Undefined,
    R32_UINT,
    R32_SINT,
    R32_SFLOAT,
    R32G32_UINT,
    R32G32_SINT,
    R32G32_SFLOAT,
    R32G32B32_UINT,
    R32G32B32_SINT,
    R32G32B32_SFLOAT,
    R32G32B32A32_UINT,
    R32G32B32A32_SINT,
    R32G32B32A32_SFLOAT,
}

impl VariableFormat {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::R32_SFLOAT | Self::R32G32_SFLOAT | Self::R32G32B32_SFLOAT | Self::R32G32B32A32_SFLOAT
        )
    }

    pub fn is_signed_int(self) -> bool {
        matches!(
            self,
            Self::R32_SINT | Self::R32G32_SINT | Self::R32G32B32_SINT | Self::R32G32B32A32_SINT
        )
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(
            self,
            Self::R32_UINT | Self::R32G32_UINT | Self::R32G32B32_UINT | Self::R32G32B32A32_UINT
        )
    }
}

/// a spirv-reflect descriptor type or vulkan DescriptorType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReflectedDescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
    AccelerationStructure,
}

impl ReflectedDescriptorType {
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            Self::Sampler => vk::DescriptorType::SAMPLER,
            Self::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            Self::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            Self::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            Self::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            Self::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            Self::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            Self::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
            Self::AccelerationStructure => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            Self::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            Self::Geometry => vk::ShaderStageFlags::GEOMETRY,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }

    /// the file extension glslc uses to infer the stage
    pub fn glsl_extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::TessellationControl => "tesc",
            Self::TessellationEvaluation => "tese",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
            Self::Compute => "comp",
        }
    }
}
