use ash::vk;

use crate::reflection::VariableFormat;

/// every failure here is fatal for the shader under test
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("reflection query failed: {0}")]
    Reflection(String),

    #[error("unsupported type found: {0}")]
    UnsupportedType(String),

    #[error("undefined format {format:?} for array element of '{variable}'")]
    UndefinedFormat {
        variable: String,
        format: VariableFormat,
    },

    #[error("unsupported shader stage: {0}")]
    UnsupportedStage(String),

    #[error("unsupported descriptor type: {0}")]
    UnsupportedDescriptorType(String),

    #[error("duplicate binding {binding} in descriptor set {set}")]
    DuplicateBinding { set: u32, binding: u32 },

    #[error("descriptor count overflows u32 for set {set} binding {binding}")]
    DescriptorCountOverflow { set: u32, binding: u32 },

    #[error("recursive struct type: {0}")]
    RecursiveStruct(String),

    #[error("failed to render companion source: {0}")]
    Template(#[from] askama::Error),

    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;
