use spirv_reflect::ShaderModule;
use spirv_reflect::types::{
    ReflectBlockVariable, ReflectDecorationFlags, ReflectDescriptorBinding, ReflectDescriptorType,
    ReflectFormat, ReflectInterfaceVariable, ReflectShaderStageFlags, ReflectTypeDescription,
    ReflectTypeFlags,
};

use super::*;
use crate::error::{SynthesisError, SynthesisResult};

// spirv-reflect-based conversions into the serializable reflection model

impl ReflectedShaderModule {
    pub fn from_spirv_bytes(spv_bytes: &[u8]) -> SynthesisResult<Self> {
        let module = ShaderModule::load_u8_data(spv_bytes).map_err(reflection_error)?;
        Self::from_spirv_reflect(&module)
    }

    pub fn from_spirv_reflect(module: &ShaderModule) -> SynthesisResult<Self> {
        let stage = shader_stage(module.get_shader_stage())?;

        let descriptor_bindings = module
            .enumerate_descriptor_bindings(None)
            .map_err(reflection_error)?
            .iter()
            .map(descriptor_binding)
            .collect::<SynthesisResult<Vec<_>>>()?;

        let push_constant_blocks = module
            .enumerate_push_constant_blocks(None)
            .map_err(reflection_error)?
            .iter()
            .map(push_constant_block)
            .collect();

        let input_variables = module
            .enumerate_input_variables(None)
            .map_err(reflection_error)?
            .iter()
            .map(interface_variable)
            .collect();

        let output_variables = module
            .enumerate_output_variables(None)
            .map_err(reflection_error)?
            .iter()
            .map(interface_variable)
            .collect();

        Ok(Self {
            entry_point_name: module.get_entry_point_name(),
            stage,
            descriptor_bindings,
            push_constant_blocks,
            input_variables,
            output_variables,
        })
    }
}

fn reflection_error(message: impl std::fmt::Display) -> SynthesisError {
    SynthesisError::Reflection(message.to_string())
}

fn shader_stage(flags: ReflectShaderStageFlags) -> SynthesisResult<ShaderStage> {
    let stage = if flags == ReflectShaderStageFlags::VERTEX {
        ShaderStage::Vertex
    } else if flags == ReflectShaderStageFlags::TESSELLATION_CONTROL {
        ShaderStage::TessellationControl
    } else if flags == ReflectShaderStageFlags::TESSELLATION_EVALUATION {
        ShaderStage::TessellationEvaluation
    } else if flags == ReflectShaderStageFlags::GEOMETRY {
        ShaderStage::Geometry
    } else if flags == ReflectShaderStageFlags::FRAGMENT {
        ShaderStage::Fragment
    } else if flags == ReflectShaderStageFlags::COMPUTE {
        ShaderStage::Compute
    } else {
        // mesh, task, & raytracing
        return Err(SynthesisError::UnsupportedStage(format!("{flags:?}")));
    };

    Ok(stage)
}

fn descriptor_binding(
    binding: &ReflectDescriptorBinding,
) -> SynthesisResult<ReflectedDescriptorBinding> {
    Ok(ReflectedDescriptorBinding {
        name: binding.name.clone(),
        set: binding.set,
        binding: binding.binding,
        descriptor_type: descriptor_type(binding.descriptor_type, binding.set, binding.binding)?,
        array_dimensions: array_dimensions(&binding.array.dims),
        input_attachment_index: binding.input_attachment_index,
    })
}

fn descriptor_type(
    reflected: ReflectDescriptorType,
    set: u32,
    binding: u32,
) -> SynthesisResult<ReflectedDescriptorType> {
    let descriptor_type = match reflected {
        ReflectDescriptorType::Sampler => ReflectedDescriptorType::Sampler,
        ReflectDescriptorType::CombinedImageSampler => ReflectedDescriptorType::CombinedImageSampler,
        ReflectDescriptorType::SampledImage => ReflectedDescriptorType::SampledImage,
        ReflectDescriptorType::StorageImage => ReflectedDescriptorType::StorageImage,
        ReflectDescriptorType::UniformTexelBuffer => ReflectedDescriptorType::UniformTexelBuffer,
        ReflectDescriptorType::StorageTexelBuffer => ReflectedDescriptorType::StorageTexelBuffer,
        ReflectDescriptorType::UniformBuffer => ReflectedDescriptorType::UniformBuffer,
        ReflectDescriptorType::StorageBuffer => ReflectedDescriptorType::StorageBuffer,
        ReflectDescriptorType::UniformBufferDynamic => ReflectedDescriptorType::UniformBufferDynamic,
        ReflectDescriptorType::StorageBufferDynamic => ReflectedDescriptorType::StorageBufferDynamic,
        ReflectDescriptorType::InputAttachment => ReflectedDescriptorType::InputAttachment,
        other => {
            return Err(SynthesisError::UnsupportedDescriptorType(format!(
                "{other:?} at set {set} binding {binding}"
            )));
        }
    };

    Ok(descriptor_type)
}

// an extent of 0 is how spirv-reflect reports a runtime-sized dimension
fn array_dimensions(dims: &[u32]) -> Vec<ArrayDimension> {
    dims.iter().copied().map(ArrayDimension::from_extent).collect()
}

fn push_constant_block(block: &ReflectBlockVariable) -> ReflectedPushConstantBlock {
    ReflectedPushConstantBlock {
        name: block.name.clone(),
        offset: block.offset,
        size: block.size,
    }
}

fn interface_variable(variable: &ReflectInterfaceVariable) -> ReflectedInterfaceVariable {
    ReflectedInterfaceVariable {
        name: variable.name.clone(),
        location: variable.location,
        format: variable_format(variable.format),
        built_in: is_built_in(variable.decoration_flags),
        type_description: variable.type_description.as_ref().map(type_description),
    }
}

fn is_built_in(decoration_flags: ReflectDecorationFlags) -> bool {
    decoration_flags.contains(ReflectDecorationFlags::BUILT_IN)
}

fn variable_format(format: ReflectFormat) -> VariableFormat {
    match format {
        ReflectFormat::R32_UINT => VariableFormat::R32_UINT,
        ReflectFormat::R32_SINT => VariableFormat::R32_SINT,
        ReflectFormat::R32_SFLOAT => VariableFormat::R32_SFLOAT,
        ReflectFormat::R32G32_UINT => VariableFormat::R32G32_UINT,
        ReflectFormat::R32G32_SINT => VariableFormat::R32G32_SINT,
        ReflectFormat::R32G32_SFLOAT => VariableFormat::R32G32_SFLOAT,
        ReflectFormat::R32G32B32_UINT => VariableFormat::R32G32B32_UINT,
        ReflectFormat::R32G32B32_SINT => VariableFormat::R32G32B32_SINT,
        ReflectFormat::R32G32B32_SFLOAT => VariableFormat::R32G32B32_SFLOAT,
        ReflectFormat::R32G32B32A32_UINT => VariableFormat::R32G32B32A32_UINT,
        ReflectFormat::R32G32B32A32_SINT => VariableFormat::R32G32B32A32_SINT,
        ReflectFormat::R32G32B32A32_SFLOAT => VariableFormat::R32G32B32A32_SFLOAT,
        _ => VariableFormat::Undefined,
    }
}

// the array flag wins over the element flags that spirv-reflect also sets,
// element kinds get inferred later from the numeric traits and format
fn type_description(description: &ReflectTypeDescription) -> ReflectedTypeDescription {
    let flags = description.type_flags;
    let numeric = &description.traits.numeric;

    let kind = if flags.contains(ReflectTypeFlags::ARRAY) {
        TypeKind::Array
    } else if flags.contains(ReflectTypeFlags::STRUCT) {
        TypeKind::Struct
    } else if flags.contains(ReflectTypeFlags::MATRIX) {
        TypeKind::Matrix
    } else if flags.contains(ReflectTypeFlags::VECTOR) {
        TypeKind::Vector
    } else if flags.contains(ReflectTypeFlags::FLOAT) {
        TypeKind::Float
    } else if flags.contains(ReflectTypeFlags::INT) {
        TypeKind::Int
    } else if flags.contains(ReflectTypeFlags::BOOL) {
        TypeKind::Bool
    } else {
        TypeKind::Other
    };

    let scalar_kind = if flags.contains(ReflectTypeFlags::FLOAT) {
        Some(ScalarKind::Float)
    } else if flags.contains(ReflectTypeFlags::INT) {
        Some(ScalarKind::Int)
    } else if flags.contains(ReflectTypeFlags::BOOL) {
        Some(ScalarKind::Bool)
    } else {
        None
    };

    let type_name = Some(description.type_name.clone()).filter(|name| !name.is_empty());

    ReflectedTypeDescription {
        type_name,
        struct_member_name: description.struct_member_name.clone(),
        kind,
        scalar_kind,
        signedness: numeric.scalar.signedness,
        component_count: numeric.vector.component_count,
        column_count: numeric.matrix.column_count,
        row_count: numeric.matrix.row_count,
        array_dimensions: array_dimensions(&description.traits.array.dims),
        members: description.members.iter().map(type_description).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflected(flags: ReflectTypeFlags) -> ReflectTypeDescription {
        ReflectTypeDescription {
            type_flags: flags,
            ..Default::default()
        }
    }

    fn kind_of(flags: ReflectTypeFlags) -> TypeKind {
        type_description(&reflected(flags)).kind
    }

    #[test]
    fn invalid_spirv_is_a_reflection_error() {
        let not_spirv = [0u8; 32];
        let result = ReflectedShaderModule::from_spirv_bytes(&not_spirv);

        assert!(matches!(result, Err(SynthesisError::Reflection(_))));
    }

    #[test]
    fn array_flag_wins_over_element_flags() {
        let mut description = reflected(ReflectTypeFlags::ARRAY | ReflectTypeFlags::VECTOR | ReflectTypeFlags::FLOAT);
        description.traits.numeric.vector.component_count = 3;
        description.traits.array.dims = vec![4];

        let converted = type_description(&description);

        assert_eq!(converted.kind, TypeKind::Array);
        assert_eq!(converted.scalar_kind, Some(ScalarKind::Float));
        assert_eq!(converted.component_count, 3);
        assert!(matches!(converted.array_dimensions[..], [ArrayDimension::Sized(4)]));
    }

    #[test]
    fn kind_priority() {
        assert_eq!(
            kind_of(ReflectTypeFlags::STRUCT | ReflectTypeFlags::MATRIX),
            TypeKind::Struct
        );
        assert_eq!(
            kind_of(ReflectTypeFlags::MATRIX | ReflectTypeFlags::VECTOR | ReflectTypeFlags::FLOAT),
            TypeKind::Matrix
        );
        assert_eq!(
            kind_of(ReflectTypeFlags::VECTOR | ReflectTypeFlags::INT),
            TypeKind::Vector
        );
        assert_eq!(
            kind_of(ReflectTypeFlags::FLOAT | ReflectTypeFlags::INT),
            TypeKind::Float
        );
        assert_eq!(
            kind_of(ReflectTypeFlags::INT | ReflectTypeFlags::BOOL),
            TypeKind::Int
        );
        assert_eq!(kind_of(ReflectTypeFlags::BOOL), TypeKind::Bool);
        assert_eq!(kind_of(ReflectTypeFlags::VOID), TypeKind::Other);
    }

    #[test]
    fn matrix_and_signedness_traits_are_kept() {
        let mut description = reflected(ReflectTypeFlags::MATRIX | ReflectTypeFlags::FLOAT);
        description.traits.numeric.matrix.column_count = 4;
        description.traits.numeric.matrix.row_count = 3;
        description.traits.numeric.scalar.signedness = 1;

        let converted = type_description(&description);

        assert_eq!((converted.column_count, converted.row_count), (4, 3));
        assert_eq!(converted.signedness, 1);
    }

    #[test]
    fn empty_type_names_are_dropped() {
        assert_eq!(type_description(&reflected(ReflectTypeFlags::FLOAT)).type_name, None);

        let mut light = reflected(ReflectTypeFlags::STRUCT);
        light.type_name = "Light".to_string();
        assert_eq!(type_description(&light).type_name.as_deref(), Some("Light"));
    }

    #[test]
    fn members_are_converted_recursively() {
        let mut position = reflected(ReflectTypeFlags::VECTOR | ReflectTypeFlags::FLOAT);
        position.struct_member_name = "position".to_string();
        let mut light = reflected(ReflectTypeFlags::STRUCT);
        light.type_name = "Light".to_string();
        light.members = vec![position];

        let converted = type_description(&light);

        assert_eq!(converted.members.len(), 1);
        assert_eq!(converted.members[0].struct_member_name, "position");
        assert_eq!(converted.members[0].kind, TypeKind::Vector);
    }

    #[test]
    fn zero_extent_is_runtime_sized() {
        let dims = array_dimensions(&[3, 0]);

        assert!(matches!(
            dims[..],
            [ArrayDimension::Sized(3), ArrayDimension::RuntimeSized]
        ));
    }

    #[test]
    fn built_in_decoration() {
        assert!(is_built_in(ReflectDecorationFlags::BUILT_IN | ReflectDecorationFlags::FLAT));
        assert!(!is_built_in(ReflectDecorationFlags::FLAT));
        assert!(!is_built_in(ReflectDecorationFlags::NONE));
    }

    #[test]
    fn unsupported_descriptor_types_are_errors() {
        for unsupported in [
            ReflectDescriptorType::Undefined,
            ReflectDescriptorType::AccelerationStructureNV,
        ] {
            assert!(matches!(
                descriptor_type(unsupported, 1, 2),
                Err(SynthesisError::UnsupportedDescriptorType(message)) if message.contains("set 1 binding 2")
            ));
        }

        assert_eq!(
            descriptor_type(ReflectDescriptorType::InputAttachment, 0, 0).unwrap(),
            ReflectedDescriptorType::InputAttachment
        );
    }

    #[test]
    fn stages() {
        assert_eq!(
            shader_stage(ReflectShaderStageFlags::TESSELLATION_EVALUATION).unwrap(),
            ShaderStage::TessellationEvaluation
        );
        assert!(matches!(
            shader_stage(ReflectShaderStageFlags::RAYGEN_BIT_NV),
            Err(SynthesisError::UnsupportedStage(_))
        ));
    }

    #[test]
    fn unknown_formats_are_undefined() {
        assert_eq!(variable_format(ReflectFormat::R32G32_SINT), VariableFormat::R32G32_SINT);
        assert_eq!(variable_format(ReflectFormat::Undefined), VariableFormat::Undefined);
    }
}
