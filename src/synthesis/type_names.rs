use crate::error::{SynthesisError, SynthesisResult};
use crate::reflection::{
    ReflectedInterfaceVariable, ReflectedTypeDescription, TypeKind, VariableFormat,
};

/// a type kind that can be rendered as glsl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedKind {
    Bool,
    Float,
    Int { signed: bool },
    Vector { component_count: u32 },
    Matrix { column_count: u32, row_count: u32 },
}

/// the glsl type name for an interface variable
pub fn variable_type_name(variable: &ReflectedInterfaceVariable) -> SynthesisResult<String> {
    let description = variable.type_description.as_ref().ok_or_else(|| {
        SynthesisError::UnsupportedType(format!(
            "no type description for variable at location {}",
            variable.location
        ))
    })?;

    glsl_type_name(description, variable.format, &variable.name)
}

/// the glsl type name for a type description
///
/// `format` is only consulted for arrays whose element type can't be read
/// from the description itself. `context` names the variable in errors.
pub fn glsl_type_name(
    description: &ReflectedTypeDescription,
    format: VariableFormat,
    context: &str,
) -> SynthesisResult<String> {
    // arrays of structs only expose the element type through the name
    if let Some(type_name) = &description.type_name {
        return Ok(type_name.clone());
    }

    let kind = match description.kind {
        TypeKind::Array => infer_array_element_kind(description, format, context)?,
        TypeKind::Bool => ResolvedKind::Bool,
        TypeKind::Float => ResolvedKind::Float,
        TypeKind::Int => ResolvedKind::Int {
            signed: description.signedness != 0,
        },
        TypeKind::Vector => ResolvedKind::Vector {
            component_count: description.component_count,
        },
        TypeKind::Matrix => ResolvedKind::Matrix {
            column_count: description.column_count,
            row_count: description.row_count,
        },
        TypeKind::Struct | TypeKind::Other => {
            return Err(SynthesisError::UnsupportedType(format!(
                "{:?} for '{context}'",
                description.kind
            )));
        }
    };

    Ok(render(kind))
}

fn infer_array_element_kind(
    description: &ReflectedTypeDescription,
    format: VariableFormat,
    context: &str,
) -> SynthesisResult<ResolvedKind> {
    if description.column_count > 0 && description.row_count > 0 {
        return Ok(ResolvedKind::Matrix {
            column_count: description.column_count,
            row_count: description.row_count,
        });
    }

    if description.component_count > 0 {
        return Ok(ResolvedKind::Vector {
            component_count: description.component_count,
        });
    }

    if format.is_float() {
        Ok(ResolvedKind::Float)
    } else if format.is_signed_int() {
        Ok(ResolvedKind::Int { signed: true })
    } else if format.is_unsigned_int() {
        Ok(ResolvedKind::Int { signed: false })
    } else {
        Err(SynthesisError::UndefinedFormat {
            variable: context.to_string(),
            format,
        })
    }
}

fn render(kind: ResolvedKind) -> String {
    match kind {
        ResolvedKind::Bool => "bool".to_string(),
        ResolvedKind::Float => "float".to_string(),
        ResolvedKind::Int { signed: true } => "int".to_string(),
        ResolvedKind::Int { signed: false } => "uint".to_string(),
        ResolvedKind::Vector { component_count } => format!("vec{component_count}"),
        ResolvedKind::Matrix {
            column_count,
            row_count,
        } if column_count == row_count => format!("mat{column_count}"),
        ResolvedKind::Matrix {
            column_count,
            row_count,
        } => format!("mat{column_count}x{row_count}"),
    }
}
