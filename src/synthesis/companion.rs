use std::collections::{HashMap, HashSet};

use askama::Template;
use serde::{Deserialize, Serialize};

use super::type_names::{glsl_type_name, variable_type_name};
use crate::error::{SynthesisError, SynthesisResult};
use crate::reflection::{
    ArrayDimension, ReflectedInterfaceVariable, ReflectedShaderModule, ReflectedTypeDescription, ShaderStage,
    TypeKind,
};

/// nested struct definitions deeper than this are treated as a cycle
const MAX_STRUCT_DEPTH: usize = 16;

/// glsl source for a stage adjacent to the stage under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionSource {
    pub stage: ShaderStage,
    pub source: String,
}

/// the pass-through stages needed to link the module into a pipeline
pub fn synthesize_companions(
    module: &ReflectedShaderModule,
) -> SynthesisResult<Vec<CompanionSource>> {
    let companions = match module.stage {
        ShaderStage::Vertex | ShaderStage::Compute => vec![],

        ShaderStage::Geometry | ShaderStage::Fragment => vec![CompanionSource {
            stage: ShaderStage::Vertex,
            source: passthrough_vertex(module.stage, &module.input_variables)?,
        }],

        ShaderStage::TessellationControl => vec![
            CompanionSource {
                stage: ShaderStage::Vertex,
                source: passthrough_vertex(module.stage, &module.input_variables)?,
            },
            CompanionSource {
                stage: ShaderStage::TessellationEvaluation,
                source: passthrough_tessellation_evaluation(&module.output_variables)?,
            },
        ],

        // the synthesized control stage only reads gl_in
        ShaderStage::TessellationEvaluation => vec![
            CompanionSource {
                stage: ShaderStage::Vertex,
                source: passthrough_vertex(ShaderStage::TessellationControl, &[])?,
            },
            CompanionSource {
                stage: ShaderStage::TessellationControl,
                source: passthrough_tessellation_control(&module.input_variables)?,
            },
        ],
    };

    for companion in &companions {
        log::debug!(
            "synthesized {:?} companion for {:?} '{}'",
            companion.stage,
            module.stage,
            module.entry_point_name
        );
    }

    Ok(companions)
}

/// a vertex stage writing one output per input of the next stage
///
/// Geometry and tessellation control inputs are per-vertex arrays, so their
/// outermost dimension is dropped here. Every other input keeps its full type.
pub fn passthrough_vertex(
    next_stage: ShaderStage,
    next_stage_inputs: &[ReflectedInterfaceVariable],
) -> SynthesisResult<String> {
    let arrayness = match next_stage {
        ShaderStage::Geometry | ShaderStage::TessellationControl => Arrayness::PerVertexElement,
        _ => Arrayness::Whole,
    };

    let mut interface = InterfaceBuilder::default();
    for variable in user_variables(next_stage_inputs) {
        interface.declare(variable, "out", arrayness)?;
    }

    let template = PassthroughVertex {
        struct_definitions: interface.struct_definitions,
        declarations: interface.declarations,
    };

    Ok(template.render()?)
}

/// a tessellation evaluation stage reading every output of a control stage
pub fn passthrough_tessellation_evaluation(
    control_outputs: &[ReflectedInterfaceVariable],
) -> SynthesisResult<String> {
    let mut interface = InterfaceBuilder::default();
    for variable in user_variables(control_outputs) {
        interface.declare(variable, "in", Arrayness::PerVertex)?;
    }

    let template = PassthroughTessellationEvaluation {
        struct_definitions: interface.struct_definitions,
        declarations: interface.declarations,
    };

    Ok(template.render()?)
}

/// a tessellation control stage writing every input of an evaluation stage
pub fn passthrough_tessellation_control(
    evaluation_inputs: &[ReflectedInterfaceVariable],
) -> SynthesisResult<String> {
    let mut interface = InterfaceBuilder::default();
    for variable in user_variables(evaluation_inputs) {
        interface.declare(variable, "out", Arrayness::PerVertex)?;
    }

    let template = PassthroughTessellationControl {
        struct_definitions: interface.struct_definitions,
        declarations: interface.declarations,
    };

    Ok(template.render()?)
}

#[derive(Template)]
#[template(path = "passthrough.vert.askama", escape = "none")]
struct PassthroughVertex {
    struct_definitions: Vec<String>,
    declarations: Vec<String>,
}

#[derive(Template)]
#[template(path = "passthrough.tesc.askama", escape = "none")]
struct PassthroughTessellationControl {
    struct_definitions: Vec<String>,
    declarations: Vec<String>,
}

#[derive(Template)]
#[template(path = "passthrough.tese.askama", escape = "none")]
struct PassthroughTessellationEvaluation {
    struct_definitions: Vec<String>,
    declarations: Vec<String>,
}

/// non-built-in variables in location order
fn user_variables(
    variables: &[ReflectedInterfaceVariable],
) -> impl Iterator<Item = &ReflectedInterfaceVariable> {
    let mut user: Vec<_> = variables.iter().filter(|v| !v.is_built_in()).collect();
    user.sort_by_key(|v| v.location);
    user.into_iter()
}

#[derive(Debug, Clone, Copy)]
enum Arrayness {
    /// every dimension is part of the declared type
    Whole,
    /// the outermost dimension is per-vertex on the other side
    PerVertexElement,
    /// arrays are per-vertex and unsized, everything else is per-patch
    PerVertex,
}

/// struct definitions and variable declarations, in declaration order
#[derive(Debug, Default)]
struct InterfaceBuilder {
    struct_definitions: Vec<String>,
    defined_structs: HashSet<String>,
    declarations: Vec<String>,
    /// declarations so far at each location, for variables sharing a location by component
    location_uses: HashMap<u32, u32>,
}

impl InterfaceBuilder {
    fn declare(
        &mut self,
        variable: &ReflectedInterfaceVariable,
        storage: &str,
        arrayness: Arrayness,
    ) -> SynthesisResult<()> {
        let type_name = variable_type_name(variable)?;

        // structs can't be forward referenced
        if let Some(description) = &variable.type_description {
            self.define_struct(description, &mut vec![])?;
        }

        let location = variable.location;
        let uses = self.location_uses.entry(location).or_default();
        let name = match *uses {
            0 => format!("{storage}_{location}"),
            repeat => format!("{storage}_{location}_{repeat}"),
        };
        *uses += 1;

        let dimensions = variable.array_dimensions();
        let inner = glsl_dimensions(dimensions.get(1..).unwrap_or_default());
        let declaration = match arrayness {
            Arrayness::Whole => {
                let all = glsl_dimensions(dimensions);
                format!("layout(location = {location}) {storage} {type_name} {name}{all};")
            }
            Arrayness::PerVertexElement => {
                format!("layout(location = {location}) {storage} {type_name} {name}{inner};")
            }
            Arrayness::PerVertex if variable.is_array() => {
                format!("layout(location = {location}) {storage} {type_name} {name}[]{inner};")
            }
            Arrayness::PerVertex => {
                format!("layout(location = {location}) patch {storage} {type_name} {name};")
            }
        };

        self.declarations.push(declaration);

        Ok(())
    }

    /// defines a named type after the named types of its members
    fn define_struct(
        &mut self,
        description: &ReflectedTypeDescription,
        visiting: &mut Vec<String>,
    ) -> SynthesisResult<()> {
        let Some(type_name) = &description.type_name else {
            return Ok(());
        };
        if description.members.is_empty() || self.defined_structs.contains(type_name) {
            return Ok(());
        }
        if visiting.contains(type_name) || visiting.len() >= MAX_STRUCT_DEPTH {
            visiting.push(type_name.clone());
            return Err(SynthesisError::RecursiveStruct(visiting.join(" -> ")));
        }

        visiting.push(type_name.clone());
        for member in &description.members {
            self.define_struct(member, visiting)?;
        }
        visiting.pop();

        let mut definition = format!("struct {type_name} {{\n");
        for (index, member) in description.members.iter().enumerate() {
            let member_name = if member.struct_member_name.is_empty() {
                format!("member_{index}")
            } else {
                member.struct_member_name.clone()
            };
            let member_type = glsl_type_name(member, member.implied_format(), &member_name)?;
            let dimensions = if member.kind == TypeKind::Array {
                glsl_dimensions(&member.array_dimensions)
            } else {
                String::new()
            };

            definition.push_str(&format!("    {member_type} {member_name}{dimensions};\n"));
        }
        definition.push_str("};");

        self.defined_structs.insert(type_name.clone());
        self.struct_definitions.push(definition);

        Ok(())
    }
}

fn glsl_dimensions(dimensions: &[ArrayDimension]) -> String {
    dimensions.iter().map(ArrayDimension::glsl_suffix).collect()
}
