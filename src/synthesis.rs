use serde::{Deserialize, Serialize};

use crate::error::SynthesisResult;
use crate::reflection::{ReflectedShaderModule, ShaderStage};

mod companion;
pub use companion::*;

mod pipeline_layout;
pub use pipeline_layout::*;

mod render_pass;
pub use render_pass::*;

mod type_names;
pub use type_names::*;

/// everything needed to build a pipeline around a single reflected stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub entry_point_name: String,
    pub stage_under_test: ShaderStage,
    pub pipeline_kind: PipelineKind,
    pub pipeline_layout: SynthesizedPipelineLayout,
    pub companions: Vec<CompanionSource>,
    pub render_pass: RenderPassRequirements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineKind {
    Graphics,
    Compute,
}

pub fn synthesize_pipeline(module: &ReflectedShaderModule) -> SynthesisResult<PipelinePlan> {
    let PipelineLayoutSynthesis {
        layout,
        input_attachment_indices,
    } = synthesize_pipeline_layout(
        module.stage,
        &module.descriptor_bindings,
        &module.push_constant_blocks,
    )?;

    let companions = synthesize_companions(module)?;
    let render_pass = RenderPassRequirements::new(module, input_attachment_indices);

    let pipeline_kind = match module.stage {
        ShaderStage::Compute => PipelineKind::Compute,
        _ => PipelineKind::Graphics,
    };

    log::debug!(
        "{:?} pipeline for '{}': {} set layouts, {} push constant ranges, {} companions",
        pipeline_kind,
        module.entry_point_name,
        layout.descriptor_set_layouts.len(),
        layout.push_constant_ranges.len(),
        companions.len()
    );

    Ok(PipelinePlan {
        entry_point_name: module.entry_point_name.clone(),
        stage_under_test: module.stage,
        pipeline_kind,
        pipeline_layout: layout,
        companions,
        render_pass,
    })
}
