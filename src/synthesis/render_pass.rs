use serde::{Deserialize, Serialize};

use crate::reflection::{ReflectedShaderModule, ShaderStage};

/// what a subpass needs so the synthesized pipeline is compatible with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPassRequirements {
    /// in descriptor set order
    pub input_attachment_indices: Vec<u32>,
    /// fragment outputs, ascending by location
    pub color_outputs: Vec<ColorOutput>,
}

/// a fragment output and the consecutive locations it writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOutput {
    pub location: u32,
    pub location_count: u32,
}

impl RenderPassRequirements {
    pub fn new(module: &ReflectedShaderModule, input_attachment_indices: Vec<u32>) -> Self {
        let mut color_outputs: Vec<ColorOutput> = if module.stage == ShaderStage::Fragment {
            module
                .output_variables
                .iter()
                .filter(|v| !v.is_built_in())
                .map(|v| ColorOutput {
                    location: v.location,
                    location_count: v.location_count(),
                })
                .collect()
        } else {
            vec![]
        };
        color_outputs.sort_unstable_by_key(|output| output.location);
        color_outputs.dedup();

        Self {
            input_attachment_indices,
            color_outputs,
        }
    }

    /// the length of the subpass input attachment array
    pub fn input_attachment_count(&self) -> u32 {
        self.input_attachment_indices
            .iter()
            .max()
            .map_or(0, |max| max + 1)
    }

    /// the length of the subpass color attachment array
    ///
    /// An output array at location `n` writes `n` through `n + len - 1`.
    pub fn color_attachment_count(&self) -> u32 {
        self.color_outputs
            .iter()
            .map(|output| output.location.saturating_add(output.location_count))
            .max()
            .unwrap_or(0)
    }
}
