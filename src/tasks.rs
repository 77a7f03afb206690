use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::reflection::ReflectedShaderModule;
use crate::synthesis::{PipelinePlan, synthesize_pipeline};

pub struct Config {
    /// a spirv binary, or a reflection json file written by an earlier run
    pub shader_path: PathBuf,
    /// the directory to write the plan json and companion glsl into
    pub output_dir: PathBuf,
    /// whether to write companion glsl (or only json)
    pub write_companion_sources: bool,
}

pub fn write_pipeline_plan(config: &Config) -> anyhow::Result<PipelinePlan> {
    let shader_path = &config.shader_path;
    let is_json = shader_path.extension().is_some_and(|ext| ext == "json");

    let module = if is_json {
        read_reflection_json(shader_path)?
    } else {
        let spv_bytes = std::fs::read(shader_path)
            .with_context(|| format!("failed to read {}", shader_path.display()))?;
        ReflectedShaderModule::from_spirv_bytes(&spv_bytes)
            .with_context(|| format!("failed to reflect {}", shader_path.display()))?
    };

    let plan = synthesize_pipeline(&module)
        .with_context(|| format!("failed to synthesize a pipeline for {}", shader_path.display()))?;

    let prefix = output_prefix(shader_path)?;
    std::fs::create_dir_all(&config.output_dir)?;

    if !is_json {
        let reflection_json = serde_json::to_string_pretty(&module)?;
        let json_path = config.output_dir.join(format!("{prefix}.reflection.json"));
        std::fs::write(&json_path, reflection_json)?;
        log::info!("wrote {}", json_path.display());
    }

    let plan_json = serde_json::to_string_pretty(&plan)?;
    let plan_path = config.output_dir.join(format!("{prefix}.plan.json"));
    std::fs::write(&plan_path, plan_json)?;
    log::info!("wrote {}", plan_path.display());

    if config.write_companion_sources {
        for companion in &plan.companions {
            let extension = companion.stage.glsl_extension();
            let glsl_path = config.output_dir.join(format!("{prefix}.{extension}"));
            std::fs::write(&glsl_path, &companion.source)?;
            log::info!("wrote {}", glsl_path.display());
        }
    }

    Ok(plan)
}

pub fn read_reflection_json(path: &Path) -> anyhow::Result<ReflectedShaderModule> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let module = serde_json::from_str(&json)
        .with_context(|| format!("invalid reflection json in {}", path.display()))?;

    Ok(module)
}

// 'lights.tesc.spv' -> 'lights'
fn output_prefix(shader_path: &Path) -> anyhow::Result<String> {
    let file_name = shader_path
        .file_name()
        .and_then(|os_str| os_str.to_str())
        .with_context(|| format!("no file name in {}", shader_path.display()))?;
    let prefix = file_name.split('.').next().unwrap_or(file_name);

    Ok(prefix.to_string())
}
