use std::path::PathBuf;

use exhaustive_shader::tasks::{self, Config};

const DEFAULT_OUTPUT_DIR: &str = "shaders/synthesized";
const USAGE: &str = "usage: exhaustive-shader <shader.spv | reflection.json> [output dir]";

pub fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(shader_path) = args.next() else {
        anyhow::bail!(USAGE);
    };
    let output_dir = args.next().unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

    let arg = std::env::var("WRITE_COMPANION_SOURCES").ok();
    let write_companion_sources = match arg {
        None => true,
        Some(s) if s.is_empty() => false,
        Some(s) if s.to_lowercase() == "false" => false,
        _ => true,
    };

    let config = Config {
        shader_path: PathBuf::from(shader_path),
        output_dir: PathBuf::from(output_dir),
        write_companion_sources,
    };

    let plan = tasks::write_pipeline_plan(&config)?;
    log::info!(
        "{:?} pipeline for {:?} entry point '{}' with {} companion stages",
        plan.pipeline_kind,
        plan.stage_under_test,
        plan.entry_point_name,
        plan.companions.len()
    );

    Ok(())
}
