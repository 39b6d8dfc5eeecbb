//! Shader command implementations (compile, status, clean)

use std::process::ExitCode;

use super::{LayoutArgs, ToolchainArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{compile_shaders, CompileOptions, ShaderBuild};
use crate::config::{
    find_config, load_config, merge_cli_overrides, validate_config, CliOverrides,
    ShaderBuildConfig,
};
use crate::paths::EngineLayout;

/// Load the configuration, apply CLI overrides and resolve the engine layout.
fn resolve(
    layout: &LayoutArgs,
    toolchain: Option<&ToolchainArgs>,
) -> Result<(ShaderBuildConfig, EngineLayout), ExitCode> {
    let config_path = layout.config.clone().or_else(find_config);
    match &config_path {
        Some(path) => tracing::debug!(path = %path.display(), "using config"),
        None => tracing::debug!("no shaderbuild.toml found, using defaults"),
    }

    let mut config = match config_path {
        Some(path) => load_config(Some(&path)),
        None => Ok(ShaderBuildConfig::default()),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;

    let mut overrides = CliOverrides {
        engine_root: layout.engine_root.clone(),
        tools_dir: layout.tools_dir.clone(),
        intermediate: layout.intermediate.clone(),
        target: layout.target.clone(),
        ..Default::default()
    };
    if let Some(args) = toolchain {
        overrides.api = args.api.clone();
        overrides.compiler_dir = args.compiler_path.clone();
        overrides.glsl_version = args.glsl_version.clone();
        overrides.target_env = args.target_env.clone();
        overrides.disassemble = args.spirv_disasm.then_some(true);
        overrides.jobs = args.jobs.map(|j| j as usize);
        overrides.timeout_secs = args.timeout;
    }
    merge_cli_overrides(&mut config, &overrides);

    if let Err(e) = validate_config(&config) {
        eprintln!("Error: {}", e);
        return Err(ExitCode::from(EXIT_INVALID_ARGS));
    }

    let engine = EngineLayout::resolve(&config).map_err(|e| {
        eprintln!("Error: cannot determine engine root: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;
    tracing::debug!(
        engine_root = %engine.root().display(),
        shader_src = %engine.shader_src().display(),
        "resolved engine layout"
    );

    Ok((config, engine))
}

fn options_for(layout: &LayoutArgs) -> Result<CompileOptions, ExitCode> {
    let (config, engine) = resolve(layout, None)?;
    Ok(engine.compile_options(&config))
}

/// Run the compile command
pub fn run_compile(layout: &LayoutArgs, toolchain: &ToolchainArgs, force: bool) -> ExitCode {
    let (config, engine) = match resolve(layout, Some(toolchain)) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };

    let mut options = engine.compile_options(&config);
    options.force = force;
    if force {
        tracing::info!("force mode: recompiling every stage");
    }

    let result = compile_shaders(&options);
    if result.is_success() {
        tracing::info!(
            elapsed_ms = result.duration.as_millis() as u64,
            "shader compilation finished"
        );
        println!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprint!("{}", result.errors);
        if !result.errors.ends_with('\n') {
            eprintln!();
        }
        eprintln!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run the status command
pub fn run_status(layout: &LayoutArgs) -> ExitCode {
    let options = match options_for(layout) {
        Ok(options) => options,
        Err(code) => return code,
    };
    let context = match options.context() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let status = match ShaderBuild::new(context).status() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if status.is_empty() {
        println!("No shader sources found in {}", options.source_root.display());
        return ExitCode::from(EXIT_SUCCESS);
    }

    let stale = status.iter().filter(|p| p.is_stale()).count();
    for pipeline in &status {
        let marker = if pipeline.is_stale() { "*" } else { " " };
        println!("{} {}", marker, pipeline.name);
        for stage in &pipeline.stages {
            let state = if stage.stale { "stale" } else { "up to date" };
            let source = stage
                .source
                .strip_prefix(&options.source_root)
                .unwrap_or(&stage.source)
                .display();
            println!("    {:<5} {} ({})", stage.kind.to_string(), source, state);
        }
    }
    println!();
    println!("{} pipelines, {} need rebuilding", status.len(), stale);
    ExitCode::from(EXIT_SUCCESS)
}

/// Run the clean command
pub fn run_clean(layout: &LayoutArgs) -> ExitCode {
    let options = match options_for(layout) {
        Ok(options) => options,
        Err(code) => return code,
    };
    let context = match options.context() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    match ShaderBuild::new(context).clean() {
        Ok(()) => {
            println!("Removed shader artifacts");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
