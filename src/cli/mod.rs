//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod compile;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// shaderbuild - Incremental engine shader compiler
#[derive(Parser)]
#[command(name = "shaderbuild")]
#[command(about = "Compile engine GLSL shaders to SPIR-V and generate pipeline reflection data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile changed shader stages and reflect their pipelines
    Compile {
        #[command(flatten)]
        layout: LayoutArgs,

        #[command(flatten)]
        toolchain: ToolchainArgs,

        /// Recompile every stage regardless of the change manifest
        #[arg(long)]
        force: bool,
    },

    /// List pipelines and the stages the next compile would rebuild
    Status {
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Remove compiled shaders, reflection data and the change manifest
    Clean {
        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// Engine layout and configuration flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct LayoutArgs {
    /// Path to shaderbuild.toml (default: search upwards from the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Engine root directory
    #[arg(long)]
    pub engine_root: Option<PathBuf>,

    /// Tool binaries root holding the reflection tool
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Intermediate output directory
    #[arg(long)]
    pub intermediate: Option<PathBuf>,

    /// Target output directory
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Compiler settings for the compile command
#[derive(Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    /// Render API (only vulkan is supported)
    #[arg(long)]
    pub api: Option<String>,

    /// Directory containing the shader compiler (default: $VULKAN_SDK/bin)
    #[arg(long)]
    pub compiler_path: Option<PathBuf>,

    /// GLSL version passed to the compiler (default: 460)
    #[arg(long)]
    pub glsl_version: Option<String>,

    /// Compiler target environment, e.g. vulkan1.3 (default: derived from the SDK directory)
    #[arg(long)]
    pub target_env: Option<String>,

    /// Also write SPIR-V disassembly of every compiled stage
    #[arg(long)]
    pub spirv_disasm: bool,

    /// Number of parallel tool invocations (default: number of CPUs)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Seconds before a hung tool is killed (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` controls the filter; `--verbose` forces debug output.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse the command line and run the requested command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { layout, toolchain, force } => {
            init_tracing(layout.verbose);
            compile::run_compile(&layout, &toolchain, force)
        }
        Commands::Status { layout } => {
            init_tracing(layout.verbose);
            compile::run_status(&layout)
        }
        Commands::Clean { layout } => {
            init_tracing(layout.verbose);
            compile::run_clean(&layout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_flags() {
        let cli = Cli::try_parse_from([
            "shaderbuild",
            "compile",
            "--engine-root",
            "/engine",
            "--compiler-path",
            "/sdk/bin",
            "--glsl-version",
            "450",
            "--spirv-disasm",
            "--force",
            "-j",
            "4",
            "--timeout",
            "0",
        ])
        .unwrap();

        match cli.command {
            Commands::Compile { layout, toolchain, force } => {
                assert_eq!(layout.engine_root, Some(PathBuf::from("/engine")));
                assert_eq!(toolchain.compiler_path, Some(PathBuf::from("/sdk/bin")));
                assert_eq!(toolchain.glsl_version.as_deref(), Some("450"));
                assert!(toolchain.spirv_disasm);
                assert_eq!(toolchain.jobs, Some(4));
                assert_eq!(toolchain.timeout, Some(0));
                assert!(force);
            }
            _ => panic!("expected compile command"),
        }
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["shaderbuild", "compile", "--jobs", "0"]).is_err());
    }

    #[test]
    fn test_parse_status_and_clean() {
        let cli = Cli::try_parse_from(["shaderbuild", "status", "--target", "out"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { ref layout } if layout.target == Some(PathBuf::from("out"))));

        let cli = Cli::try_parse_from(["shaderbuild", "clean", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Clean { ref layout } if layout.verbose));
    }
}
