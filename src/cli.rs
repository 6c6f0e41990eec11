//! Command-line interface implementation

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::build::{BuildError, ProjectBuild};
use crate::config::loader::{find_config, load_config, merge_cli_overrides, project_root, CliOverrides};
use crate::config::{default_config, ConfigError, FrontpipeConfig};
use crate::emit::{disable_fail_fast, enable_fail_fast};

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// frontpipe - Run front-end build tasks declared in frontpipe.toml
#[derive(Parser)]
#[command(name = "fpipe")]
#[command(about = "frontpipe - Run front-end build tasks declared in frontpipe.toml")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Path to frontpipe.toml (default: search upward from the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only run this task (repeatable)
    #[arg(short, long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Override the source directory
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Override the output directory
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build once; the first compile error fails the build
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Number of tasks run concurrently
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Rebuild on change; errors are reported and watching continues
    Watch {
        #[command(flatten)]
        project: ProjectArgs,

        /// Debounce delay in milliseconds
        #[arg(long)]
        debounce: Option<u32>,
    },

    /// Show the stages each task would run, without building
    Plan {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { project, jobs } => {
            crate::logging::init(project.verbose);
            run_build(&project, jobs)
        }
        Commands::Watch { project, debounce } => {
            crate::logging::init(project.verbose);
            run_watch(&project, debounce)
        }
        Commands::Plan { project } => {
            crate::logging::init(project.verbose);
            run_plan(&project)
        }
    }
}

/// Load the config and find the project root.
fn load_project(args: &ProjectArgs, overrides: CliOverrides) -> Result<(FrontpipeConfig, PathBuf), ConfigError> {
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config(),
    };

    let (mut config, root) = match config_path {
        Some(path) => {
            if args.verbose {
                println!("Using config: {}", path.display());
            }
            let config = load_config(Some(&path))?;
            let root = project_root(&path)?;
            (config, root)
        }
        None => {
            if args.verbose {
                println!("No frontpipe.toml found, using defaults");
            }
            (default_config(), std::env::current_dir()?)
        }
    };

    let overrides = CliOverrides { out: args.out.clone(), src: args.src.clone(), ..overrides };
    merge_cli_overrides(&mut config, &overrides);
    Ok((config, root))
}

fn exit_for_build_error(error: &BuildError) -> ExitCode {
    eprintln!("Error: {}", error);
    match error {
        BuildError::Config(_) | BuildError::Discovery(_) => ExitCode::from(EXIT_INVALID_ARGS),
        _ => ExitCode::from(EXIT_ERROR),
    }
}

/// Execute the build command
fn run_build(args: &ProjectArgs, jobs: Option<usize>) -> ExitCode {
    let (config, root) = match load_project(args, CliOverrides { jobs, ..Default::default() }) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    if config.tasks.is_empty() {
        eprintln!("Error: No tasks configured in {}", root.join(crate::config::CONFIG_FILE_NAME).display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    enable_fail_fast();
    let build = ProjectBuild::new(config, root).with_filter(args.tasks.clone());

    match build.run() {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                ExitCode::from(EXIT_SUCCESS)
            } else {
                eprintln!("{}", result.summary());
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => exit_for_build_error(&e),
    }
}

/// Execute the watch command
fn run_watch(args: &ProjectArgs, debounce: Option<u32>) -> ExitCode {
    let overrides = CliOverrides { debounce_ms: debounce, ..Default::default() };
    let (config, root) = match load_project(args, overrides) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    disable_fail_fast();
    let build = ProjectBuild::new(config, root).with_filter(args.tasks.clone());
    if let Err(e) = build.selected_tasks() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    println!("Starting watch mode...");
    println!("Press Ctrl+C to stop");
    println!();

    match crate::watch::watch_and_rebuild(build) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Execute the plan command
fn run_plan(args: &ProjectArgs) -> ExitCode {
    let (config, root) = match load_project(args, CliOverrides::default()) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let src_dir = root.join(&config.project.src);
    let build = ProjectBuild::new(config, &root).with_filter(args.tasks.clone());

    match build.plan() {
        Ok(plan) => {
            println!("Project: {}", build.config().project.name);
            println!("  Source: {}", display_relative(&src_dir, &root));
            for task in &plan {
                println!("  - {}", task);
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => exit_for_build_error(&e),
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
