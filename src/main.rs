use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use monorel::cli::orchestration::{self, ReleaseWorkflowArgs};
use monorel::config::{self, Config};
use monorel::logging::init_logging;
use monorel::release::ReleaseOutcome;
use monorel::ui::formatter;

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELLED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "monorel",
    version,
    about = "Release packages of a monorepo from git tags and conventional commits"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = ".", help = "Package root directory")]
    root: PathBuf,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Release the package
    Release {
        #[arg(
            short = 'p',
            long,
            help = "Pre-release label (alpha, beta, rc, ...) or `stable`"
        )]
        pre_release: Option<String>,

        #[arg(long, help = "Publish packages to the registry after pushing")]
        publish: bool,

        #[arg(short, long, help = "Skip confirmation prompts")]
        yes: bool,
    },

    /// Show floating tags and the changes they need
    Tags {
        #[arg(long, help = "Create, move and delete tags, then push them")]
        apply: bool,
    },

    /// Update floating tags of several repositories in parallel
    UpdateTags {
        #[arg(required = true, help = "Repository directories")]
        repos: Vec<PathBuf>,

        #[arg(short, long, default_value_t = monorel::batch::DEFAULT_JOBS, help = "Worker threads")]
        jobs: usize,

        #[arg(long, help = "Only report pending changes")]
        dry_run: bool,
    },

    /// Print the changelog of unreleased changes
    Changelog {
        #[arg(long, help = "Since the previous stable release")]
        stable: bool,
    },

    /// Publish an existing release to the registry
    Publish {
        #[arg(default_value = "HEAD", help = "Release commit")]
        rev: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match config::load_config(args.config.as_deref(), &args.root) {
        Ok(cfg) => cfg,
        Err(e) => {
            formatter::display_error(&format!("Error loading config: {}", e));
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = init_logging(&config.logging, args.verbose) {
        formatter::display_error(&format!("Failed to initialize logging: {:#}", e));
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(args, &config) {
        Ok(code) => code,
        Err(e) => {
            formatter::display_error(&format!("{:#}", e));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: Args, config: &Config) -> Result<ExitCode> {
    match args.command {
        Command::Release {
            pre_release,
            publish,
            yes,
        } => {
            let workflow = ReleaseWorkflowArgs {
                root: args.root,
                pre_release,
                publish,
                yes,
            };
            match orchestration::run_release(&workflow, config)? {
                ReleaseOutcome::Released(_) => Ok(ExitCode::SUCCESS),
                ReleaseOutcome::Cancelled { .. } => Ok(ExitCode::from(EXIT_CANCELLED)),
            }
        }
        Command::Tags { apply } => {
            orchestration::run_tags(&args.root, config, apply)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::UpdateTags {
            repos,
            jobs,
            dry_run,
        } => {
            let report = orchestration::run_update_tags(&repos, jobs, !dry_run, config)?;
            if report.has_failures() {
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Changelog { stable } => {
            orchestration::run_changelog(&args.root, config, stable)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Publish { rev } => {
            orchestration::run_publish(&args.root, config, &rev)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
