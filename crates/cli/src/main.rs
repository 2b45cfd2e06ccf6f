// capsync - sync ticket dump exports into the capacity tracker workbook

mod console;
mod exit_codes;
mod generate;
mod project;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use capsync_recon::SyncError;
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{sync_exit_code, EXIT_SUCCESS};
use project::Project;

#[derive(Parser)]
#[command(name = "capsync")]
#[command(about = "Sync dump exports into a multi-sheet capacity tracker (headless)")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file [default: ./capsync.toml if present, else the built-in sources]
    #[arg(long, global = true, env = "CAPSYNC_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every dump into its destination sheet and save the tracker
    #[command(after_help = "\
Examples:
  capsync run
  capsync run --check
  capsync --config tracker.toml run --json --today 2024-06-01")]
    Run {
        /// Compare and count only; never write the destination
        #[arg(long, short = 'c')]
        check: bool,

        /// Print the session summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Reference day for stale-date highlighting [default: local date]
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
    },

    /// Overwrite every dump and destination sheet with random test data
    #[command(after_help = "\
Examples:
  capsync generate 25
  capsync generate 100 --yes")]
    Generate {
        /// Data rows to generate per sheet
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        rows: u32,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Anchor day for generated dates [default: local date]
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
    },

    /// Parse and validate the config, then list the sources
    Validate,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    let result = Project::discover(cli.config.as_deref()).and_then(|project| {
        log::info!(
            "config: {} ({} sources)",
            project.source_label(),
            project.config.sources.len()
        );
        match cli.command {
            None => run::cmd_run(&project, false, false, None),
            Some(Commands::Run { check, json, today }) => run::cmd_run(&project, check, json, today),
            Some(Commands::Generate { rows, yes, today }) => {
                generate::cmd_generate(&project, rows as usize, yes, today)
            }
            Some(Commands::Validate) => cmd_validate(&project),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: exit_codes::EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: exit_codes::EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: exit_codes::EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        let hint = match &err {
            SyncError::ConfigParse(_) | SyncError::ConfigValidation(_) => {
                Some("run `capsync validate` after fixing the config".to_string())
            }
            SyncError::MissingSheet { sheet, .. } => {
                Some(format!("add a sheet named '{sheet}' or fix the config"))
            }
            SyncError::DuplicateKeys { .. } => {
                Some("remove the duplicate keys listed above and run again".to_string())
            }
            SyncError::Io(_) => None,
        };
        Self { code: sync_exit_code(&err), message: err.to_string(), hint }
    }
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(project: &Project) -> Result<(), CliError> {
    let config = &project.config;
    project.config.validate()?;

    println!("config:      {}", project.source_label());
    println!("name:        {}", config.name);
    println!("destination: {}", project.resolve(&config.destination).display());
    if let Some(open) = &config.open_sheet {
        println!("open sheet:  {}", open);
    }
    println!("date fields: {}", config.date_fields.join(", "));
    println!("sources:");
    for (i, source) in config.sources.iter().enumerate() {
        println!(
            "  {}. {} -> '{}' [{}]",
            i + 1,
            project.resolve(&source.file).display(),
            source.sheet,
            source.key_prefix()
        );
    }
    Ok(())
}
