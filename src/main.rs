use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use semver_store::config::load_config;
use semver_store::{ui, BumpSpec, SemanticVersion, StoreError, StoreFactory};

/// Exit status for failures that may succeed when retried (EX_TEMPFAIL)
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Parser)]
#[command(
    name = "semver-store",
    version,
    about = "Check, bump and set a semantic version shared across builds"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the stored version, or nothing if it is not newer than --since
    Check {
        #[arg(long, help = "Only report versions strictly greater than this one")]
        since: Option<String>,
    },
    /// Bump the stored version and print the result
    Bump {
        #[arg(help = "major, minor, patch or final")]
        bump: Option<String>,

        #[arg(long, help = "Prerelease identifier to apply after the bump, e.g. rc")]
        pre: Option<String>,

        #[arg(long, help = "Apply --pre without a numeric counter")]
        pre_without_version: bool,
    },
    /// Store exactly this version
    Set { version: String },
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<StoreError>() {
            Some(store_err) => {
                ui::display_store_error(store_err);
                if store_err.is_retriable() {
                    ExitCode::from(EXIT_TEMPFAIL)
                } else {
                    ExitCode::FAILURE
                }
            }
            None => {
                ui::display_error(&format!("{:#}", err));
                ExitCode::FAILURE
            }
        },
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let store = StoreFactory::new().build(&config)?;

    match args.command {
        Command::Check { since } => {
            let since = since
                .as_deref()
                .map(SemanticVersion::parse)
                .transpose()
                .map_err(StoreError::from)?;
            let versions = store.check(since.as_ref())?;
            ui::display_versions(&versions);
        }
        Command::Bump {
            bump,
            pre,
            pre_without_version,
        } => {
            let bump = BumpSpec::from_params(bump.as_deref(), pre.as_deref(), pre_without_version)
                .map_err(StoreError::from)?;
            ui::display_status(&format!("Bumping ({})", bump));
            let version = store.bump(&bump)?;
            ui::display_versions(&[version.clone()]);
            ui::display_success(&format!("Stored {}", version));
        }
        Command::Set { version } => {
            let version = SemanticVersion::parse(&version).map_err(StoreError::from)?;
            store.set(&version)?;
            ui::display_versions(&[version.clone()]);
            ui::display_success(&format!("Stored {}", version));
        }
    }

    Ok(())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("SEMVER_STORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs share stderr with the status lines; stdout carries only versions.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
