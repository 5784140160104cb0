//! Portcullis CLI - InSpec profile to Ansible collection converter
//!
//! Loads a profile directory, runs the conversion pipeline, and either
//! publishes the generated collection (`convert`) or reports what the
//! parser found (`inspect`). Exits non-zero on fatal conditions or when
//! the untranslatable-resource count exceeds the configured tolerance.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod error;
mod load;
mod output;

use error::{CliError, Result};
use portcullis::{Converter, Packager};

/// Portcullis - Compliance Profile Conversion Tool
#[derive(Parser)]
#[command(name = "portcullis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a profile into an Ansible collection
    Convert {
        /// Profile directory (inspec.yml, controls/, libraries/)
        #[arg(short, long)]
        profile: PathBuf,

        /// Output directory for the generated collection (must not exist)
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum tolerated untranslatable resources before a non-zero exit
        #[arg(long, default_value_t = 0)]
        tolerance: usize,

        /// Collection namespace
        #[arg(long, default_value = "portcullis")]
        namespace: String,

        /// Emit the translation summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a profile and report controls and diagnostics without emitting
    /// anything
    Inspect {
        /// Profile directory
        #[arg(short, long)]
        profile: PathBuf,

        /// Emit the translation summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("portcullis=debug")
        } else {
            tracing_subscriber::EnvFilter::new("portcullis=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Convert {
            profile,
            output,
            tolerance,
            namespace,
            json,
        } => convert(profile, output, tolerance, namespace, json),
        Commands::Inspect { profile, json } => inspect(profile, json),
    }
}

fn convert(
    profile_dir: PathBuf,
    output_dir: PathBuf,
    tolerance: usize,
    namespace: String,
    json: bool,
) -> Result<()> {
    let sources = load::load_profile(&profile_dir)?;
    let profile_name = sources.metadata.name.clone();

    let conversion = Converter::new()
        .with_namespace(namespace)
        .convert(&sources)?;

    Packager::new().write(&conversion.collection, &output_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversion.summary)?);
    } else {
        output::print_summary(&profile_name, &conversion.summary);
        output::success(&format!(
            "Collection written to {}",
            output_dir.display()
        ));
    }

    let untranslatable = conversion.summary.untranslatable_count();
    if untranslatable > tolerance {
        return Err(CliError::ToleranceExceeded {
            count: untranslatable,
            tolerance,
        });
    }
    Ok(())
}

fn inspect(profile_dir: PathBuf, json: bool) -> Result<()> {
    let sources = load::load_profile(&profile_dir)?;
    let profile_name = sources.metadata.name.clone();

    // Run the pipeline but publish nothing; an empty collection is still a
    // useful finding here rather than a hard failure.
    match Converter::new().convert(&sources) {
        Ok(conversion) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&conversion.summary)?);
            } else {
                output::print_summary(&profile_name, &conversion.summary);
            }
            Ok(())
        }
        Err(portcullis::ConvertError::EmptyCollection { controls_total }) => {
            output::warning(&format!(
                "{} control(s) parsed, none translatable",
                controls_total
            ));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
