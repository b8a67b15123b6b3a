use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use credex::intake::remove_record;
use credex::{
    build_processor, config, init_tracing, CredentialIntake, ExtractionError, ExtractionStore,
    IntakeError, JsonDirStore, MediaKind, PipelineConfig, StoreError,
};

#[derive(Parser, Debug)]
#[command(name = "credex", version, about = "Extract fields from academic credential scans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fields from a file and print them, without storing anything
    Extract {
        file: PathBuf,
        /// Override the type inferred from the file extension
        #[arg(long, value_parser = parse_kind)]
        kind: Option<MediaKind>,
    },
    /// Store a file, extract its fields and save the record
    Ingest { file: PathBuf },
    /// List saved records, newest first
    List,
    /// Print one saved record
    Show { id: Uuid },
    /// Delete a saved record and its stored upload
    Delete { id: Uuid },
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Intake(#[from] IntakeError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Output encoding failed: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Cannot infer file type of {0}; pass --kind")]
    UnknownKind(PathBuf),

    #[error("No record with id {0}")]
    NotFound(Uuid),
}

fn parse_kind(value: &str) -> Result<MediaKind, String> {
    MediaKind::from_extension(value).ok_or_else(|| format!("unsupported file type '{value}'"))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn records() -> Result<JsonDirStore, CliError> {
    Ok(JsonDirStore::open(config::records_dir())?)
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Extract { file, kind } => {
            let kind = kind
                .or_else(|| MediaKind::from_path(&file))
                .ok_or_else(|| CliError::UnknownKind(file.clone()))?;
            let processor = build_processor(&PipelineConfig::from_env())?;
            print_json(&processor.extract_credentials(&file, kind)?)
        }
        Command::Ingest { file } => {
            let processor = build_processor(&PipelineConfig::from_env())?;
            let intake =
                CredentialIntake::new(processor, Box::new(records()?), config::uploads_dir());
            print_json(&intake.ingest(&file)?)
        }
        Command::List => print_json(&records()?.list()?),
        Command::Show { id } => {
            let record = records()?.get(&id)?.ok_or(CliError::NotFound(id))?;
            print_json(&record)
        }
        Command::Delete { id } => {
            if !remove_record(&records()?, &id)? {
                return Err(CliError::NotFound(id));
            }
            tracing::info!(document_id = %id, "Record deleted");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match &e {
                CliError::Extraction(inner) => inner.error_code(),
                CliError::Intake(IntakeError::Extraction(inner)) => inner.error_code(),
                _ => "CLI_ERROR",
            };
            eprintln!("error [{code}]: {e}");
            ExitCode::FAILURE
        }
    }
}
