//! History command implementations (export, import)

use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::CgridConfig;
use crate::history::{append_to_file, HistoryLog};
use crate::output::{document_file_name, write_text};
use crate::xml::{self, SchemaVersion};

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Save the most recent batch of a history file as an XML document
    Export {
        /// History file (tab-separated)
        history: PathBuf,

        /// Output document (file or directory)
        #[arg(long)]
        xml: PathBuf,

        /// Document layout: 1 or 2 (default from cgrid.toml)
        #[arg(long)]
        schema: Option<SchemaVersion>,
    },
    /// Print the grids of an XML document as history rows
    Import {
        /// Saved grid document
        document: PathBuf,

        /// Read a document that does not declare its layout as this version
        #[arg(long)]
        schema_version: Option<SchemaVersion>,

        /// Append the rows to this history file instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Execute a history subcommand
pub fn run_history(config: &CgridConfig, action: HistoryAction) -> ExitCode {
    match action {
        HistoryAction::Export { history, xml, schema } => {
            run_export(&history, &xml, schema.unwrap_or(config.output.schema))
        }
        HistoryAction::Import { document, schema_version, output } => {
            run_import(&document, schema_version, output.as_deref())
        }
    }
}

fn run_export(history_path: &Path, xml_path: &Path, schema: SchemaVersion) -> ExitCode {
    let log = match HistoryLog::load(history_path) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error: Cannot read history '{}': {}", history_path.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let document = match log.to_document(schema) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let path = match log.latest_batch().first() {
        Some(record) if xml_path.is_dir() => xml_path.join(document_file_name(&record.image_title)),
        _ => xml_path.to_path_buf(),
    };
    if let Err(e) = write_text(&path, &document) {
        eprintln!("Error: Failed to save '{}': {}", path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }
    println!("Saved: {} ({} grid(s))", path.display(), log.latest_batch().len());
    ExitCode::from(EXIT_SUCCESS)
}

fn run_import(
    document_path: &Path,
    schema_version: Option<SchemaVersion>,
    output: Option<&Path>,
) -> ExitCode {
    let text = match std::fs::read_to_string(document_path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: Cannot open document '{}': {}", document_path.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let decoded = match schema_version {
        Some(version) => xml::decode_as(&text, version),
        None => xml::decode(&text),
    };
    let log = match decoded {
        Ok(records) => HistoryLog::from_records(records),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = append_to_file(path, log.records()) {
                eprintln!("Error: Failed to append history '{}': {}", path.display(), e);
                return ExitCode::from(EXIT_ERROR);
            }
            println!("Appended {} row(s) to {}", log.len(), path.display());
        }
        None => print!("{}", log.to_tsv()),
    }
    ExitCode::from(EXIT_SUCCESS)
}
