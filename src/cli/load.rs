//! Load command: reapply grids saved in a document

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use crate::batch::replay_records;
use crate::config::CgridConfig;
use crate::consistency::{self, Decision, MismatchReason};
use crate::history::timestamp_now;
use crate::models::{GridRecord, ImageSource};
use crate::xml::{self, SchemaVersion};

use super::{
    apply, open_image, CalibrationArgs, RenderArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS,
};

/// Execute the load command
pub fn run_load(
    config: &CgridConfig,
    document_path: &Path,
    image_path: &Path,
    schema_version: Option<SchemaVersion>,
    yes: bool,
    calibration: &CalibrationArgs,
    render: &RenderArgs,
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
    let records = match decoded {
        Ok(records) if records.is_empty() => {
            eprintln!("Error: '{}' contains no grids", document_path.display());
            return ExitCode::from(EXIT_ERROR);
        }
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let info = match open_image(
        image_path,
        config.calibration.to_calibration(),
        calibration.title.as_deref(),
    ) {
        Ok(info) => info,
        Err(code) => return code,
    };

    // Records in one document share title and unit; checking the first covers all.
    let report = consistency::check(&records[0], info.title(), &config.calibration.unit);
    let decision = config.consistency.policy.decide(&report, |reasons| yes || confirm(reasons));
    if decision == Decision::Abort {
        for reason in report.reasons() {
            eprintln!("Error: {}", reason);
        }
        eprintln!("Error: grid not applied");
        return ExitCode::from(EXIT_ERROR);
    }

    let grids = match replay_records(&records, &info) {
        Ok(grids) => grids,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let timestamp = timestamp_now();
    let applied: Vec<GridRecord> = records
        .iter()
        .map(|record| GridRecord {
            timestamp: timestamp.clone(),
            image_title: info.title().to_string(),
            unit: config.calibration.unit.clone(),
            ..record.clone()
        })
        .collect();

    match apply::finish(config, image_path, &info, &grids, &applied, render) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(code) => code,
    }
}

/// Ask on the terminal whether to apply a mismatched grid. Without a
/// terminal on stdin the answer is no.
fn confirm(reasons: &[MismatchReason]) -> bool {
    if !atty::is(atty::Stream::Stdin) {
        return false;
    }
    for reason in reasons {
        eprintln!("Warning: {}", reason);
    }
    eprint!("Apply anyway? [y/N] ");
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes" | "Yes")
}
