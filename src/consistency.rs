//! Consistency check between a saved grid record and the current image
//!
//! A mismatch is a warning, not a failure. What happens next is decided by a
//! [`MismatchPolicy`].

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::GridRecord;

/// Title prefix used by the companion cell-counting window.
pub const COUNTER_WINDOW_PREFIX: &str = "Counter Window - ";

/// Drop the counting-window prefix from a title, if present.
pub fn strip_counter_prefix(title: &str) -> &str {
    title.strip_prefix(COUNTER_WINDOW_PREFIX).unwrap_or(title)
}

/// Why a record does not match the current image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    ImageTitle { expected: String, found: String },
    Unit { expected: String, found: String },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::ImageTitle { expected, found } => {
                write!(f, "grid was saved for image '{}', current image is '{}'", expected, found)
            }
            MismatchReason::Unit { expected, found } => {
                write!(f, "grid was saved in unit '{}', current image uses '{}'", expected, found)
            }
        }
    }
}

/// Outcome of [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
    Consistent,
    Mismatch { reasons: Vec<MismatchReason> },
}

impl Consistency {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Consistency::Consistent)
    }

    pub fn reasons(&self) -> &[MismatchReason] {
        match self {
            Consistency::Consistent => &[],
            Consistency::Mismatch { reasons } => reasons,
        }
    }
}

/// Compare a record's image title and unit with the current image.
///
/// Both reasons are collected independently. Titles are compared with the
/// counting-window prefix removed on either side; a record without a title
/// only has its unit checked.
pub fn check(record: &GridRecord, current_title: &str, current_unit: &str) -> Consistency {
    let mut reasons = Vec::new();

    let expected = strip_counter_prefix(&record.image_title);
    let found = strip_counter_prefix(current_title);
    if !expected.is_empty() && expected != found {
        reasons.push(MismatchReason::ImageTitle {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }

    if record.unit != current_unit {
        reasons.push(MismatchReason::Unit {
            expected: record.unit.clone(),
            found: current_unit.to_string(),
        });
    }

    if reasons.is_empty() {
        Consistency::Consistent
    } else {
        Consistency::Mismatch { reasons }
    }
}

/// What to do when a loaded grid does not match the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchPolicy {
    /// Report the mismatch and apply only if the caller confirms.
    #[default]
    WarnAndConfirm,
    /// Report the mismatch and apply anyway.
    Proceed,
    /// Refuse to apply.
    Block,
}

/// Whether the caller should go on applying the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Abort,
}

impl MismatchPolicy {
    /// Decide on a consistency result. `confirm` is asked only under
    /// [`MismatchPolicy::WarnAndConfirm`] and only when there is a mismatch.
    pub fn decide<F>(self, consistency: &Consistency, confirm: F) -> Decision
    where
        F: FnOnce(&[MismatchReason]) -> bool,
    {
        let reasons = consistency.reasons();
        if reasons.is_empty() {
            return Decision::Apply;
        }
        for reason in reasons {
            warn!("{}", reason);
        }
        match self {
            MismatchPolicy::Proceed => Decision::Apply,
            MismatchPolicy::Block => Decision::Abort,
            MismatchPolicy::WarnAndConfirm => {
                if confirm(reasons) {
                    Decision::Apply
                } else {
                    Decision::Abort
                }
            }
        }
    }
}
