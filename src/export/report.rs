//! Export summary for one split.

use std::fmt;

use serde::Serialize;

/// One filename group that could not be exported.
#[derive(Clone, Debug, Serialize)]
pub struct ExportFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of exporting one split.
///
/// Every distinct filename in the input is accounted for:
/// `exported + skipped() == distinct filenames`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportSummary {
    /// Image groups fully materialized (image copied and label written).
    pub exported: usize,

    /// Image groups skipped, with the reason for each.
    pub failures: Vec<ExportFailure>,
}

impl ExportSummary {
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn record_failure(&mut self, filename: &str, reason: impl Into<String>) {
        self.failures.push(ExportFailure {
            filename: filename.to_string(),
            reason: reason.into(),
        });
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} image(s), skipped {}",
            self.exported,
            self.skipped()
        )?;
        for failure in &self.failures {
            writeln!(f, "  skipped {}: {}", failure.filename, failure.reason)?;
        }
        Ok(())
    }
}
