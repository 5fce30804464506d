use std::path::PathBuf;
use thiserror::Error;

/// The main error type for plantprep operations.
///
/// Structural problems (unreadable sources, missing columns, bad config)
/// are fatal and abort a pipeline run. Record-level problems (a missing
/// image, degenerate geometry) are absorbed by the stages that encounter
/// them and surface only as counts in the stage reports.
#[derive(Debug, Error)]
pub enum PlantPrepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Annotation source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to parse annotation CSV {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Annotation CSV {path} is missing required column(s): {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write dataset manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown pipeline: {0} (supported: binary, species, disease)")]
    UnknownPipeline(String),

    #[error("Class '{label}' is not present in the class mapping")]
    UnknownClass { label: String },

    #[error("Degenerate geometry for '{filename}': {detail}")]
    DegenerateGeometry { filename: String, detail: String },

    #[error("Invalid balance target {target}: {reason}")]
    InvalidBalanceTarget { target: i64, reason: String },
}
