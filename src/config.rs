//! Pipeline configuration.
//!
//! All paths, the species lexicon, and the filtering/balancing knobs come
//! from one YAML file, deserialized into an immutable [`PipelineConfig`]
//! that is threaded explicitly through the pipeline. Core logic never
//! reads ambient environment state.
//!
//! ```yaml
//! train_labels_csv: data/train_labels.csv
//! eval_labels_csv: data/test_labels.csv
//! train_images_dir: data/TRAIN
//! eval_images_dir: data/TEST
//! output_dir: dataset
//! species:
//!   - Tomato
//!   - Apple
//! rare_disease_threshold: 0.001
//! excluded_diseases: [Blight, Mold]
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PlantPrepError;
use crate::pipeline::PipelineKind;

fn default_rare_disease_threshold() -> f64 {
    0.001
}

fn default_excluded_diseases() -> Vec<String> {
    ["Blight", "Mold", "Spot", "Black Rot", "Gray Spot"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Central configuration for all pipelines.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Training annotation CSV.
    pub train_labels_csv: PathBuf,

    /// Evaluation annotation CSV.
    pub eval_labels_csv: PathBuf,

    /// Directory holding the training images.
    pub train_images_dir: PathBuf,

    /// Directory holding the evaluation images.
    pub eval_images_dir: PathBuf,

    /// Base directory the exported datasets are written under; each
    /// pipeline gets its own subdirectory.
    pub output_dir: PathBuf,

    /// Known plant species, in match-priority order.
    pub species: Vec<String>,

    /// Diseases whose training-set frequency falls below this fraction
    /// are dropped by the disease pipeline.
    #[serde(default = "default_rare_disease_threshold")]
    pub rare_disease_threshold: f64,

    /// Diseases always dropped by the disease pipeline.
    #[serde(default = "default_excluded_diseases")]
    pub excluded_diseases: Vec<String>,

    /// Per-pipeline multipliers for the balance-target cap.
    #[serde(default)]
    pub balance_cap_multipliers: BalanceCapMultipliers,
}

/// The balance-target cap is `smallest class count × multiplier`; targets
/// above it require explicit confirmation.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceCapMultipliers {
    #[serde(default = "one")]
    pub binary: usize,
    #[serde(default = "two")]
    pub species: usize,
    #[serde(default = "two")]
    pub disease: usize,
}

fn one() -> usize {
    1
}

fn two() -> usize {
    2
}

impl Default for BalanceCapMultipliers {
    fn default() -> Self {
        Self {
            binary: 1,
            species: 2,
            disease: 2,
        }
    }
}

impl BalanceCapMultipliers {
    pub fn for_pipeline(&self, kind: PipelineKind) -> usize {
        match kind {
            PipelineKind::Binary => self.binary,
            PipelineKind::Species => self.species,
            PipelineKind::Disease => self.disease,
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration from a YAML file and resolves relative
    /// paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self, PlantPrepError> {
        let data = fs::read_to_string(path).map_err(|source| PlantPrepError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: PipelineConfig =
            serde_yaml::from_str(&data).map_err(|source| PlantPrepError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.train_labels_csv,
            &mut self.eval_labels_csv,
            &mut self.train_images_dir,
            &mut self.eval_images_dir,
            &mut self.output_dir,
        ] {
            if path.is_relative() {
                let resolved = base.join(path.as_path());
                *path = resolved;
            }
        }
    }

    /// Output layout for one pipeline's exported dataset.
    pub fn output_layout(&self, kind: PipelineKind) -> OutputLayout {
        let base_dir = self.output_dir.join(kind.dir_name());
        OutputLayout {
            images_train: base_dir.join("images").join("train"),
            images_val: base_dir.join("images").join("val"),
            labels_train: base_dir.join("labels").join("train"),
            labels_val: base_dir.join("labels").join("val"),
            base_dir,
        }
    }
}

/// Resolved output directories for one exported dataset.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    pub base_dir: PathBuf,
    pub images_train: PathBuf,
    pub images_val: PathBuf,
    pub labels_train: PathBuf,
    pub labels_val: PathBuf,
}

impl OutputLayout {
    /// Relative image subpaths recorded in the dataset manifest.
    pub const TRAIN_SUBPATH: &'static str = "images/train";
    pub const VAL_SUBPATH: &'static str = "images/val";
}
