//! Pipeline orchestration.
//!
//! Three concrete pipelines (binary, species, disease) share one linear
//! template: LOAD → EXTRACT FEATURES → VALIDATE → FILTER → BALANCE →
//! EXPORT. The variants differ only in their label column and filter
//! policy, captured by the [`VariantPolicy`] trait; [`run_pipeline`]
//! drives the stages in strict sequence. No state survives across runs —
//! each run produces its own processed record sets.

mod binary;
mod disease;
mod species;

pub use binary::BinaryPipeline;
pub use disease::DiseasePipeline;
pub use species::SpeciesPipeline;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::balance::{self, BalanceDecision, ClassDistribution, DecisionSource};
use crate::config::{OutputLayout, PipelineConfig};
use crate::error::PlantPrepError;
use crate::export::{self, ClassMapping, ExportSummary};
use crate::features::SpeciesLexicon;
use crate::integrity::{self, IntegrityReport};
use crate::loader;
use crate::record::{LabelColumn, RecordSet, Split};

/// The three pipeline variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Binary,
    Species,
    Disease,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] =
        [PipelineKind::Binary, PipelineKind::Species, PipelineKind::Disease];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Binary => "binary",
            PipelineKind::Species => "species",
            PipelineKind::Disease => "disease",
        }
    }

    /// Output subdirectory under the configured base directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            PipelineKind::Binary => "binary",
            PipelineKind::Species => "species",
            PipelineKind::Disease => "diseases",
        }
    }

    /// Builds the variant policy for this kind.
    pub fn policy(&self) -> Box<dyn VariantPolicy> {
        match self {
            PipelineKind::Binary => Box::new(BinaryPipeline),
            PipelineKind::Species => Box::new(SpeciesPipeline),
            PipelineKind::Disease => Box::new(DiseasePipeline),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = PlantPrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(PipelineKind::Binary),
            "species" => Ok(PipelineKind::Species),
            "disease" => Ok(PipelineKind::Disease),
            other => Err(PlantPrepError::UnknownPipeline(other.to_string())),
        }
    }
}

/// Variant-specific policy: the label column and the filter stage.
///
/// Everything else — loading, feature extraction, validation, balancing
/// mechanics, export — is shared by [`run_pipeline`].
pub trait VariantPolicy {
    fn kind(&self) -> PipelineKind;

    /// The field whose distinct values define this pipeline's classes.
    fn label_column(&self) -> LabelColumn;

    /// Applies the variant's record filter (or label synthesis) to both
    /// splits.
    fn filter(
        &self,
        train: &mut RecordSet,
        eval: &mut RecordSet,
        config: &PipelineConfig,
    ) -> FilterReport;
}

/// Outcome of the variant-specific filter stage.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FilterReport {
    pub train_removed: usize,
    pub eval_removed: usize,
    pub train_remaining: usize,
    pub eval_remaining: usize,
    /// Variant-specific details (e.g. which diseases were excluded).
    pub notes: Vec<String>,
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Filtered: train {} remaining ({} removed), eval {} remaining ({} removed)",
            self.train_remaining, self.train_removed, self.eval_remaining, self.eval_removed
        )?;
        for note in &self.notes {
            writeln!(f, "  {note}")?;
        }
        Ok(())
    }
}

/// Balancing outcome recorded in the pipeline report.
#[derive(Clone, Debug, Serialize)]
pub struct BalanceOutcome {
    /// Target applied, or `None` when the natural distribution was kept.
    pub target: Option<usize>,
    pub distribution_before: BTreeMap<String, usize>,
    pub distribution_after: BTreeMap<String, usize>,
}

/// Aggregated counts for one complete pipeline run.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub pipeline: PipelineKind,
    pub train_images_loaded: usize,
    pub eval_images_loaded: usize,
    pub train_integrity: IntegrityReport,
    pub eval_integrity: IntegrityReport,
    pub filter: FilterReport,
    pub balance: BalanceOutcome,
    pub class_count: usize,
    pub train_export: ExportSummary,
    pub eval_export: ExportSummary,
    pub manifest_path: String,
}

/// Runs one pipeline from CSV sources to exported YOLO dataset.
///
/// `quiet` suppresses the per-stage progress output (used for JSON
/// reporting); the balancing decision still goes through `decisions`.
pub fn run_pipeline(
    config: &PipelineConfig,
    policy: &dyn VariantPolicy,
    decisions: &mut dyn DecisionSource,
    quiet: bool,
) -> Result<PipelineReport, PlantPrepError> {
    let kind = policy.kind();
    let column = policy.label_column();
    let stage = |message: &str| {
        if !quiet {
            println!("{message}");
        }
    };

    stage(&format!("== {kind} pipeline =="));

    // LOAD
    let mut train = loader::load_split(&config.train_labels_csv, Split::Train)?;
    let mut eval = loader::load_split(&config.eval_labels_csv, Split::Eval)?;
    let train_images_loaded = train.unique_filenames().len();
    let eval_images_loaded = eval.unique_filenames().len();
    stage(&format!(
        "Loaded {train_images_loaded} train image(s), {eval_images_loaded} eval image(s)"
    ));

    // EXTRACT FEATURES
    let lexicon = SpeciesLexicon::new(config.species.clone());
    lexicon.annotate(&mut train);
    lexicon.annotate(&mut eval);
    stage("Features extracted (species, disease)");

    // VALIDATE
    let train_integrity = integrity::validate_split(&mut train, &config.train_images_dir);
    let eval_integrity = integrity::validate_split(&mut eval, &config.eval_images_dir);
    if !quiet {
        print!("{train_integrity}");
        print!("{eval_integrity}");
    }

    // FILTER (variant-specific)
    let filter = policy.filter(&mut train, &mut eval, config);
    if !quiet {
        print!("{filter}");
    }

    // BALANCE (train only; eval always passes through unchanged)
    let cap_multiplier = config.balance_cap_multipliers.for_pipeline(kind);
    let distribution = ClassDistribution::new(train.distribution(column), cap_multiplier);
    let decision = decisions.choose(&distribution);

    let (train_processed, balance_outcome) = match decision {
        BalanceDecision::Balance { target } => {
            let balanced = balance::balance(&train, column, target);
            stage(&format!(
                "Balanced training split to {target} sample(s) per class ({} total)",
                balanced.len()
            ));
            let after = balanced.distribution(column);
            (
                balanced,
                BalanceOutcome {
                    target: Some(target),
                    distribution_before: distribution.counts.clone(),
                    distribution_after: after,
                },
            )
        }
        BalanceDecision::KeepNatural => {
            stage("Keeping natural distribution (no balancing)");
            (
                train,
                BalanceOutcome {
                    target: None,
                    distribution_before: distribution.counts.clone(),
                    distribution_after: distribution.counts.clone(),
                },
            )
        }
    };

    // EXPORT — the mapping comes from the processed training split and is
    // reused for eval so the two splits agree on label indices.
    let mapping = ClassMapping::from_records(&train_processed, column);
    let layout = config.output_layout(kind);

    let train_export = export::export_split(
        &train_processed,
        &config.train_images_dir,
        &layout.images_train,
        &layout.labels_train,
        &mapping,
        column,
    )?;
    let eval_export = export::export_split(
        &eval,
        &config.eval_images_dir,
        &layout.images_val,
        &layout.labels_val,
        &mapping,
        column,
    )?;
    if !quiet {
        print!("Train export: {train_export}");
        print!("Eval export: {eval_export}");
    }

    let manifest_path = export::write_manifest(
        &layout.base_dir,
        &mapping,
        OutputLayout::TRAIN_SUBPATH,
        OutputLayout::VAL_SUBPATH,
    )?;
    stage(&format!("Manifest written: {}", manifest_path.display()));

    Ok(PipelineReport {
        pipeline: kind,
        train_images_loaded,
        eval_images_loaded,
        train_integrity,
        eval_integrity,
        filter,
        balance: balance_outcome,
        class_count: mapping.len(),
        train_export,
        eval_export,
        manifest_path: manifest_path.to_string_lossy().into_owned(),
    })
}
