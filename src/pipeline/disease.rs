//! Disease pipeline: classify by disease, diseased records only.
//!
//! Healthy records are dropped first. Diseases are then excluded when
//! their training-set frequency falls below the configured rarity
//! threshold or their name appears on the manual exclusion list; the two
//! sources are combined into one set so overlap produces no duplicate
//! exclusions. The training-set frequencies govern both splits.

use std::collections::BTreeSet;

use crate::config::PipelineConfig;
use crate::record::{LabelColumn, RecordSet};

use super::{FilterReport, PipelineKind, VariantPolicy};

pub struct DiseasePipeline;

impl VariantPolicy for DiseasePipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Disease
    }

    fn label_column(&self) -> LabelColumn {
        LabelColumn::Disease
    }

    fn filter(
        &self,
        train: &mut RecordSet,
        eval: &mut RecordSet,
        config: &PipelineConfig,
    ) -> FilterReport {
        let mut train_removed = train.retain(|r| r.disease.as_deref() != Some("healthy"));
        let mut eval_removed = eval.retain(|r| r.disease.as_deref() != Some("healthy"));

        let excluded = combined_exclusions(train, config);

        train_removed += train.retain(|r| match r.disease.as_deref() {
            Some(disease) => !excluded.contains(disease),
            None => false,
        });
        eval_removed += eval.retain(|r| match r.disease.as_deref() {
            Some(disease) => !excluded.contains(disease),
            None => false,
        });

        let mut notes = Vec::new();
        if !excluded.is_empty() {
            notes.push(format!(
                "excluded diseases: {}",
                excluded.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }

        FilterReport {
            train_removed,
            eval_removed,
            train_remaining: train.len(),
            eval_remaining: eval.len(),
            notes,
        }
    }
}

/// Union of rarity-excluded diseases (training-set frequency below the
/// threshold) and the manually excluded names. A disease present in both
/// appears once.
pub fn combined_exclusions(train: &RecordSet, config: &PipelineConfig) -> BTreeSet<String> {
    let distribution = train.distribution(LabelColumn::Disease);
    let total: usize = distribution.values().sum();

    let mut excluded: BTreeSet<String> = if total > 0 {
        distribution
            .into_iter()
            .filter(|(_, count)| (*count as f64 / total as f64) < config.rare_disease_threshold)
            .map(|(disease, _)| disease)
            .collect()
    } else {
        BTreeSet::new()
    };

    excluded.extend(config.excluded_diseases.iter().cloned());
    excluded
}
