//! Species pipeline: classify by plant species, healthy or not.

use crate::config::PipelineConfig;
use crate::record::{LabelColumn, RecordSet};

use super::{FilterReport, PipelineKind, VariantPolicy};

/// Drops records whose class label matched no known species.
pub struct SpeciesPipeline;

impl VariantPolicy for SpeciesPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Species
    }

    fn label_column(&self) -> LabelColumn {
        LabelColumn::Species
    }

    fn filter(
        &self,
        train: &mut RecordSet,
        eval: &mut RecordSet,
        _config: &PipelineConfig,
    ) -> FilterReport {
        let train_removed = train.retain(|record| record.species.is_some());
        let eval_removed = eval.retain(|record| record.species.is_some());

        FilterReport {
            train_removed,
            eval_removed,
            train_remaining: train.len(),
            eval_remaining: eval.len(),
            notes: vec![],
        }
    }
}
