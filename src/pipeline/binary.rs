//! Binary pipeline: healthy (0) vs diseased (1).

use crate::config::PipelineConfig;
use crate::record::{LabelColumn, RecordSet};

use super::{FilterReport, PipelineKind, VariantPolicy};

/// Keeps every record and synthesizes the 0/1 label from the derived
/// disease field.
pub struct BinaryPipeline;

impl VariantPolicy for BinaryPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Binary
    }

    fn label_column(&self) -> LabelColumn {
        LabelColumn::Binary
    }

    fn filter(
        &self,
        train: &mut RecordSet,
        eval: &mut RecordSet,
        _config: &PipelineConfig,
    ) -> FilterReport {
        synthesize_binary_labels(train);
        synthesize_binary_labels(eval);

        let healthy = train
            .records
            .iter()
            .filter(|r| r.binary_class == Some(0))
            .count();

        FilterReport {
            train_removed: 0,
            eval_removed: 0,
            train_remaining: train.len(),
            eval_remaining: eval.len(),
            notes: vec![format!(
                "training labels: {healthy} healthy, {} diseased",
                train.len() - healthy
            )],
        }
    }
}

fn synthesize_binary_labels(set: &mut RecordSet) {
    for record in &mut set.records {
        let healthy = record.disease.as_deref() == Some("healthy");
        record.binary_class = Some(if healthy { 0 } else { 1 });
    }
}
