//! Integrity report for one validated split.

use std::fmt;

use serde::Serialize;

use crate::record::Split;

/// Outcome of validating one split against its image directory.
#[derive(Clone, Debug, Serialize)]
pub struct IntegrityReport {
    /// Which split was validated.
    #[serde(serialize_with = "serialize_split")]
    pub split: Split,

    /// Records whose zero dimensions were repaired from the image file.
    pub repaired: usize,

    /// Records dropped because their dimensions stayed at zero after the
    /// repair pass.
    pub dropped_zero_dimension: usize,

    /// Unique filenames dropped because the image file does not exist.
    pub removed_files: Vec<String>,

    /// Unique images remaining after validation.
    pub remaining_images: usize,
}

fn serialize_split<S: serde::Serializer>(split: &Split, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_str(split.as_str())
}

impl IntegrityReport {
    pub fn removed_count(&self) -> usize {
        self.removed_files.len()
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validated {} split: {} image(s) remaining",
            self.split, self.remaining_images
        )?;

        if self.repaired > 0 {
            writeln!(f, "  repaired {} record(s) with zero dimensions", self.repaired)?;
        }
        if self.dropped_zero_dimension > 0 {
            writeln!(
                f,
                "  dropped {} record(s) with unrepairable dimensions",
                self.dropped_zero_dimension
            )?;
        }
        if !self.removed_files.is_empty() {
            writeln!(f, "  removed {} image(s) with missing files:", self.removed_files.len())?;
            for name in &self.removed_files {
                writeln!(f, "    {name}")?;
            }
        }

        Ok(())
    }
}
