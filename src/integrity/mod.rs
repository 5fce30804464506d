//! Data integrity validation against the filesystem.
//!
//! Two passes per split, in a fixed order:
//!
//! 1. *Dimension repair*: records claiming zero width or height get their
//!    dimensions re-read from the image file on disk. Images that cannot
//!    be read leave the record untouched; such records are dropped
//!    afterwards so export never divides by zero.
//! 2. *Existence filter*: records whose image file is missing are
//!    dropped, and the removed unique filenames are reported.
//!
//! Repair must run before the existence filter so repaired images are
//! judged on their actual state, not stale dimensions.

mod report;

pub use report::IntegrityReport;

use std::collections::BTreeSet;
use std::path::Path;

use crate::record::RecordSet;

/// Validates and repairs one split in place.
pub fn validate_split(set: &mut RecordSet, images_dir: &Path) -> IntegrityReport {
    let repaired = repair_zero_dimensions(set, images_dir);

    let removed_files = filter_missing_images(set, images_dir);

    // Records that exist on disk but could not be repaired (unreadable
    // image data) would divide by zero at export time.
    let dropped_zero_dimension = set.retain(|record| !record.has_zero_dimension());

    IntegrityReport {
        split: set.split,
        repaired,
        dropped_zero_dimension,
        removed_files,
        remaining_images: set.unique_filenames().len(),
    }
}

/// Pass 1: overwrite zero dimensions with the actual image size.
fn repair_zero_dimensions(set: &mut RecordSet, images_dir: &Path) -> usize {
    let mut repaired = 0;

    for record in &mut set.records {
        if !record.has_zero_dimension() {
            continue;
        }

        let image_path = images_dir.join(&record.filename);
        if let Ok(size) = imagesize::size(&image_path) {
            record.width = size.width as u32;
            record.height = size.height as u32;
            repaired += 1;
        }
    }

    repaired
}

/// Pass 2: drop records whose image file does not exist; returns the
/// removed unique filenames.
fn filter_missing_images(set: &mut RecordSet, images_dir: &Path) -> Vec<String> {
    let before: BTreeSet<String> = set
        .unique_filenames()
        .into_iter()
        .map(String::from)
        .collect();

    set.retain(|record| images_dir.join(&record.filename).is_file());

    let after = set.unique_filenames();
    before
        .into_iter()
        .filter(|name| !after.contains(name.as_str()))
        .collect()
}
