//! Core annotation model shared by every pipeline stage.
//!
//! The stages communicate exclusively through [`RecordSet`]s: one per
//! split, each holding one [`AnnotationRecord`] per (image, bounding box)
//! pair. Derived classification fields (`species`, `disease`,
//! `binary_class`) start out unset and are populated as records move
//! through the pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One annotated bounding box for one image.
///
/// `filename` is not unique: an image with several boxes appears as
/// several records sharing the same filename.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Image filename, relative to the split's image directory.
    pub filename: String,

    /// Cleaned free-text class label (e.g. "Tomato Blight").
    #[serde(rename = "class")]
    pub class_label: String,

    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,

    /// Source image width in pixels. May be 0 in raw data; the integrity
    /// validator repairs or drops such records.
    pub width: u32,

    /// Source image height in pixels.
    pub height: u32,

    /// Species name derived from `class_label`, if any was recognized.
    #[serde(skip)]
    pub species: Option<String>,

    /// Disease name derived from `class_label`; `Some("healthy")` when no
    /// disease token remains after species removal. `None` only before
    /// feature extraction has run.
    #[serde(skip)]
    pub disease: Option<String>,

    /// Binary label: 0 = healthy, 1 = diseased. Set by the binary
    /// pipeline's filter stage.
    #[serde(skip)]
    pub binary_class: Option<u8>,
}

impl AnnotationRecord {
    /// Creates a record with the raw fields; derived fields start unset.
    pub fn new(
        filename: impl Into<String>,
        class_label: impl Into<String>,
        bbox: (f64, f64, f64, f64),
        width: u32,
        height: u32,
    ) -> Self {
        let (xmin, ymin, xmax, ymax) = bbox;
        Self {
            filename: filename.into(),
            class_label: class_label.into(),
            xmin,
            ymin,
            xmax,
            ymax,
            width,
            height,
            species: None,
            disease: None,
            binary_class: None,
        }
    }

    /// Returns true if either image dimension is zero.
    pub fn has_zero_dimension(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The two dataset partitions processed per pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Eval,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Eval => "eval",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record field whose distinct values define a pipeline's classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelColumn {
    /// Synthesized 0/1 label (healthy vs diseased).
    Binary,
    /// Derived species name.
    Species,
    /// Derived disease name ("healthy" sentinel included).
    Disease,
}

impl LabelColumn {
    /// Returns the record's value for this column, if set.
    ///
    /// Binary labels map to the strings "0" and "1" so that the
    /// lexicographically sorted class mapping assigns index 0 to healthy
    /// and index 1 to diseased.
    pub fn value<'a>(&self, record: &'a AnnotationRecord) -> Option<&'a str> {
        match self {
            LabelColumn::Binary => record.binary_class.map(|c| if c == 0 { "0" } else { "1" }),
            LabelColumn::Species => record.species.as_deref(),
            LabelColumn::Disease => record.disease.as_deref(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelColumn::Binary => "binary_class",
            LabelColumn::Species => "species",
            LabelColumn::Disease => "disease",
        }
    }
}

impl fmt::Display for LabelColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All annotation records for one split.
#[derive(Clone, Debug)]
pub struct RecordSet {
    pub split: Split,
    pub records: Vec<AnnotationRecord>,
}

impl RecordSet {
    pub fn new(split: Split, records: Vec<AnnotationRecord>) -> Self {
        Self { split, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct image filenames in this set.
    pub fn unique_filenames(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.filename.as_str()).collect()
    }

    /// Per-class record counts for the given label column, sorted by
    /// class value. Records without a value for the column are not
    /// counted.
    pub fn distribution(&self, column: LabelColumn) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if let Some(value) = column.value(record) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Keeps only records matching the predicate; returns how many were
    /// removed.
    pub fn retain<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&AnnotationRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(predicate);
        before - self.records.len()
    }
}
