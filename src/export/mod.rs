//! YOLO-format export.
//!
//! Converts processed record sets into the Ultralytics directory layout:
//! `images/{train,val}/` holding copied image files, `labels/{train,val}/`
//! holding one `<stem>.txt` per image with one
//! `"<class> <cx> <cy> <w> <h>"` line per bounding box (normalized
//! center/size coordinates, six decimal places), and a `dataset.yaml`
//! manifest at the base directory.
//!
//! Export is group-atomic per filename: an image is copied if and only if
//! its label file is written. Per-group failures are counted and reported
//! but never abort the remaining groups.

mod report;

pub use report::{ExportFailure, ExportSummary};

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PlantPrepError;
use crate::record::{AnnotationRecord, LabelColumn, RecordSet};

/// Bijection from class label to dense zero-based index.
///
/// Built once per pipeline run from the processed *training* set and
/// reused unchanged for the evaluation split so label indices agree.
#[derive(Clone, Debug)]
pub struct ClassMapping {
    /// Class names, index-ordered (lexicographically sorted).
    names: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl ClassMapping {
    /// Distinct values of `column`, sorted lexicographically, assigned
    /// indices `0..k-1`.
    pub fn from_records(set: &RecordSet, column: LabelColumn) -> Self {
        let mut names: Vec<String> = set.distribution(column).into_keys().collect();
        names.sort();

        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self { names, index }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index-to-name pairs in index order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, name)| (i, name.as_str()))
    }
}

/// Normalized center/size coordinates for one bounding box.
///
/// All four values are expected in `[0, 1]`; anything outside signals an
/// upstream geometry or dimension-repair defect and is surfaced as
/// [`PlantPrepError::DegenerateGeometry`], never clamped.
pub fn convert_bbox(record: &AnnotationRecord) -> Result<(f64, f64, f64, f64), PlantPrepError> {
    if record.has_zero_dimension() {
        return Err(PlantPrepError::DegenerateGeometry {
            filename: record.filename.clone(),
            detail: format!("zero image dimensions {}x{}", record.width, record.height),
        });
    }

    let width = record.width as f64;
    let height = record.height as f64;

    let cx = (record.xmin + record.xmax) / 2.0 / width;
    let cy = (record.ymin + record.ymax) / 2.0 / height;
    let w = (record.xmax - record.xmin) / width;
    let h = (record.ymax - record.ymin) / height;

    for (name, value) in [("cx", cx), ("cy", cy), ("w", w), ("h", h)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(PlantPrepError::DegenerateGeometry {
                filename: record.filename.clone(),
                detail: format!("normalized {name} = {value:.6} is outside [0, 1]"),
            });
        }
    }

    Ok((cx, cy, w, h))
}

/// Maps a possibly-duplicate filename back to its source image name.
///
/// Duplicates share source imagery: `img_dup3.jpg` resolves to `img.jpg`.
/// Resolution splits on the first literal `_dup`, so an original stem
/// that itself contains `_dup` would be misresolved; known fragility of
/// the naming scheme.
pub fn resolve_source_name(filename: &str) -> String {
    match filename.find("_dup") {
        Some(at) => {
            let suffix = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| format!(".{ext}"))
                .unwrap_or_default();
            format!("{}{}", &filename[..at], suffix)
        }
        None => filename.to_string(),
    }
}

/// Exports one split: copies images and writes label files.
///
/// Output directories are created once up front. Records are grouped by
/// filename; each group either exports completely or is skipped and
/// counted. Returns a summary where
/// `exported + skipped == distinct filenames`.
pub fn export_split(
    set: &RecordSet,
    source_images_dir: &Path,
    dest_images_dir: &Path,
    dest_labels_dir: &Path,
    mapping: &ClassMapping,
    column: LabelColumn,
) -> Result<ExportSummary, PlantPrepError> {
    fs::create_dir_all(dest_images_dir)?;
    fs::create_dir_all(dest_labels_dir)?;

    let mut groups: BTreeMap<&str, Vec<&AnnotationRecord>> = BTreeMap::new();
    for record in &set.records {
        groups.entry(record.filename.as_str()).or_default().push(record);
    }

    let mut summary = ExportSummary::default();

    for (filename, group) in groups {
        match export_group(
            filename,
            &group,
            source_images_dir,
            dest_images_dir,
            dest_labels_dir,
            mapping,
            column,
        ) {
            Ok(()) => summary.exported += 1,
            Err(err) => summary.record_failure(filename, err.to_string()),
        }
    }

    Ok(summary)
}

fn export_group(
    filename: &str,
    group: &[&AnnotationRecord],
    source_images_dir: &Path,
    dest_images_dir: &Path,
    dest_labels_dir: &Path,
    mapping: &ClassMapping,
    column: LabelColumn,
) -> Result<(), PlantPrepError> {
    let source = source_images_dir.join(resolve_source_name(filename));
    if !source.is_file() {
        return Err(PlantPrepError::SourceNotFound { path: source });
    }

    // Render every label line before touching the filesystem so a bad
    // record cannot leave a copied image without its label file.
    let mut label_content = String::new();
    for record in group {
        let label = column
            .value(record)
            .ok_or_else(|| PlantPrepError::UnknownClass {
                label: format!("<unset {column}>"),
            })?;
        let class_index = mapping
            .index_of(label)
            .ok_or_else(|| PlantPrepError::UnknownClass {
                label: label.to_string(),
            })?;

        let (cx, cy, w, h) = convert_bbox(record)?;
        label_content.push_str(&format!(
            "{class_index} {cx:.6} {cy:.6} {w:.6} {h:.6}\n"
        ));
    }

    // Each duplicate is materialized under its own (suffixed) filename
    // even though the copied bytes are identical.
    let image_dest = dest_images_dir.join(filename);
    if let Err(err) = fs::copy(&source, &image_dest) {
        // An interrupted copy can leave a partial destination file.
        let _ = fs::remove_file(&image_dest);
        return Err(err.into());
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let label_dest = dest_labels_dir.join(format!("{stem}.txt"));

    if let Err(err) = fs::write(&label_dest, label_content) {
        // Keep the group atomic: no image without a label.
        let _ = fs::remove_file(&image_dest);
        return Err(err.into());
    }

    Ok(())
}

/// The `dataset.yaml` manifest consumed by detector trainers.
#[derive(Debug, Serialize)]
pub struct DatasetManifest {
    /// Absolute base path of the exported dataset.
    pub path: String,
    /// Training images subpath, relative to `path`.
    pub train: String,
    /// Validation images subpath, relative to `path`.
    pub val: String,
    /// Class count.
    pub nc: usize,
    /// Index-to-name table.
    pub names: BTreeMap<usize, String>,
}

/// Writes `dataset.yaml` under `base_dir` and returns its path.
pub fn write_manifest(
    base_dir: &Path,
    mapping: &ClassMapping,
    train_subpath: &str,
    val_subpath: &str,
) -> Result<PathBuf, PlantPrepError> {
    fs::create_dir_all(base_dir)?;

    let absolute_base = base_dir.canonicalize().unwrap_or_else(|_| base_dir.to_path_buf());

    let manifest = DatasetManifest {
        path: absolute_base.to_string_lossy().into_owned(),
        train: train_subpath.to_string(),
        val: val_subpath.to_string(),
        nc: mapping.len(),
        names: mapping
            .entries()
            .map(|(i, name)| (i, name.to_string()))
            .collect(),
    };

    let manifest_path = base_dir.join("dataset.yaml");
    let yaml =
        serde_yaml::to_string(&manifest).map_err(|source| PlantPrepError::ManifestWrite {
            path: manifest_path.clone(),
            source,
        })?;

    let mut file = fs::File::create(&manifest_path)?;
    file.write_all(yaml.as_bytes())?;

    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnnotationRecord, Split};

    fn record(filename: &str, disease: &str, bbox: (f64, f64, f64, f64)) -> AnnotationRecord {
        let mut rec = AnnotationRecord::new(filename, "x", bbox, 100, 200);
        rec.disease = Some(disease.to_string());
        rec
    }

    fn diseased_set(records: Vec<AnnotationRecord>) -> RecordSet {
        RecordSet::new(Split::Train, records)
    }

    #[test]
    fn class_mapping_is_a_sorted_bijection() {
        let set = diseased_set(vec![
            record("a.jpg", "Rust", (0.0, 0.0, 1.0, 1.0)),
            record("b.jpg", "Blight", (0.0, 0.0, 1.0, 1.0)),
            record("c.jpg", "Blight", (0.0, 0.0, 1.0, 1.0)),
            record("d.jpg", "Mildew", (0.0, 0.0, 1.0, 1.0)),
        ]);

        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.index_of("Blight"), Some(0));
        assert_eq!(mapping.index_of("Mildew"), Some(1));
        assert_eq!(mapping.index_of("Rust"), Some(2));
        assert_eq!(mapping.index_of("Scab"), None);

        let indices: Vec<usize> = mapping.entries().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn convert_bbox_normalizes_center_and_size() {
        let rec = record("a.jpg", "Blight", (10.0, 20.0, 50.0, 80.0));
        let (cx, cy, w, h) = convert_bbox(&rec).expect("conversion should succeed");

        assert!((cx - 0.30).abs() < 1e-9);
        assert!((cy - 0.25).abs() < 1e-9);
        assert!((w - 0.40).abs() < 1e-9);
        assert!((h - 0.30).abs() < 1e-9);
    }

    #[test]
    fn convert_bbox_rejects_zero_dimensions() {
        let mut rec = record("a.jpg", "Blight", (10.0, 20.0, 50.0, 80.0));
        rec.width = 0;
        let err = convert_bbox(&rec).unwrap_err();
        assert!(matches!(err, PlantPrepError::DegenerateGeometry { .. }));
    }

    #[test]
    fn convert_bbox_rejects_out_of_range_values() {
        // Box extends past the image's right edge.
        let rec = record("a.jpg", "Blight", (50.0, 20.0, 250.0, 80.0));
        let err = convert_bbox(&rec).unwrap_err();
        assert!(matches!(err, PlantPrepError::DegenerateGeometry { .. }));
    }

    #[test]
    fn resolve_source_name_strips_duplicate_marker() {
        assert_eq!(resolve_source_name("img_dup0.jpg"), "img.jpg");
        assert_eq!(resolve_source_name("img_dup12.jpg"), "img.jpg");
        assert_eq!(resolve_source_name("img.jpg"), "img.jpg");
        assert_eq!(resolve_source_name("noext_dup3"), "noext");
    }

    #[test]
    fn export_writes_image_and_label_together() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("a.jpg"), b"imagedata").expect("write image");

        let set = diseased_set(vec![
            record("a.jpg", "Blight", (10.0, 20.0, 50.0, 80.0)),
            record("a.jpg", "Blight", (0.0, 0.0, 100.0, 200.0)),
        ]);
        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        let summary =
            export_split(&set, &src, &images, &labels, &mapping, LabelColumn::Disease)
                .expect("export should succeed");

        assert_eq!(summary.exported, 1);
        assert_eq!(summary.skipped(), 0);
        assert!(images.join("a.jpg").is_file());

        let label = fs::read_to_string(labels.join("a.txt")).expect("read label");
        assert_eq!(
            label,
            "0 0.300000 0.250000 0.400000 0.300000\n0 0.500000 0.500000 1.000000 1.000000\n"
        );
    }

    #[test]
    fn export_skips_groups_with_missing_source() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("found.jpg"), b"img").expect("write image");

        let set = diseased_set(vec![
            record("found.jpg", "Blight", (0.0, 0.0, 10.0, 10.0)),
            record("missing.jpg", "Blight", (0.0, 0.0, 10.0, 10.0)),
        ]);
        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        let summary = export_split(
            &set,
            &src,
            &temp.path().join("images"),
            &temp.path().join("labels"),
            &mapping,
            LabelColumn::Disease,
        )
        .expect("export should succeed");

        assert_eq!(summary.exported, 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.exported + summary.skipped(), set.unique_filenames().len());
        assert_eq!(summary.failures[0].filename, "missing.jpg");
    }

    #[test]
    fn export_copies_duplicates_from_their_source_image() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("a.jpg"), b"sourcebytes").expect("write image");

        let set = diseased_set(vec![record("a_dup0.jpg", "Blight", (0.0, 0.0, 10.0, 10.0))]);
        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        let summary =
            export_split(&set, &src, &images, &labels, &mapping, LabelColumn::Disease)
                .expect("export should succeed");

        assert_eq!(summary.exported, 1);
        assert_eq!(
            fs::read(images.join("a_dup0.jpg")).expect("read copy"),
            b"sourcebytes"
        );
        assert!(labels.join("a_dup0.txt").is_file());
    }

    #[test]
    fn export_failed_image_copy_leaves_no_label_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("a.jpg"), b"img").expect("write image");

        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        // A directory squatting on the destination path makes the copy
        // fail after the label content was already rendered.
        fs::create_dir_all(images.join("a.jpg")).expect("block dest path");

        let set = diseased_set(vec![record("a.jpg", "Blight", (0.0, 0.0, 10.0, 10.0))]);
        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        let summary =
            export_split(&set, &src, &images, &labels, &mapping, LabelColumn::Disease)
                .expect("export should succeed");

        assert_eq!(summary.exported, 0);
        assert_eq!(summary.skipped(), 1);
        assert!(!labels.join("a.txt").exists());
    }

    #[test]
    fn export_skips_unmapped_classes_without_partial_writes() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("a.jpg"), b"img").expect("write image");

        // Mapping built from an unrelated set; "Blight" is unknown to it.
        let mapping_set = diseased_set(vec![record("x.jpg", "Rust", (0.0, 0.0, 1.0, 1.0))]);
        let mapping = ClassMapping::from_records(&mapping_set, LabelColumn::Disease);

        let set = diseased_set(vec![record("a.jpg", "Blight", (0.0, 0.0, 10.0, 10.0))]);
        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        let summary =
            export_split(&set, &src, &images, &labels, &mapping, LabelColumn::Disease)
                .expect("export should succeed");

        assert_eq!(summary.exported, 0);
        assert_eq!(summary.skipped(), 1);
        assert!(!images.join("a.jpg").exists());
        assert!(!labels.join("a.txt").exists());
    }

    #[test]
    fn manifest_contains_layout_and_class_table() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let set = diseased_set(vec![
            record("a.jpg", "Blight", (0.0, 0.0, 1.0, 1.0)),
            record("b.jpg", "Rust", (0.0, 0.0, 1.0, 1.0)),
        ]);
        let mapping = ClassMapping::from_records(&set, LabelColumn::Disease);

        let path = write_manifest(temp.path(), &mapping, "images/train", "images/val")
            .expect("write manifest");

        assert_eq!(path, temp.path().join("dataset.yaml"));
        let content = fs::read_to_string(&path).expect("read manifest");
        assert!(content.contains("train: images/train"));
        assert!(content.contains("val: images/val"));
        assert!(content.contains("nc: 2"));
        assert!(content.contains("0: Blight"));
        assert!(content.contains("1: Rust"));
    }
}
