//! Annotation CSV reader.
//!
//! The raw sources are delimited files with one row per bounding box and
//! the columns `filename, class, xmin, ymin, xmax, ymax, width, height`.
//! Loading normalizes the free-text class labels so the downstream
//! feature extraction sees a consistent vocabulary:
//!
//! - every occurrence of "leaf" is removed (case-insensitive)
//! - underscores become spaces
//! - whitespace runs collapse to a single space
//! - the result is trimmed
//!
//! A missing or unreadable source file and a header without the required
//! columns are both structural failures that abort the run.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::PlantPrepError;
use crate::record::{AnnotationRecord, RecordSet, Split};

/// Columns every annotation source must carry.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "filename", "class", "xmin", "ymin", "xmax", "ymax", "width", "height",
];

/// Reads one split's annotation CSV into a [`RecordSet`].
pub fn load_split(path: &Path, split: Split) -> Result<RecordSet, PlantPrepError> {
    let file = File::open(path).map_err(|_| PlantPrepError::SourceNotFound {
        path: path.to_path_buf(),
    })?;

    let records = read_records(BufReader::new(file), path)?;
    Ok(RecordSet::new(split, records))
}

/// Reads a split from a CSV string.
///
/// Useful for testing without file I/O.
pub fn from_csv_str(csv_str: &str, split: Split) -> Result<RecordSet, PlantPrepError> {
    let records = read_records(csv_str.as_bytes(), Path::new("<string>"))?;
    Ok(RecordSet::new(split, records))
}

fn read_records<R: Read>(reader: R, path: &Path) -> Result<Vec<AnnotationRecord>, PlantPrepError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| PlantPrepError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(PlantPrepError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut records = Vec::new();
    for result in csv_reader.deserialize() {
        let mut record: AnnotationRecord = result.map_err(|source| PlantPrepError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
        record.class_label = clean_class_label(&record.class_label);
        records.push(record);
    }

    Ok(records)
}

/// Normalizes one raw class label.
///
/// The collapse pass runs last, after "leaf" removal and underscore
/// replacement, so the doubled spaces either of those can leave behind
/// ("Tomato_leaf_Blight" → "Tomato  Blight") collapse too instead of
/// surviving into the vocabulary.
pub fn clean_class_label(raw: &str) -> String {
    let without_leaf = remove_ascii_ci(raw, "leaf");
    let spaced = without_leaf.replace('_', " ");
    collapse_whitespace(spaced.trim())
}

/// Removes every occurrence of `pattern` from `text`, matching ASCII
/// case-insensitively.
fn remove_ascii_ci(text: &str, pattern: &str) -> String {
    let bytes = text.as_bytes();
    let pat = pattern.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        if i + pat.len() <= bytes.len() && bytes[i..i + pat.len()].eq_ignore_ascii_case(pat) {
            i += pat.len();
        } else {
            // Advance one full character so multi-byte codepoints stay intact.
            let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&text[i..i + ch_len]);
            i += ch_len;
        }
    }

    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
