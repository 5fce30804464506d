//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Minimal BMP bytes that `imagesize` can read dimensions from.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub const CSV_HEADER: &str = "filename,class,xmin,ymin,xmax,ymax,width,height";

/// A scaffolded pipeline workspace: images, annotation CSVs, config file.
pub struct Workspace {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Creates the standard directory layout and config under `root`.
    ///
    /// `train_rows` / `eval_rows` are CSV data rows (no header).
    pub fn create(root: &Path, train_rows: &[&str], eval_rows: &[&str]) -> Self {
        fs::create_dir_all(root.join("TRAIN")).expect("create train images dir");
        fs::create_dir_all(root.join("TEST")).expect("create eval images dir");

        let write_csv = |name: &str, rows: &[&str]| {
            let mut content = String::from(CSV_HEADER);
            content.push('\n');
            for row in rows {
                content.push_str(row);
                content.push('\n');
            }
            fs::write(root.join(name), content).expect("write csv");
        };
        write_csv("train_labels.csv", train_rows);
        write_csv("test_labels.csv", eval_rows);

        let config_path = root.join("config.yaml");
        fs::write(
            &config_path,
            "train_labels_csv: train_labels.csv\n\
             eval_labels_csv: test_labels.csv\n\
             train_images_dir: TRAIN\n\
             eval_images_dir: TEST\n\
             output_dir: dataset\n\
             species: [Tomato, Apple, Corn]\n\
             excluded_diseases: []\n",
        )
        .expect("write config");

        Self {
            root: root.to_path_buf(),
            config_path,
        }
    }

    pub fn add_train_image(&self, name: &str, width: u32, height: u32) {
        write_bmp(&self.root.join("TRAIN").join(name), width, height);
    }

    pub fn add_eval_image(&self, name: &str, width: u32, height: u32) {
        write_bmp(&self.root.join("TEST").join(name), width, height);
    }

    pub fn dataset_dir(&self, pipeline_dir: &str) -> PathBuf {
        self.root.join("dataset").join(pipeline_dir)
    }
}
