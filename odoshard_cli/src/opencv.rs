// odoshard_cli/src/opencv.rs

//! Reader for projected scans stored as OpenCV `FileStorage` YAML.
//!
//! ```text
//! %YAML:1.0
//! range: !!opencv-matrix
//!    rows: 64
//!    cols: 360
//!    dt: f
//!    data: [ 0., 1.5, ... ]
//! ```

use ndarray::Array2;
use odoshard_core::prelude::{ScanError, ScanSource};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

const MATRIX_TAG: &str = "!!opencv-matrix";

/// One `!!opencv-matrix` node.
#[derive(Debug, Deserialize)]
struct OpenCvMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Value>,
}

/// Loads channels from OpenCV YAML scan files.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvYamlScans;

impl OpenCvYamlScans {
    fn read_document(&self, scan: &Path) -> Result<Mapping, ScanError> {
        let text = fs::read_to_string(scan).map_err(|source| ScanError::Io {
            scan: scan.to_path_buf(),
            source,
        })?;
        parse_document(&text).map_err(|reason| ScanError::Malformed {
            scan: scan.to_path_buf(),
            channel: String::new(),
            reason,
        })
    }
}

impl ScanSource for OpenCvYamlScans {
    fn load_channel(&self, scan: &Path, channel: &str) -> Result<Array2<f32>, ScanError> {
        let document = self.read_document(scan)?;
        extract_channel(&document, scan, channel)
    }

    // Parse each file once instead of once per channel.
    fn load_frame(&self, scan: &Path, channels: &[String]) -> Result<Vec<Vec<f32>>, ScanError> {
        let document = self.read_document(scan)?;
        channels
            .iter()
            .map(|channel| {
                let image = extract_channel(&document, scan, channel)?;
                Ok(image.iter().copied().collect())
            })
            .collect()
    }
}

/// Strips the OpenCV-specific directive and tags, which plain YAML parsers
/// reject, and parses the remaining mapping.
fn parse_document(text: &str) -> Result<Mapping, String> {
    let body = match text.strip_prefix("%YAML") {
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => text,
    };
    let body = body.strip_prefix("---").unwrap_or(body);
    let body = body.replace(MATRIX_TAG, "");
    serde_yaml::from_str(&body).map_err(|e| e.to_string())
}

fn extract_channel(document: &Mapping, scan: &Path, channel: &str) -> Result<Array2<f32>, ScanError> {
    let malformed = |reason: String| ScanError::Malformed {
        scan: scan.to_path_buf(),
        channel: channel.to_string(),
        reason,
    };

    let node = document
        .get(channel)
        .ok_or_else(|| ScanError::MissingChannel {
            scan: scan.to_path_buf(),
            channel: channel.to_string(),
        })?;
    let matrix: OpenCvMatrix =
        serde_yaml::from_value(node.clone()).map_err(|e| malformed(e.to_string()))?;

    if matrix.data.len() != matrix.rows * matrix.cols {
        return Err(malformed(format!(
            "{}x{} matrix with {} values",
            matrix.rows,
            matrix.cols,
            matrix.data.len()
        )));
    }
    let values = matrix
        .data
        .iter()
        .map(|value| element(value).ok_or_else(|| malformed(format!("bad element {:?}", value))))
        .collect::<Result<Vec<f32>, _>>()?;

    Array2::from_shape_vec((matrix.rows, matrix.cols), values).map_err(|e| malformed(e.to_string()))
}

/// OpenCV spells non-finite values `.Nan`, `.Inf` and `-.Inf`.
fn element(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            ".nan" => Some(f32::NAN),
            ".inf" | "+.inf" => Some(f32::INFINITY),
            "-.inf" => Some(f32::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
}
