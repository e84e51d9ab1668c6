// odoshard_core/src/scan.rs

use ndarray::Array2;
use std::path::Path;

use crate::error::ScanError;

/// Loads single named image channels (range, height, intensity, ...) of a
/// projected scan.
///
/// Implementations decide the file format. The engine does not validate the
/// image shape here; a mismatch surfaces when the cell is written.
pub trait ScanSource {
    fn load_channel(&self, scan: &Path, channel: &str) -> Result<Array2<f32>, ScanError>;

    /// Loads every requested channel of one scan, flattened row-major.
    fn load_frame(&self, scan: &Path, channels: &[String]) -> Result<Vec<Vec<f32>>, ScanError> {
        channels
            .iter()
            .map(|channel| {
                let image = self.load_channel(scan, channel)?;
                Ok(image.iter().copied().collect())
            })
            .collect()
    }
}
