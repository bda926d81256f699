use serde::{Deserialize, Serialize};

/// Explicit full copy of the density-contrast field.
///
/// Produced only by the snapshot accessor, never by the per-step summary path.
/// Data is a flat row-major buffer; `n` is the edge length of the cube.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub n: usize,
    pub data: Vec<f64>,
}

impl GridSnapshot {
    pub fn cells(&self) -> usize {
        self.n * self.n * self.n
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[(z * self.n + y) * self.n + x]
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}
