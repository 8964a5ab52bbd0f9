//! Equal-width binning of linear measurements.
//!
//! Bins always start at zero and end at the largest measurement. An interior
//! edge belongs to the bin whose upper bound it is; the first bin is closed on
//! both ends, so `[0, e1], (e1, e2], ..., (e_{n-1}, max]`.

use serde::Serialize;

use crate::error::{Result, VsdError};

// ---------------------------------------------------------------------------
// BinEdges
// ---------------------------------------------------------------------------

/// Partition of `[0, max]` into `nbins` equal-width intervals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// `nbins + 1` edges from 0 to `max`. The last edge is exactly `max`.
    pub fn equal_width(max: f64, nbins: usize) -> Result<Self> {
        if nbins < 1 {
            return Err(VsdError::InvalidBinCount {
                nbins,
                reason: "at least one bin is required".into(),
            });
        }
        if !(max.is_finite() && max > 0.0) {
            return Err(VsdError::DegenerateRange { max });
        }
        let width = max / nbins as f64;
        let mut edges: Vec<f64> = (0..nbins).map(|i| i as f64 * width).collect();
        edges.push(max);
        Ok(BinEdges { edges })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn lower(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    pub fn upper(&self, bin: usize) -> f64 {
        self.edges[bin + 1]
    }

    pub fn width(&self, bin: usize) -> f64 {
        self.upper(bin) - self.lower(bin)
    }

    pub fn midpoint(&self, bin: usize) -> f64 {
        0.5 * (self.lower(bin) + self.upper(bin))
    }

    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin holding `value`, or `None` when it lies outside `[0, max]`.
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if !(0.0..=self.max()).contains(&value) {
            return None;
        }
        // First upper edge >= value: right-inclusive bins.
        let idx = self.edges[1..].partition_point(|&e| e < value);
        Some(idx.min(self.nbins() - 1))
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Count of measurements per bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: BinEdges,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Bin `values` into `nbins` equal-width bins over `[0, max(values)]`.
    pub fn from_values(values: &[f64], nbins: usize) -> Result<Self> {
        let max = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
            .unwrap_or(0.0);
        let edges = BinEdges::equal_width(max, nbins)?;
        Ok(Self::with_edges(values, edges))
    }

    /// Bin `values` into existing edges; values outside the edges are ignored.
    pub fn with_edges(values: &[f64], edges: BinEdges) -> Self {
        let mut counts = vec![0u64; edges.nbins()];
        for &v in values {
            if let Some(bin) = edges.bin_of(v) {
                counts[bin] += 1;
            }
        }
        Histogram { edges, counts }
    }

    pub fn nbins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts divided by `area`: sections per unit area in each bin.
    pub fn per_area(&self, area: f64) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64 / area).collect()
    }
}
