//! Sahagian & Proussevitch (1998) sectioning matrix.
//!
//! Instead of a single representative size, sphere sizes are taken as
//! uniformly spread over their class `[e_j, e_{j+1}]`, and the section
//! probability is integrated over that spread as well as over all plane
//! offsets:
//!
//! ```text
//! P(i, j) = h / Δ_j · ∫_{e_j}^{e_{j+1}} [ sqrt(x² − e_i²)₊ − sqrt(x² − e_{i+1}²)₊ ] dx
//! ```
//!
//! The integral has a closed form with a logarithmic term; see
//! [`chord_integral`].

use super::height_factor;
use super::matrix::UpperTriangular;
use crate::binning::BinEdges;
use crate::data::model::LengthType;

/// `∫_c^x sqrt(t² − c²) dt` for `x > c`, else 0.
///
/// `(x·s − c²·ln((x + s) / c)) / 2` with `s = sqrt(x² − c²)`. At `c = 0` the
/// log term is `0 · ln(∞)`, so the limit `x² / 2` is returned directly.
pub fn chord_integral(x: f64, c: f64) -> f64 {
    if x <= c {
        return 0.0;
    }
    if c == 0.0 {
        return 0.5 * x * x;
    }
    let s = (x * x - c * c).sqrt();
    0.5 * (x * s - c * c * ((x + s) / c).ln())
}

pub fn probability_matrix(edges: &BinEdges, length_type: LengthType) -> UpperTriangular {
    let h = height_factor(length_type);
    UpperTriangular::from_fn(edges.nbins(), |i, j| {
        let (lo, hi) = (edges.lower(j), edges.upper(j));
        let (a, b) = (edges.lower(i), edges.upper(i));
        let through_a = chord_integral(hi, a) - chord_integral(lo, a);
        let through_b = chord_integral(hi, b) - chord_integral(lo, b);
        h * (through_a - through_b) / edges.width(j)
    })
}
