//! Cheng & Lemlich (1983) sectioning matrix.
//!
//! Spheres in class `j` are represented by the class midpoint `m_j`. A
//! random plane cuts a sphere of size `m_j` into a section in class
//! `[e_i, e_{i+1}]` with probability
//! `(sqrt(m_j² − e_i²) − sqrt(m_j² − e_{i+1}²)) / m_j`, and such spheres
//! produce `h · m_j` sections per unit area at unit number density.

use super::matrix::UpperTriangular;
use super::{half_chord, height_factor};
use crate::binning::BinEdges;
use crate::data::model::LengthType;

pub fn probability_matrix(edges: &BinEdges, length_type: LengthType) -> UpperTriangular {
    let h = height_factor(length_type);
    UpperTriangular::from_fn(edges.nbins(), |i, j| {
        let m = edges.midpoint(j);
        h * (half_chord(m, edges.lower(i)) - half_chord(m, edges.upper(i)))
    })
}
