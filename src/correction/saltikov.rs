//! Saltikov (1967) unfolding over equal-width size classes.
//!
//! Spheres in class `j` are represented by the class maximum. With classes
//! of width `Δ`, the sections they produce per unit area in class `i` are
//! `h · Δ · α(i, j)`, where `α` depends only on the class indices:
//!
//! ```text
//! α(i, j) = sqrt((j+1)² − i²) − sqrt((j+1)² − (i+1)²)      (0-based, i ≤ j)
//! ```
//!
//! The coefficient table is rebuilt from that expression for up to
//! [`MAX_CLASSES`] classes, the extent of the published table. Larger class
//! counts are rejected rather than extrapolated.

use log::debug;

use super::matrix::{BackSubstitution, UpperTriangular};
use super::{half_chord, height_factor};
use crate::binning::BinEdges;
use crate::data::model::LengthType;
use crate::error::{Result, VsdError};

/// Largest number of size classes covered by the coefficient table.
pub const MAX_CLASSES: usize = 15;

/// Unit-width coefficient `α(i, j)`.
pub fn coefficient(i: usize, j: usize) -> f64 {
    if i > j {
        return 0.0;
    }
    let top = (j + 1) as f64;
    half_chord(top, i as f64) - half_chord(top, (i + 1) as f64)
}

/// Coefficient table for `nbins` classes.
pub fn coefficient_table(nbins: usize) -> Result<UpperTriangular> {
    if !(1..=MAX_CLASSES).contains(&nbins) {
        return Err(VsdError::InvalidBinCount {
            nbins,
            reason: format!("Saltikov coefficients are tabulated for 1 to {MAX_CLASSES} classes"),
        });
    }
    Ok(UpperTriangular::from_fn(nbins, coefficient))
}

/// Class width times the height factor: converts `α` into sections per unit area.
fn class_scale(edges: &BinEdges, length_type: LengthType) -> f64 {
    height_factor(length_type) * edges.max() / edges.nbins() as f64
}

pub fn probability_matrix(edges: &BinEdges, length_type: LengthType) -> Result<UpperTriangular> {
    let alpha = coefficient_table(edges.nbins())?;
    let scale = class_scale(edges, length_type);
    Ok(UpperTriangular::from_fn(edges.nbins(), |i, j| scale * alpha.get(i, j)))
}

/// Unfold per-area section densities, largest class first.
///
/// Each class first loses the sections already explained by the larger
/// classes; the remainder is divided by that class's own coefficient.
pub(crate) fn unfold(
    densities: &[f64],
    edges: &BinEdges,
    length_type: LengthType,
) -> Result<BackSubstitution> {
    let n = edges.nbins();
    let alpha = coefficient_table(n)?;
    let scale = class_scale(edges, length_type);

    let mut number_density = vec![0.0; n];
    for j in (0..n).rev() {
        let from_larger: f64 = ((j + 1)..n)
            .map(|k| number_density[k] * scale * alpha.get(j, k))
            .sum();
        let remaining = densities[j] - from_larger;
        number_density[j] = remaining / (scale * alpha.get(j, j));
        debug!(
            "saltikov class {j}: N_A={:.6e} after larger={:.6e} -> N_V={:.6e}",
            densities[j], remaining, number_density[j]
        );
    }

    Ok(BackSubstitution {
        solution: number_density,
        singular: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::Method;
    use approx::assert_relative_eq;

    #[test]
    fn coefficients_match_closed_form() {
        assert_relative_eq!(coefficient(0, 0), 1.0);
        assert_relative_eq!(coefficient(1, 1), 3f64.sqrt());
        assert_relative_eq!(coefficient(0, 1), 2.0 - 3f64.sqrt());
        assert_eq!(coefficient(2, 1), 0.0);
        // Each column telescopes to the class maximum.
        for j in 0..MAX_CLASSES {
            let column: f64 = (0..=j).map(|i| coefficient(i, j)).sum();
            assert_relative_eq!(column, (j + 1) as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn class_count_outside_table_is_rejected() {
        assert!(matches!(
            coefficient_table(MAX_CLASSES + 1),
            Err(VsdError::InvalidBinCount { nbins: 16, .. })
        ));
        assert!(coefficient_table(MAX_CLASSES).is_ok());

        let edges = BinEdges::equal_width(10.0, 20).unwrap();
        let err = Method::Saltikov
            .correct(&[1.0; 20], &edges, LengthType::Diameter)
            .unwrap_err();
        assert!(matches!(err, VsdError::InvalidBinCount { nbins: 20, .. }));
    }

    #[test]
    fn matrix_agrees_with_sphere_geometry() {
        let edges = BinEdges::equal_width(12.0, 6).unwrap();
        let p = probability_matrix(&edges, LengthType::Radius).unwrap();
        let e = edges.edges();
        for j in 0..6 {
            for i in 0..=j {
                let expected = 2.0 * (half_chord(e[j + 1], e[i]) - half_chord(e[j + 1], e[i + 1]));
                assert_relative_eq!(p.get(i, j), expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn unfolding_recovers_forward_sectioned_population() {
        let edges = BinEdges::equal_width(30.0, 12).unwrap();
        let truth: Vec<f64> = (0..12).map(|j| 1e-3 * (1.0 + (j as f64 - 6.0).powi(2))).collect();
        let p = probability_matrix(&edges, LengthType::Diameter).unwrap();
        let sections = p.mul_vec(&truth);

        let table = Method::Saltikov
            .correct(&sections, &edges, LengthType::Diameter)
            .unwrap();
        for (got, want) in table.number_densities().iter().zip(&truth) {
            assert_relative_eq!(*got, *want, max_relative = 1e-9);
        }
        assert!(table.degenerate_bins().is_empty());
    }

    #[test]
    fn single_large_class_spreads_sections_downwards() {
        // Only the largest class is populated; its sections fill every class.
        let edges = BinEdges::equal_width(4.0, 4).unwrap();
        let p = probability_matrix(&edges, LengthType::Diameter).unwrap();
        let sections = p.mul_vec(&[0.0, 0.0, 0.0, 2.0]);
        assert!(sections.iter().all(|&s| s > 0.0));

        let table = Method::Saltikov
            .correct(&sections, &edges, LengthType::Diameter)
            .unwrap();
        assert_relative_eq!(table.bins[3].number_density, 2.0, epsilon = 1e-12);
        for bin in &table.bins[..3] {
            assert_relative_eq!(bin.number_density, 0.0, epsilon = 1e-12);
        }
    }
}
