//! Correction engine: 2D section-size densities → 3D number densities.
//!
//! ```text
//!   counts per bin / analysed area   (sections per unit area, N_A)
//!        │
//!        ▼
//!   ┌─────────────────────────┐
//!   │ Method::correct         │  Saltikov | Cheng-Lemlich | Sahagian-Proussevitch
//!   └─────────────────────────┘
//!        │
//!        ▼
//!   VsdTable                 (spheres per unit volume per bin, N_V)
//! ```
//!
//! All sizes stay in the length type the caller binned with; the engine
//! never converts between radius and diameter.

pub mod cheng_lemlich;
pub mod matrix;
pub mod sahagian;
pub mod saltikov;

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::Serialize;

use crate::binning::BinEdges;
use crate::data::model::{LengthType, LengthUnit};
use crate::error::{Result, VsdError};

pub use matrix::{BackSubstitution, UpperTriangular};

/// Largest bin count the dense sectioning matrix is built for.
pub const MAX_BINS: usize = 1000;

// ---------------------------------------------------------------------------
// Method – closed set of correction algorithms
// ---------------------------------------------------------------------------

/// Stereological correction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    /// Saltikov (1967): tabulated unfolding coefficients, class maxima.
    Saltikov,
    /// Cheng & Lemlich (1983): sectioning matrix at class midpoints.
    ChengLemlich,
    /// Sahagian & Proussevitch (1998): sectioning matrix integrated over each class.
    SahagianProussevitch,
}

impl Method {
    pub const ALL: [Method; 3] = [
        Method::Saltikov,
        Method::ChengLemlich,
        Method::SahagianProussevitch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Saltikov => "Saltikov",
            Method::ChengLemlich => "Cheng-Lemlich",
            Method::SahagianProussevitch => "Sahagian-Proussevitch",
        }
    }

    /// Length type of the method's original formulation.
    pub fn classical_length_type(self) -> LengthType {
        match self {
            Method::ChengLemlich => LengthType::Radius,
            Method::Saltikov | Method::SahagianProussevitch => LengthType::Diameter,
        }
    }

    /// Sectioning matrix `P` with `N_A = P · N_V`.
    pub fn probability_matrix(
        self,
        edges: &BinEdges,
        length_type: LengthType,
    ) -> Result<UpperTriangular> {
        match self {
            Method::Saltikov => saltikov::probability_matrix(edges, length_type),
            Method::ChengLemlich => Ok(cheng_lemlich::probability_matrix(edges, length_type)),
            Method::SahagianProussevitch => Ok(sahagian::probability_matrix(edges, length_type)),
        }
    }

    /// Correct per-area section densities into per-volume sphere densities.
    ///
    /// `densities[i]` is the number of sections per unit area whose size falls
    /// in bin `i` of `edges`.
    pub fn correct(
        self,
        densities: &[f64],
        edges: &BinEdges,
        length_type: LengthType,
    ) -> Result<VsdTable> {
        validate_input(densities, edges)?;
        if densities.iter().all(|&d| d == 0.0) {
            return Ok(VsdTable::zeros(self, length_type, edges));
        }

        let solved = match self {
            Method::Saltikov => saltikov::unfold(densities, edges, length_type)?,
            Method::ChengLemlich | Method::SahagianProussevitch => self
                .probability_matrix(edges, length_type)?
                .solve_back(densities),
        };

        let table = VsdTable::from_solution(self, length_type, edges, solved);
        let flagged = table.degenerate_bins().len();
        if flagged > 0 {
            warn!(
                "{}: {flagged} of {} bins have no finite log density",
                self.name(),
                table.nbins
            );
        }
        Ok(table)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    /// Case-insensitive; separators (`-`, `_`, `&`, spaces) are ignored.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "saltikov" | "saltykov" => Ok(Method::Saltikov),
            "chenglemlich" | "cl" => Ok(Method::ChengLemlich),
            "sahagianproussevitch" | "sahagian" | "sp" => Ok(Method::SahagianProussevitch),
            _ => Err(s.to_string()),
        }
    }
}

fn validate_input(densities: &[f64], edges: &BinEdges) -> Result<()> {
    let nbins = edges.nbins();
    if nbins < 1 {
        return Err(VsdError::InvalidBinCount {
            nbins,
            reason: "at least one bin is required".into(),
        });
    }
    if nbins > MAX_BINS {
        return Err(VsdError::InvalidBinCount {
            nbins,
            reason: format!("at most {MAX_BINS} bins are supported"),
        });
    }
    if densities.len() != nbins {
        return Err(VsdError::InvalidBinCount {
            nbins,
            reason: format!("histogram has {} entries", densities.len()),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared sphere-section geometry
// ---------------------------------------------------------------------------

/// Sections per unit area produced by spheres of size `x` at unit number
/// density is `height_factor · x` (the sphere diameter): 1 when sizes are
/// diameters, 2 when they are radii.
pub(crate) fn height_factor(length_type: LengthType) -> f64 {
    match length_type {
        LengthType::Diameter => 1.0,
        LengthType::Radius => 2.0,
    }
}

/// `sqrt(x² - c²)` for `x > c`, else 0: the half-chord at which a sphere of
/// size `x` yields sections of size `c`.
pub(crate) fn half_chord(x: f64, c: f64) -> f64 {
    if x > c {
        (x * x - c * c).sqrt()
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Result table
// ---------------------------------------------------------------------------

/// Why a bin's log density is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumericDegeneracy {
    /// No spheres in this bin: log density is −∞.
    ZeroDensity,
    /// Unfolding over-subtracted the larger bins' contribution.
    NegativeDensity,
    /// The sectioning coefficient for this bin vanished.
    SingularDiagonal,
    /// Overflow in the solve.
    NonFinite,
}

/// One size class of a corrected distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VsdBin {
    pub lower: f64,
    pub upper: f64,
    pub midpoint: f64,
    /// Spheres per unit volume with true size in `[lower, upper]`.
    pub number_density: f64,
    /// `number_density / (upper - lower)`.
    pub population_density: f64,
    /// `log10(population_density)`; non-finite when `degeneracy` is set.
    pub log_population_density: f64,
    pub degeneracy: Option<NumericDegeneracy>,
}

/// Corrected vesicle size distribution for one correction run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VsdTable {
    pub method: Method,
    pub length_type: LengthType,
    pub nbins: usize,
    pub unit: Option<LengthUnit>,
    pub bins: Vec<VsdBin>,
}

impl VsdTable {
    fn zeros(method: Method, length_type: LengthType, edges: &BinEdges) -> Self {
        let solved = BackSubstitution {
            solution: vec![0.0; edges.nbins()],
            singular: Vec::new(),
        };
        Self::from_solution(method, length_type, edges, solved)
    }

    fn from_solution(
        method: Method,
        length_type: LengthType,
        edges: &BinEdges,
        solved: BackSubstitution,
    ) -> Self {
        let bins = solved
            .solution
            .iter()
            .enumerate()
            .map(|(i, &number_density)| {
                let width = edges.width(i);
                let population_density = number_density / width;
                let log_population_density = population_density.log10();
                let degeneracy = if solved.singular.contains(&i) {
                    Some(NumericDegeneracy::SingularDiagonal)
                } else if !number_density.is_finite() {
                    Some(NumericDegeneracy::NonFinite)
                } else if number_density == 0.0 {
                    Some(NumericDegeneracy::ZeroDensity)
                } else if number_density < 0.0 {
                    Some(NumericDegeneracy::NegativeDensity)
                } else {
                    None
                };
                VsdBin {
                    lower: edges.lower(i),
                    upper: edges.upper(i),
                    midpoint: edges.midpoint(i),
                    number_density,
                    population_density,
                    log_population_density,
                    degeneracy,
                }
            })
            .collect();

        VsdTable {
            method,
            length_type,
            nbins: edges.nbins(),
            unit: None,
            bins,
        }
    }

    /// Tag the table with the physical unit of its size axis.
    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn number_densities(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.number_density).collect()
    }

    /// Indices of bins carrying a [`NumericDegeneracy`].
    pub fn degenerate_bins(&self) -> Vec<usize> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, b)| b.degeneracy.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// Total spheres per unit volume. Only positive finite densities
    /// contribute, as in [`VsdTable::vesicularity`].
    pub fn total_number_density(&self) -> f64 {
        self.bins
            .iter()
            .map(|b| b.number_density)
            .filter(|d| d.is_finite() && *d > 0.0)
            .sum()
    }

    /// Vesicle volume fraction, treating every sphere in a bin as having the
    /// bin midpoint size. Only positive finite densities contribute.
    pub fn vesicularity(&self) -> f64 {
        self.bins
            .iter()
            .filter(|b| b.number_density.is_finite() && b.number_density > 0.0)
            .map(|b| {
                let d = self.length_type.to_diameter(b.midpoint);
                b.number_density * std::f64::consts::PI / 6.0 * d.powi(3)
            })
            .sum()
    }
}
