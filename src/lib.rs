//! Stereological correction of vesicle section measurements.
//!
//! Vesicle outlines measured on 2D images under-sample large bubbles and cut
//! most bubbles smaller than their true size. This crate turns per-image
//! section sizes into an estimate of the 3D vesicle size distribution
//! (number of vesicles per unit volume per size class) with three classical
//! unfolding methods.
//!
//! ```no_run
//! use std::path::Path;
//! use vesicle_vsd::{LengthType, LengthUnit, Sample};
//!
//! # fn main() -> Result<(), vesicle_vsd::VsdError> {
//! let mut sample = Sample::new("PL-14", LengthUnit::Micrometers);
//! sample.add_image(
//!     "img01",
//!     Path::new("img01.csv"),
//!     Path::new("img01.json"),
//!     LengthUnit::Micrometers,
//!     15.0,
//! )?;
//! let result = sample.apply_vsd_corr("salt", "Saltikov", LengthType::Diameter, 12)?;
//! println!("N_V = {:.3e}", result.table.total_number_density());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod binning;
pub mod config;
pub mod correction;
pub mod data;
pub mod error;
pub mod export;
pub mod sample;

pub use crate::binning::{BinEdges, Histogram};
pub use crate::correction::{Method, NumericDegeneracy, VsdBin, VsdTable};
pub use crate::data::model::{LengthType, LengthUnit, MeasurementTable, ScanData};
pub use crate::error::{Result, VsdError};
pub use crate::sample::{CorrectionResult, Sample};
