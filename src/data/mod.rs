//! Data layer: core types, loading, and filtering.
//!
//! Architecture:
//! ```text
//!  .csv / .xls / .parquet      .json / key=value
//!        │                           │
//!        ▼                           ▼
//!   ┌──────────────────────────────────────┐
//!   │  loader   parse files → raw px sizes, │
//!   │           pixel scale, frame size     │
//!   └──────────────────────────────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  scale to physical units, drop sub-threshold sizes
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────────┐
//!   │ MeasurementTable  │  filtered sizes + provenance
//!   └──────────────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod model;
