//! Remote access to the NOAA OISST v2 high-resolution daily dataset.
//!
//! The source publishes one file per year. For a given day this crate
//! resolves the yearly resource, subsets it to the fixed analysis window,
//! and materializes an in-memory [`sst_common::Grid`]. Two access methods
//! are tried in order:
//!
//! 1. the THREDDS NetcdfSubset (NCSS) endpoint, whose NetCDF response is
//!    decoded with the `netcdf` crate;
//! 2. the OPeNDAP `.ascii` constraint endpoint, parsed by
//!    `opendap-parser`.
//!
//! Failures of both methods surface as a recoverable fetch error; a
//! subset whose every cell is the missing-data marker is reported as
//! absence, never as a grid.

pub mod dataset;
pub mod decode;
pub mod fetch;

pub use dataset::{DatasetLocator, GridLayout, SourceConfig, SstPacking};
pub use fetch::{FetchOutcome, FetcherConfig, SstFetcher};
