//! Grid reductions for the climatology/anomaly pipeline.
//!
//! Everything here is pure array math over [`sst_common::Grid`]: the
//! 30-year mean, the observed-minus-baseline anomaly, and the finite-value
//! statistics the renderer and summary endpoints need. Remote access and
//! orchestration live elsewhere.

pub mod reduce;
pub mod stats;

pub use reduce::{anomaly, mean, mean_ignore_missing};
pub use stats::{finite_mean, finite_min_max, max_abs, percentile};
