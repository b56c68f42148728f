//! Map rendering for SST grids.
//!
//! Turns a grid into a colored RGBA image: a sequential heat ramp for
//! observed temperature (color range from the 5th–95th percentile of the
//! finite values) and a diverging ramp centered at zero for anomalies.
//! Output is PNG, encoded directly with flate2 + crc32fast.

pub mod gradient;
pub mod png;

pub use gradient::{render_anomaly, render_sst, Color, RenderOptions, RenderedMap};

use thiserror::Error;

/// Error types for rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot render an empty grid")]
    EmptyGrid,

    #[error("Grid has no finite values to scale against")]
    NoFiniteValues,

    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),
}
