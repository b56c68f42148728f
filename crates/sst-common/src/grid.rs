//! The in-memory SST grid type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tolerance for coordinate-axis equality, in degrees.
///
/// Both access methods subset the same fixed 0.25° layout, so matching
/// axes agree to well below this.
pub const AXIS_TOLERANCE: f64 = 1e-6;

/// A 2-D SST field over a regular lat/lon grid, for a single day.
///
/// Values are degrees Celsius, row-major with latitude as the outer
/// dimension, missing data as NaN. Coordinate vectors hold the actual
/// sample points (degrees, ascending) so axis equality can be checked
/// against them rather than assumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// The day this field is valid for.
    pub date: NaiveDate,
    /// Latitude sample points, ascending.
    pub lat: Vec<f64>,
    /// Longitude sample points, ascending.
    pub lon: Vec<f64>,
    /// Row-major values, `lat.len() * lon.len()` entries.
    pub values: Vec<f32>,
}

impl Grid {
    /// Assemble a grid, validating that the value count matches the axes.
    pub fn new(date: NaiveDate, lat: Vec<f64>, lon: Vec<f64>, values: Vec<f32>) -> Option<Self> {
        if lat.is_empty() || lon.is_empty() || values.len() != lat.len() * lon.len() {
            return None;
        }
        Some(Self {
            date,
            lat,
            lon,
            values,
        })
    }

    /// (rows, cols) = (latitude count, longitude count).
    pub fn shape(&self) -> (usize, usize) {
        (self.lat.len(), self.lon.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at (lat index, lon index).
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.lat.len() || j >= self.lon.len() {
            return None;
        }
        Some(self.values[i * self.lon.len() + j])
    }

    /// True when every cell is the missing-data marker.
    ///
    /// Callers treat such a subset as absence; an all-missing grid must
    /// never reach the renderer.
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }

    /// Check that both grids sample identical coordinate axes, in the
    /// same order, within [`AXIS_TOLERANCE`].
    pub fn axes_match(&self, other: &Grid) -> bool {
        axes_equal(&self.lat, &other.lat) && axes_equal(&self.lon, &other.lon)
    }
}

fn axes_equal(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= AXIS_TOLERANCE)
}
