//! Synthetic grids for tests.
//!
//! Builders here produce small fields on the fixed 0.25° layout so test
//! suites across the workspace agree on axes without fetching anything.

use chrono::NaiveDate;
use sst_common::Grid;

/// 0.25° axis starting at `first`, `n` points.
pub fn quarter_degree_axis(first: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| first + i as f64 * 0.25).collect()
}

/// A grid with every cell set to `value`.
pub fn uniform_grid(date: NaiveDate, value: f32, n_lat: usize, n_lon: usize) -> Grid {
    let values = vec![value; n_lat * n_lon];
    Grid::new(
        date,
        quarter_degree_axis(28.125, n_lat),
        quarter_degree_axis(120.125, n_lon),
        values,
    )
    .expect("valid test grid")
}

/// A grid whose cell (i, j) holds `base + (i * n_lon + j)`, useful for
/// checking elementwise arithmetic cell by cell.
pub fn ramp_grid(date: NaiveDate, base: f32, n_lat: usize, n_lon: usize) -> Grid {
    let values = (0..n_lat * n_lon).map(|k| base + k as f32).collect();
    Grid::new(
        date,
        quarter_degree_axis(28.125, n_lat),
        quarter_degree_axis(120.125, n_lon),
        values,
    )
    .expect("valid test grid")
}

/// A uniform grid with the listed flat indices replaced by NaN.
pub fn grid_with_missing(
    date: NaiveDate,
    value: f32,
    n_lat: usize,
    n_lon: usize,
    missing: &[usize],
) -> Grid {
    let mut g = uniform_grid(date, value, n_lat, n_lon);
    for &k in missing {
        g.values[k] = f32::NAN;
    }
    g
}

/// A grid where every cell is the missing-data marker.
pub fn all_missing_grid(date: NaiveDate, n_lat: usize, n_lon: usize) -> Grid {
    let values = vec![f32::NAN; n_lat * n_lon];
    Grid::new(
        date,
        quarter_degree_axis(28.125, n_lat),
        quarter_degree_axis(120.125, n_lon),
        values,
    )
    .expect("valid test grid")
}

/// Shorthand for test dates.
pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}
