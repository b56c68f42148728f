//! Elementwise reductions over equal-axis grids.

use sst_common::{Grid, SstError, SstResult};
use tracing::debug;

/// Elementwise mean across grids sharing identical coordinate axes.
///
/// Missing cells propagate: if any contributing grid has NaN at a cell,
/// the mean at that cell is NaN. A cell only gets a baseline when every
/// contributing year observed it; use [`mean_ignore_missing`] for the
/// NaN-aware variant.
///
/// The result keeps the date of the first grid; callers relabel it when
/// the mean stands for a calendar day rather than a specific date.
pub fn mean(grids: &[Grid]) -> SstResult<Grid> {
    let first = require_equal_axes(grids)?;

    let n = grids.len() as f32;
    let mut sums = vec![0.0f32; first.len()];
    for g in grids {
        for (acc, v) in sums.iter_mut().zip(g.values.iter()) {
            *acc += v;
        }
    }
    for acc in sums.iter_mut() {
        *acc /= n;
    }

    debug!(grids = grids.len(), cells = sums.len(), "Computed mean grid");
    Ok(Grid {
        date: first.date,
        lat: first.lat.clone(),
        lon: first.lon.clone(),
        values: sums,
    })
}

/// NaN-aware elementwise mean: each cell averages only the finite
/// contributions. A cell missing in every grid stays NaN.
pub fn mean_ignore_missing(grids: &[Grid]) -> SstResult<Grid> {
    let first = require_equal_axes(grids)?;

    let mut sums = vec![0.0f32; first.len()];
    let mut counts = vec![0u32; first.len()];
    for g in grids {
        for (k, v) in g.values.iter().enumerate() {
            if v.is_finite() {
                sums[k] += v;
                counts[k] += 1;
            }
        }
    }

    let values = sums
        .into_iter()
        .zip(counts)
        .map(|(s, c)| if c > 0 { s / c as f32 } else { f32::NAN })
        .collect();

    Ok(Grid {
        date: first.date,
        lat: first.lat.clone(),
        lon: first.lon.clone(),
        values,
    })
}

/// Observed minus climatology, elementwise.
///
/// Both grids must sample identical axes; a mismatch is an error rather
/// than an implicit alignment. The result carries the observed date.
pub fn anomaly(observed: &Grid, climatology: &Grid) -> SstResult<Grid> {
    if !observed.axes_match(climatology) {
        return Err(SstError::AxisMismatch(format!(
            "observed {}x{} vs climatology {}x{}",
            observed.lat.len(),
            observed.lon.len(),
            climatology.lat.len(),
            climatology.lon.len(),
        )));
    }

    let values = observed
        .values
        .iter()
        .zip(climatology.values.iter())
        .map(|(o, c)| o - c)
        .collect();

    Ok(Grid {
        date: observed.date,
        lat: observed.lat.clone(),
        lon: observed.lon.clone(),
        values,
    })
}

/// Check that the slice is non-empty and every grid shares the first
/// grid's axes; returns the first grid.
fn require_equal_axes(grids: &[Grid]) -> SstResult<&Grid> {
    let first = grids
        .first()
        .ok_or_else(|| SstError::Internal("cannot reduce zero grids".to_string()))?;

    for (i, g) in grids.iter().enumerate().skip(1) {
        if !first.axes_match(g) {
            return Err(SstError::AxisMismatch(format!(
                "grid {} has {}x{} axes, expected {}x{}",
                i,
                g.lat.len(),
                g.lon.len(),
                first.lat.len(),
                first.lon.len(),
            )));
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sst_common::Grid;

    fn grid(values: Vec<f32>) -> Grid {
        Grid::new(
            chrono::NaiveDate::from_ymd_opt(2023, 7, 15).unwrap(),
            vec![28.125, 28.375],
            vec![120.125, 120.375],
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_mean_empty_is_error() {
        // Zero contributors are the aggregator's job to report; the
        // reducer just refuses them.
        assert!(mean(&[]).is_err());
    }

    #[test]
    fn test_mean_propagates_nan() {
        let a = grid(vec![1.0, 2.0, 3.0, 4.0]);
        let b = grid(vec![3.0, f32::NAN, 5.0, 6.0]);
        let m = mean(&[a, b]).unwrap();
        assert_eq!(m.values[0], 2.0);
        assert!(m.values[1].is_nan());
        assert_eq!(m.values[2], 4.0);
    }

    #[test]
    fn test_mean_ignore_missing_uses_finite_cells() {
        let a = grid(vec![1.0, 2.0, f32::NAN, 4.0]);
        let b = grid(vec![3.0, f32::NAN, f32::NAN, 6.0]);
        let m = mean_ignore_missing(&[a, b]).unwrap();
        assert_eq!(m.values[0], 2.0);
        assert_eq!(m.values[1], 2.0); // only one contribution
        assert!(m.values[2].is_nan()); // missing everywhere
        assert_eq!(m.values[3], 5.0);
    }

    #[test]
    fn test_anomaly_subtraction() {
        let obs = grid(vec![20.0, 21.0, 22.0, 23.0]);
        let clim = grid(vec![19.0, 21.5, 20.0, 25.0]);
        let a = anomaly(&obs, &clim).unwrap();
        assert_eq!(a.values, vec![1.0, -0.5, 2.0, -2.0]);
        assert_eq!(a.date, obs.date);
    }

    #[test]
    fn test_anomaly_rejects_axis_mismatch() {
        let obs = grid(vec![20.0, 21.0, 22.0, 23.0]);
        let clim = Grid::new(
            obs.date,
            vec![30.125, 30.375],
            vec![120.125, 120.375],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert!(matches!(
            anomaly(&obs, &clim),
            Err(SstError::AxisMismatch(_))
        ));
    }

    #[test]
    fn test_mean_rejects_axis_mismatch() {
        let a = grid(vec![1.0, 2.0, 3.0, 4.0]);
        let b = Grid::new(
            a.date,
            vec![28.125, 28.625],
            vec![120.125, 120.375],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert!(matches!(mean(&[a, b]), Err(SstError::AxisMismatch(_))));
    }
}
