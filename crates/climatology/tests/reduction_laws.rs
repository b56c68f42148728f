//! Behavioral laws for the climatology reductions.

use climatology::{anomaly, finite_mean, mean};
use test_utils::{grid_with_missing, ramp_grid, uniform_grid, ymd};

#[test]
fn mean_over_valid_grids_is_cellwise_arithmetic_mean() {
    // Thirty "years" of the same shape, values 0.., 10.., 20.., ...
    let grids: Vec<_> = (0..30)
        .map(|y| ramp_grid(ymd(1991 + y, 7, 15), (y * 10) as f32, 4, 5))
        .collect();

    let m = mean(&grids).unwrap();

    // Cell k = mean over y of (10y + k) = 145 + k.
    for (k, v) in m.values.iter().enumerate() {
        let expected = 145.0 + k as f32;
        assert!(
            (v - expected).abs() < 1e-3,
            "cell {k}: got {v}, expected {expected}"
        );
    }
}

#[test]
fn anomaly_plus_climatology_reproduces_observed() {
    let observed = ramp_grid(ymd(2023, 7, 15), 20.0, 6, 8);
    let grids: Vec<_> = (0..30)
        .map(|y| ramp_grid(ymd(1991 + y, 7, 15), 18.0 + y as f32 * 0.1, 6, 8))
        .collect();
    let clim = mean(&grids).unwrap();

    let anom = anomaly(&observed, &clim).unwrap();

    for ((a, c), o) in anom
        .values
        .iter()
        .zip(clim.values.iter())
        .zip(observed.values.iter())
    {
        assert!((a + c - o).abs() < 1e-4, "round-trip law violated");
    }
}

#[test]
fn warm_observed_day_yields_positive_anomaly_mean() {
    // Observed mean 27.3 against a 26.1 climatology: anomaly mean ~ +1.2.
    let observed = uniform_grid(ymd(2023, 7, 15), 27.3, 5, 5);
    let clim = uniform_grid(ymd(2023, 7, 15), 26.1, 5, 5);

    let anom = anomaly(&observed, &clim).unwrap();
    let mean_anom = finite_mean(&anom.values).unwrap();
    assert!((mean_anom - 1.2).abs() < 1e-4);
}

#[test]
fn missing_cell_in_one_year_blanks_that_cell_only() {
    let a = uniform_grid(ymd(1991, 7, 15), 20.0, 3, 3);
    let b = grid_with_missing(ymd(1992, 7, 15), 22.0, 3, 3, &[4]);

    let m = mean(&[a, b]).unwrap();
    assert!(m.values[4].is_nan());
    for (k, v) in m.values.iter().enumerate() {
        if k != 4 {
            assert_eq!(*v, 21.0);
        }
    }
}
