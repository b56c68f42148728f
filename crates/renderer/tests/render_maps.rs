//! End-to-end rendering checks on synthetic grids.

use renderer::{render_anomaly, render_sst, RenderOptions};
use test_utils::{grid_with_missing, ramp_grid, uniform_grid, ymd};

fn opts(cell_px: usize) -> RenderOptions {
    RenderOptions { cell_px }
}

#[test]
fn sst_map_has_cell_block_dimensions() {
    let grid = ramp_grid(ymd(2023, 7, 15), 20.0, 4, 6);
    let map = render_sst(&grid, opts(8)).unwrap();
    assert_eq!(map.width, 6 * 8);
    assert_eq!(map.height, 4 * 8);
    assert_eq!(map.pixels.len(), map.width * map.height * 4);
}

#[test]
fn sst_range_is_percentile_based() {
    let grid = ramp_grid(ymd(2023, 7, 15), 0.0, 10, 10);
    let map = render_sst(&grid, opts(1)).unwrap();
    // Values run 0..99; the 5th/95th percentiles trim the tails.
    assert!(map.value_range.min > 0.0);
    assert!(map.value_range.max < 99.0);
    assert!(map.value_range.min < map.value_range.max);
}

#[test]
fn missing_cells_render_transparent() {
    let grid = grid_with_missing(ymd(2023, 7, 15), 21.0, 2, 2, &[3]);
    let map = render_sst(&grid, opts(1)).unwrap();

    // Flat index 3 is (lat 1, lon 1); with ascending latitudes the top
    // image row is the last latitude row, so it lands at image (0, 1).
    let alpha_at = |row: usize, col: usize| map.pixels[(row * map.width + col) * 4 + 3];
    assert_eq!(alpha_at(0, 1), 0);
    assert_eq!(alpha_at(0, 0), 255);
    assert_eq!(alpha_at(1, 0), 255);
}

#[test]
fn anomaly_scale_is_symmetric_and_zero_is_white() {
    let mut grid = uniform_grid(ymd(2023, 7, 15), 0.0, 1, 3);
    grid.values[0] = -2.0;
    grid.values[2] = 1.0;

    let map = render_anomaly(&grid, opts(1)).unwrap();
    assert_eq!(map.value_range.min, -2.0);
    assert_eq!(map.value_range.max, 2.0);

    // Middle cell is exactly zero anomaly: white.
    let p = 4; // (row 0, col 1)
    assert_eq!(&map.pixels[p..p + 4], &[255, 255, 255, 255]);
}

#[test]
fn flat_zero_anomaly_still_renders() {
    let grid = uniform_grid(ymd(2023, 7, 15), 0.0, 2, 2);
    let map = render_anomaly(&grid, opts(1)).unwrap();
    assert_eq!(map.value_range.min, -1.0);
    assert_eq!(map.value_range.max, 1.0);
}

#[test]
fn rendered_map_encodes_to_png() {
    let grid = ramp_grid(ymd(2023, 7, 15), 15.0, 8, 8);
    let png = render_sst(&grid, opts(4)).unwrap().to_png().unwrap();
    assert_eq!(&png[1..4], b"PNG");
}
