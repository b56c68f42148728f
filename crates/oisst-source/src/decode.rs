//! Decoding of NCSS NetCDF subset responses into grids.
//!
//! The netcdf library wraps libnetcdf/HDF5, which need a file handle, so
//! response bytes are written to a temp file first. On Linux the
//! memory-backed `/dev/shm` is preferred to keep the round trip cheap.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

use sst_common::{Grid, SstError};

use crate::dataset::SstPacking;

/// Decode a NetCDF subset into a grid for `date`.
///
/// Coordinates come from the file's `lat`/`lon` variables. Scale/offset
/// attributes on the data variable are applied when present (the subset
/// server may serve packed shorts or already-unpacked floats); the fill
/// value falls back to the configured packing.
pub fn decode_netcdf_subset(
    bytes: &[u8],
    date: NaiveDate,
    var_name: &str,
    packing: &SstPacking,
) -> Result<Grid, SstError> {
    let temp_file = temp_dir().join(temp_filename());

    let mut file = std::fs::File::create(&temp_file)?;
    file.write_all(bytes)?;
    drop(file);

    let result = decode_file(&temp_file, date, var_name, packing);
    let _ = std::fs::remove_file(&temp_file);
    result
}

fn decode_file(
    path: &std::path::Path,
    date: NaiveDate,
    var_name: &str,
    packing: &SstPacking,
) -> Result<Grid, SstError> {
    let nc = netcdf::open(path)
        .map_err(|e| SstError::Decode(format!("failed to open NetCDF subset: {e}")))?;

    let n_lat = nc
        .dimension("lat")
        .ok_or_else(|| SstError::Decode("missing lat dimension".to_string()))?
        .len();
    let n_lon = nc
        .dimension("lon")
        .ok_or_else(|| SstError::Decode("missing lon dimension".to_string()))?
        .len();

    let lat: Vec<f64> = nc
        .variable("lat")
        .ok_or_else(|| SstError::Decode("missing lat variable".to_string()))?
        .get_values(..)
        .map_err(|e| SstError::Decode(format!("failed to read lat: {e}")))?;
    let lon: Vec<f64> = nc
        .variable("lon")
        .ok_or_else(|| SstError::Decode("missing lon variable".to_string()))?
        .get_values(..)
        .map_err(|e| SstError::Decode(format!("failed to read lon: {e}")))?;

    let var = nc
        .variable(var_name)
        .ok_or_else(|| SstError::Decode(format!("missing {var_name} variable")))?;

    let raw: Vec<f64> = var
        .get_values(..)
        .map_err(|e| SstError::Decode(format!("failed to read {var_name}: {e}")))?;

    // A single time step may or may not be present as a leading dimension.
    if raw.len() != n_lat * n_lon {
        return Err(SstError::Decode(format!(
            "unexpected value count {} for {}x{} subset",
            raw.len(),
            n_lat,
            n_lon
        )));
    }

    let scale = get_f64_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(&var, "add_offset").unwrap_or(0.0);
    let fill = get_f64_attr(&var, "_FillValue")
        .or_else(|| get_f64_attr(&var, "missing_value"))
        .unwrap_or(packing.fill_value);

    let values: Vec<f32> = raw
        .iter()
        .map(|&v| {
            if v.is_nan() || (v - fill).abs() < 0.5 {
                f32::NAN
            } else {
                (v * scale + offset) as f32
            }
        })
        .collect();

    debug!(n_lat, n_lon, scale, offset, "Decoded NetCDF subset");

    let grid = Grid::new(date, lat, lon, values)
        .ok_or_else(|| SstError::Decode("inconsistent subset axes".to_string()))?;
    Ok(normalize_ascending(grid))
}

/// Flip the latitude axis (and rows) when the file stores north-to-south.
fn normalize_ascending(mut grid: Grid) -> Grid {
    let (n_lat, n_lon) = grid.shape();
    if n_lat > 1 && grid.lat[0] > grid.lat[n_lat - 1] {
        grid.lat.reverse();
        let mut flipped = Vec::with_capacity(grid.values.len());
        for i in (0..n_lat).rev() {
            flipped.extend_from_slice(&grid.values[i * n_lon..(i + 1) * n_lon]);
        }
        grid.values = flipped;
    }
    grid
}

/// Get the optimal temp directory for NetCDF file operations.
///
/// On Linux, uses /dev/shm (memory-backed tmpfs) if available; falls back
/// to the system temp directory.
fn temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = std::path::Path::new("/dev/shm");
        if shm.is_dir() {
            let probe = shm.join(format!(".sst_probe_{}", std::process::id()));
            if std::fs::write(&probe, b"probe").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return shm.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

/// Unique temp file name for concurrent safety.
fn temp_filename() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("oisst_subset_{pid}_{count}.nc")
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

// Numeric attribute lookup via TryFrom, tolerant of the on-disk type.
fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ymd;

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        let err = decode_netcdf_subset(b"not netcdf", ymd(2023, 7, 15), "sst", &SstPacking::default())
            .unwrap_err();
        assert!(matches!(err, SstError::Decode(_)));
    }

    #[test]
    fn test_normalize_flips_descending_latitude() {
        let grid = Grid::new(
            ymd(2023, 7, 15),
            vec![28.375, 28.125],
            vec![120.125, 120.375],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        // Axis stored north-to-south; normalized to ascending.
        let fixed = normalize_ascending(grid);
        assert_eq!(fixed.lat, vec![28.125, 28.375]);
        assert_eq!(fixed.values, vec![3.0, 4.0, 1.0, 2.0]);
    }
}
