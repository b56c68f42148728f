//! Yearly dataset resolution: URL templates, packing, and index math for
//! the fixed 0.25° global layout.

use sst_common::bbox::{BoundingBox, KOREA_EAST_CHINA_SEA};
use sst_common::time::DataDay;
use sst_common::SstError;

/// CF packing parameters for the `sst` variable.
///
/// The OPeNDAP ASCII path serves raw packed shorts, so these are applied
/// client-side. The NetCDF path prefers the attributes carried by the
/// subset itself and only needs the fill value here as a last resort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SstPacking {
    pub scale_factor: f32,
    pub add_offset: f32,
    pub fill_value: f64,
}

impl Default for SstPacking {
    fn default() -> Self {
        Self {
            scale_factor: 0.01,
            add_offset: 0.0,
            fill_value: -999.0,
        }
    }
}

impl SstPacking {
    /// Unpack one raw value; the fill marker becomes NaN.
    pub fn unpack(&self, raw: f64) -> f32 {
        if (raw - self.fill_value).abs() < 0.5 || raw.is_nan() {
            f32::NAN
        } else {
            raw as f32 * self.scale_factor + self.add_offset
        }
    }
}

/// The regular lat/lon layout of the yearly files.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    /// First (southernmost) latitude sample.
    pub first_lat: f64,
    /// First (westernmost) longitude sample.
    pub first_lon: f64,
    /// Grid step in degrees, positive.
    pub step: f64,
    pub n_lat: usize,
    pub n_lon: usize,
}

impl GridLayout {
    /// OISST v2 high resolution: 0.25°, lat −89.875..89.875 ascending,
    /// lon 0.125..359.875.
    pub fn oisst_quarter_degree() -> Self {
        Self {
            first_lat: -89.875,
            first_lon: 0.125,
            step: 0.25,
            n_lat: 720,
            n_lon: 1440,
        }
    }

    /// Inclusive index range [first, last] of axis samples inside
    /// [min, max], or None when the interval contains no sample.
    fn axis_range(first: f64, step: f64, n: usize, min: f64, max: f64) -> Option<(usize, usize)> {
        let lo = ((min - first) / step).ceil().max(0.0) as usize;
        let hi_f = ((max - first) / step).floor();
        if hi_f < 0.0 {
            return None;
        }
        let hi = (hi_f as usize).min(n - 1);
        if lo > hi {
            return None;
        }
        Some((lo, hi))
    }

    /// Index ranges covering the samples inside `bbox`.
    pub fn index_ranges(&self, bbox: &BoundingBox) -> Option<IndexRanges> {
        let (lat_first, lat_last) = Self::axis_range(
            self.first_lat,
            self.step,
            self.n_lat,
            bbox.min_lat,
            bbox.max_lat,
        )?;
        let (lon_first, lon_last) = Self::axis_range(
            self.first_lon,
            self.step,
            self.n_lon,
            bbox.min_lon,
            bbox.max_lon,
        )?;
        Some(IndexRanges {
            lat_first,
            lat_last,
            lon_first,
            lon_last,
        })
    }

    /// Coordinate of a latitude index.
    pub fn lat_at(&self, i: usize) -> f64 {
        self.first_lat + i as f64 * self.step
    }

    /// Coordinate of a longitude index.
    pub fn lon_at(&self, j: usize) -> f64 {
        self.first_lon + j as f64 * self.step
    }
}

/// Inclusive subset index ranges on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRanges {
    pub lat_first: usize,
    pub lat_last: usize,
    pub lon_first: usize,
    pub lon_last: usize,
}

/// Where the yearly datasets live and how to subset them.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// NCSS endpoint template; `{year}` is substituted.
    pub ncss_url: String,
    /// OPeNDAP endpoint template; `{year}` is substituted.
    pub opendap_url: String,
    /// Data variable name.
    pub variable: String,
    /// Analysis window; every fetched grid is restricted to it.
    pub bbox: BoundingBox,
    /// Packing applied to raw OPeNDAP values.
    pub packing: SstPacking,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ncss_url: "https://psl.noaa.gov/thredds/ncss/Datasets/noaa.oisst.v2.highres/sst.day.mean.{year}.nc".to_string(),
            opendap_url: "https://psl.noaa.gov/thredds/dodsC/Datasets/noaa.oisst.v2.highres/sst.day.mean.{year}.nc".to_string(),
            variable: "sst".to_string(),
            bbox: KOREA_EAST_CHINA_SEA,
            packing: SstPacking::default(),
        }
    }
}

/// Resolves a day to the concrete request URLs for both access methods.
#[derive(Debug, Clone)]
pub struct DatasetLocator {
    config: SourceConfig,
    layout: GridLayout,
}

impl DatasetLocator {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            layout: GridLayout::oisst_quarter_degree(),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// NCSS subset request URL for a day: server-side bbox + time subset,
    /// NetCDF response.
    pub fn ncss_request(&self, day: DataDay) -> String {
        let base = self.config.ncss_url.replace("{year}", &day.year().to_string());
        let b = &self.config.bbox;
        format!(
            "{base}?var={var}&north={n}&south={s}&west={w}&east={e}&horizStride=1&time={day}T12:00:00Z&accept=netcdf",
            var = self.config.variable,
            n = b.max_lat,
            s = b.min_lat,
            w = b.min_lon,
            e = b.max_lon,
        )
    }

    /// OPeNDAP ASCII constraint URL for a day, or an error when the
    /// analysis window misses the dataset layout entirely.
    pub fn opendap_request(&self, day: DataDay) -> Result<String, SstError> {
        let ranges = self.layout.index_ranges(&self.config.bbox).ok_or_else(|| {
            SstError::Config(format!(
                "bounding box {} selects no grid cells",
                self.config.bbox.cache_key()
            ))
        })?;
        let base = self
            .config
            .opendap_url
            .replace("{year}", &day.year().to_string());
        Ok(format!(
            "{base}.ascii?{var}[{t}][{lat0}:{lat1}][{lon0}:{lon1}]",
            var = self.config.variable,
            t = day.day_index(),
            lat0 = ranges.lat_first,
            lat1 = ranges.lat_last,
            lon0 = ranges.lon_first,
            lon1 = ranges.lon_last,
        ))
    }
}
