//! Service configuration.
//!
//! Loaded from an optional YAML file; every section has defaults so the
//! service runs against the public OISST source with no file at all.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use oisst_source::{FetcherConfig, SourceConfig, SstPacking};
use sst_common::bbox::KOREA_EAST_CHINA_SEA;
use sst_common::time::DEFAULT_CLIMATOLOGY_WINDOW;
use sst_common::{BoundingBox, ClimatologyWindow};

/// Root service configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub climatology: ClimatologySection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub render: RenderSection,
}

/// Remote dataset location and packing.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    #[serde(default = "default_ncss_url")]
    pub ncss_url: String,
    #[serde(default = "default_opendap_url")]
    pub opendap_url: String,
    #[serde(default = "default_variable")]
    pub variable: String,
    /// "min_lon,min_lat,max_lon,max_lat"; defaults to the Korea / East
    /// China Sea analysis window.
    #[serde(default)]
    pub bbox: Option<String>,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,
    #[serde(default)]
    pub add_offset: f32,
    #[serde(default = "default_fill_value")]
    pub fill_value: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_ncss_url() -> String {
    SourceConfig::default().ncss_url
}

fn default_opendap_url() -> String {
    SourceConfig::default().opendap_url
}

fn default_variable() -> String {
    "sst".to_string()
}

fn default_scale_factor() -> f32 {
    0.01
}

fn default_fill_value() -> f64 {
    -999.0
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            ncss_url: default_ncss_url(),
            opendap_url: default_opendap_url(),
            variable: default_variable(),
            bbox: None,
            scale_factor: default_scale_factor(),
            add_offset: 0.0,
            fill_value: default_fill_value(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl SourceSection {
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        match &self.bbox {
            None => Ok(KOREA_EAST_CHINA_SEA),
            Some(s) => BoundingBox::from_param(s).context("invalid source.bbox"),
        }
    }

    pub fn to_source_config(&self) -> Result<SourceConfig> {
        Ok(SourceConfig {
            ncss_url: self.ncss_url.clone(),
            opendap_url: self.opendap_url.clone(),
            variable: self.variable.clone(),
            bbox: self.bounding_box()?,
            packing: SstPacking {
                scale_factor: self.scale_factor,
                add_offset: self.add_offset,
                fill_value: self.fill_value,
            },
        })
    }

    pub fn to_fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

/// Climatology window and reduction behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ClimatologySection {
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
    /// Per-cell NaN-aware mean instead of the propagating default.
    #[serde(default)]
    pub nan_aware_mean: bool,
    /// Concurrent per-year fetches; 1 keeps the loop strictly
    /// sequential. Output values are identical either way.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_start_year() -> i32 {
    DEFAULT_CLIMATOLOGY_WINDOW.start_year
}

fn default_end_year() -> i32 {
    DEFAULT_CLIMATOLOGY_WINDOW.end_year
}

fn default_concurrency() -> usize {
    1
}

impl Default for ClimatologySection {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
            nan_aware_mean: false,
            concurrency: default_concurrency(),
        }
    }
}

impl ClimatologySection {
    pub fn window(&self) -> ClimatologyWindow {
        ClimatologyWindow {
            start_year: self.start_year,
            end_year: self.end_year,
        }
    }
}

/// Daily grid cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    grid_cache::DEFAULT_CAPACITY
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Map rendering knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
    /// Square pixels per grid cell.
    #[serde(default = "default_cell_px")]
    pub cell_px: usize,
}

fn default_cell_px() -> usize {
    8
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            cell_px: default_cell_px(),
        }
    }
}

impl ServiceConfig {
    /// Load from a YAML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => {
                debug!("No config file given, using defaults");
                ServiceConfig::default()
            }
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
        };

        info!(
            window = %config.climatology.window(),
            concurrency = config.climatology.concurrency,
            cache_capacity = config.cache.capacity,
            "Loaded service configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.climatology.window(), DEFAULT_CLIMATOLOGY_WINDOW);
        assert_eq!(config.climatology.concurrency, 1);
        assert!(!config.climatology.nan_aware_mean);
        assert_eq!(config.source.bounding_box().unwrap(), KOREA_EAST_CHINA_SEA);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
source:
  ncss_url: "http://localhost:8080/ncss/sst.day.mean.{year}.nc"
  bbox: "120.0,28.0,135.0,42.0"
climatology:
  start_year: 1991
  end_year: 2020
  concurrency: 4
cache:
  capacity: 128
render:
  cell_px: 4
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.source.ncss_url.starts_with("http://localhost"));
        assert_eq!(config.climatology.concurrency, 4);
        assert_eq!(config.cache.capacity, 128);
        assert_eq!(config.render.cell_px, 4);
        // Untouched fields keep their defaults.
        assert_eq!(config.source.scale_factor, 0.01);
    }

    #[test]
    fn test_invalid_bbox_rejected() {
        let section = SourceSection {
            bbox: Some("not,a,box".to_string()),
            ..SourceSection::default()
        };
        assert!(section.bounding_box().is_err());
    }
}
