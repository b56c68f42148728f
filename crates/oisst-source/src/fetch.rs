//! The remote grid fetcher: cache, primary NCSS access, OPeNDAP fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use grid_cache::DailyGridCache;
use opendap_parser::parse_grid_response;
use sst_common::time::DataDay;
use sst_common::{Grid, SstError, SstResult};

use crate::dataset::{DatasetLocator, SourceConfig};
use crate::decode::decode_netcdf_subset;

/// HTTP client settings for the fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            // Subsets are small but the source can be slow on cold reads.
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a fetch: a grid, or absence for a day the source has no data
/// for.
pub type FetchOutcome = Option<Arc<Grid>>;

/// Fetches daily SST grids, memoized by date.
///
/// The cache is injected so multiple fetchers (or tests) can share or
/// isolate it. Population is single-flight per date: concurrent requests
/// for one day perform at most one remote read.
pub struct SstFetcher {
    client: reqwest::Client,
    locator: DatasetLocator,
    cache: Arc<DailyGridCache>,
}

impl SstFetcher {
    pub fn new(
        source: SourceConfig,
        cache: Arc<DailyGridCache>,
        config: FetcherConfig,
    ) -> SstResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SstError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            locator: DatasetLocator::new(source),
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<DailyGridCache> {
        &self.cache
    }

    /// Fetch the grid for a day.
    ///
    /// Returns `Ok(None)` when the source has no data for the day in the
    /// analysis window (including the all-missing case). Network,
    /// authentication and format failures of both access methods surface
    /// as a recoverable [`SstError::Fetch`]; the caller decides whether to
    /// skip or report.
    #[instrument(skip(self), fields(date = %day))]
    pub async fn fetch(&self, day: DataDay) -> SstResult<FetchOutcome> {
        let date = day.date();

        if let Some(grid) = self.cache.get(date).await {
            return Ok(Some(grid));
        }

        // Single-flight: whoever holds the guard fetches; everyone else
        // finds the cache populated on re-check.
        let _guard = self.cache.lock_date(date).await;
        if let Some(grid) = self.cache.get(date).await {
            return Ok(Some(grid));
        }

        let grid = match self.fetch_remote(day).await? {
            Some(grid) => grid,
            None => return Ok(None),
        };

        let grid = Arc::new(grid);
        self.cache.insert(date, grid.clone()).await;
        Ok(Some(grid))
    }

    /// Try both access methods in order.
    async fn fetch_remote(&self, day: DataDay) -> SstResult<Option<Grid>> {
        let primary_err = match self.fetch_ncss(day).await {
            Ok(grid) => return Ok(self.screen_missing(grid)),
            Err(e) => e,
        };

        warn!(error = %primary_err, "Primary subset access failed, trying OPeNDAP");

        match self.fetch_opendap(day).await {
            Ok(grid) => Ok(self.screen_missing(grid)),
            Err(fallback_err) => Err(SstError::Fetch {
                date: day.date(),
                detail: format!("ncss: {primary_err}; opendap: {fallback_err}"),
            }),
        }
    }

    /// An all-missing subset is absence, never a grid.
    fn screen_missing(&self, grid: Grid) -> Option<Grid> {
        if grid.is_all_missing() {
            info!(date = %grid.date, "Subset contains no valid cells, treating as absence");
            None
        } else {
            Some(grid)
        }
    }

    async fn fetch_ncss(&self, day: DataDay) -> SstResult<Grid> {
        let url = self.locator.ncss_request(day);
        debug!(%url, "Requesting NCSS subset");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SstError::Fetch {
                date: day.date(),
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SstError::Fetch {
                date: day.date(),
                detail: format!("HTTP {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SstError::Fetch {
            date: day.date(),
            detail: format!("failed to read response body: {e}"),
        })?;

        decode_netcdf_subset(
            &bytes,
            day.date(),
            &self.locator.config().variable,
            &self.locator.config().packing,
        )
    }

    async fn fetch_opendap(&self, day: DataDay) -> SstResult<Grid> {
        let url = self.locator.opendap_request(day)?;
        debug!(%url, "Requesting OPeNDAP ASCII subset");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SstError::Fetch {
                date: day.date(),
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SstError::Fetch {
                date: day.date(),
                detail: format!("HTTP {status}"),
            });
        }

        let text = response.text().await.map_err(|e| SstError::Fetch {
            date: day.date(),
            detail: format!("failed to read response body: {e}"),
        })?;

        let ascii = parse_grid_response(&text, &self.locator.config().variable)
            .map_err(|e| SstError::Parse(e.to_string()))?;

        let packing = &self.locator.config().packing;
        let values: Vec<f32> = ascii.values.iter().map(|&v| packing.unpack(v)).collect();

        Grid::new(day.date(), ascii.lat, ascii.lon, values)
            .ok_or_else(|| SstError::Parse("inconsistent OPeNDAP subset axes".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use test_utils::{uniform_grid, ymd};

    fn day(y: i32, m: u32, d: u32) -> DataDay {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DataDay::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), today).unwrap()
    }

    fn fetcher_with_unroutable_source() -> SstFetcher {
        // A reserved-for-documentation host: requests fail fast without
        // touching a real service.
        let source = SourceConfig {
            ncss_url: "http://192.0.2.1/ncss/sst.day.mean.{year}.nc".to_string(),
            opendap_url: "http://192.0.2.1/dodsC/sst.day.mean.{year}.nc".to_string(),
            ..SourceConfig::default()
        };
        let config = FetcherConfig {
            request_timeout: Duration::from_millis(300),
            connect_timeout: Duration::from_millis(300),
        };
        SstFetcher::new(source, Arc::new(DailyGridCache::new(8)), config).unwrap()
    }

    #[tokio::test]
    async fn test_cached_grid_short_circuits_remote() {
        let fetcher = fetcher_with_unroutable_source();
        let d = day(2023, 7, 15);

        fetcher
            .cache()
            .insert(d.date(), Arc::new(uniform_grid(d.date(), 21.0, 2, 2)))
            .await;

        // The source is unroutable, so success proves the cache served it.
        let grid = fetcher.fetch(d).await.unwrap().unwrap();
        assert_eq!(grid.values[0], 21.0);
    }

    #[tokio::test]
    async fn test_both_methods_failing_is_recoverable_fetch_error() {
        let fetcher = fetcher_with_unroutable_source();
        let err = fetcher.fetch(day(2023, 7, 15)).await.unwrap_err();
        match &err {
            SstError::Fetch { detail, .. } => {
                assert!(detail.contains("ncss"));
                assert!(detail.contains("opendap"));
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
        assert!(err.is_absence());
        assert!(err.user_hint().is_some());
    }

    #[test]
    fn test_all_missing_screened_to_absence() {
        let fetcher = fetcher_with_unroutable_source();
        let grid = test_utils::all_missing_grid(ymd(2023, 7, 15), 3, 3);
        assert!(fetcher.screen_missing(grid).is_none());

        let grid = uniform_grid(ymd(2023, 7, 15), 20.0, 3, 3);
        assert!(fetcher.screen_missing(grid).is_some());
    }
}
