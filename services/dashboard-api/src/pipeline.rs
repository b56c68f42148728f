//! The per-request pipeline: observed day, 30-year baseline, anomaly.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{info, instrument, warn};

use climatology::{anomaly, mean, mean_ignore_missing};
use sst_common::time::{DataDay, DateKey};
use sst_common::{Grid, SstError, SstResult};

use crate::state::AppState;

/// User-visible notice emitted when the leap-day policy fires.
pub const LEAP_DAY_NOTICE: &str =
    "No climatology is published for February 29; the February 28 baseline is shown instead.";

/// Outcome of the climatology aggregation for one calendar day.
pub struct ClimatologyOutcome {
    /// The mean grid, or None when no year contributed.
    pub grid: Option<Grid>,
    pub contributing_years: Vec<i32>,
    pub skipped_years: Vec<i32>,
}

impl ClimatologyOutcome {
    pub fn is_available(&self) -> bool {
        self.grid.is_some()
    }
}

/// Everything the anomaly endpoints need from one pipeline run.
pub struct AnomalyOutcome {
    pub observed: Arc<Grid>,
    pub climatology: ClimatologyOutcome,
    /// None when the climatology was unavailable; the observed product
    /// still stands on its own.
    pub anomaly: Option<Grid>,
    pub notices: Vec<String>,
}

/// Fetch the observed grid for a day. `Ok(None)` is absence.
#[instrument(skip(state), fields(date = %day))]
pub async fn observed(state: &AppState, day: DataDay) -> SstResult<Option<Arc<Grid>>> {
    counter!("pipeline_observed_fetches_total").increment(1);
    state.fetcher.fetch(day).await
}

/// Aggregate the climatology baseline for a calendar day.
///
/// Each window year is fetched through the shared fetcher/cache; years
/// with no data (absence or a recoverable fetch failure, and non-leap
/// years for a raw February 29 key) are skipped without failing the run.
/// Zero contributors yield an outcome with no grid; the caller reports
/// that as "climatology unavailable", never as a fault.
#[instrument(skip(state), fields(key = %key))]
pub async fn climatology_for(state: &AppState, key: DateKey) -> SstResult<ClimatologyOutcome> {
    let window = state.config.climatology.window();
    let today = state.today();

    let mut targets: Vec<(i32, DataDay)> = Vec::with_capacity(window.len());
    let mut skipped_years = Vec::new();

    for year in window.years() {
        let Some(date) = key.in_year(year) else {
            info!(year, "Calendar day does not exist in this year, skipping");
            skipped_years.push(year);
            continue;
        };
        match DataDay::new(date, today) {
            Ok(day) => targets.push((year, day)),
            Err(e) => {
                warn!(year, error = %e, "Window year outside coverage, skipping");
                skipped_years.push(year);
            }
        }
    }

    let concurrency = state.config.climatology.concurrency.max(1);
    let fetched: Vec<(i32, SstResult<Option<Arc<Grid>>>)> = if concurrency <= 1 {
        let mut out = Vec::with_capacity(targets.len());
        for (year, day) in targets {
            info!(year, %key, "Loading baseline day");
            let result = state.fetcher.fetch(day).await;
            out.push((year, result));
        }
        out
    } else {
        stream::iter(targets)
            .map(|(year, day)| async move {
                info!(year, %key, "Loading baseline day");
                (year, state.fetcher.fetch(day).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    };

    let mut contributions: Vec<(i32, Grid)> = Vec::with_capacity(fetched.len());
    for (year, result) in fetched {
        match result {
            Ok(Some(grid)) => contributions.push((year, (*grid).clone())),
            Ok(None) => {
                info!(year, "No data for baseline day, skipping year");
                skipped_years.push(year);
            }
            Err(e) if e.is_absence() => {
                warn!(year, error = %e, "Baseline fetch failed, skipping year");
                counter!("pipeline_climatology_years_failed_total").increment(1);
                skipped_years.push(year);
            }
            Err(e) => return Err(e),
        }
    }

    // Deterministic reduction order: with concurrent fetches enabled the
    // completion order varies, and float summation is order-sensitive.
    contributions.sort_by_key(|(year, _)| *year);
    skipped_years.sort_unstable();

    let contributing_years: Vec<i32> = contributions.iter().map(|(y, _)| *y).collect();
    let grids: Vec<Grid> = contributions.into_iter().map(|(_, g)| g).collect();

    if grids.is_empty() {
        warn!(%key, window = %window, "No climatology year yielded data");
        counter!("pipeline_climatology_unavailable_total").increment(1);
        return Ok(ClimatologyOutcome {
            grid: None,
            contributing_years,
            skipped_years,
        });
    }

    let reduced = if state.config.climatology.nan_aware_mean {
        mean_ignore_missing(&grids)?
    } else {
        mean(&grids)?
    };

    info!(
        %key,
        contributing = contributing_years.len(),
        skipped = skipped_years.len(),
        "Computed climatology baseline"
    );

    Ok(ClimatologyOutcome {
        grid: Some(reduced),
        contributing_years,
        skipped_years,
    })
}

/// Run the full pipeline for a day: observed, baseline, anomaly.
///
/// Fails only when the observed day itself is unfetchable or absent; an
/// unavailable climatology degrades to `anomaly: None` with the outcome
/// carrying the explanation.
pub async fn anomaly_product(state: &AppState, day: DataDay) -> SstResult<AnomalyOutcome> {
    counter!("pipeline_runs_total").increment(1);

    let observed_grid = observed(state, day)
        .await?
        .ok_or(SstError::NoData { date: day.date() })?;

    let mut notices = Vec::new();
    let (key, leap_policy_fired) = day.to_key().normalized();
    if leap_policy_fired {
        notices.push(LEAP_DAY_NOTICE.to_string());
    }

    let climatology_outcome = climatology_for(state, key).await?;

    let anomaly_grid = match &climatology_outcome.grid {
        Some(baseline) => Some(anomaly(&observed_grid, baseline)?),
        None => {
            notices.push(format!(
                "No climatology could be computed for {key}; anomaly is unavailable."
            ));
            None
        }
    };

    Ok(AnomalyOutcome {
        observed: observed_grid,
        climatology: climatology_outcome,
        anomaly: anomaly_grid,
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClimatologySection, ServiceConfig, SourceSection};

    /// State whose source is unroutable: every remote fetch fails fast.
    fn offline_state(start_year: i32, end_year: i32) -> AppState {
        let config = ServiceConfig {
            source: SourceSection {
                ncss_url: "http://192.0.2.1/ncss/sst.day.mean.{year}.nc".to_string(),
                opendap_url: "http://192.0.2.1/dodsC/sst.day.mean.{year}.nc".to_string(),
                request_timeout_secs: 1,
                connect_timeout_secs: 1,
                ..SourceSection::default()
            },
            climatology: ClimatologySection {
                start_year,
                end_year,
                ..ClimatologySection::default()
            },
            ..ServiceConfig::default()
        };
        AppState::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_all_years_failing_is_absence_not_fault() {
        let state = offline_state(1991, 1992);
        let outcome = climatology_for(&state, DateKey::new(7, 15)).await.unwrap();
        assert!(!outcome.is_available());
        assert!(outcome.contributing_years.is_empty());
        assert_eq!(outcome.skipped_years, vec![1991, 1992]);
    }

    #[tokio::test]
    async fn test_cached_years_feed_climatology_without_network() {
        let state = offline_state(1991, 1993);
        let key = DateKey::new(7, 15);

        // Pre-populate the injected cache; the pipeline must use it
        // instead of the (unroutable) remote source.
        for year in 1991..=1993 {
            let date = key.in_year(year).unwrap();
            state
                .cache
                .insert(
                    date,
                    Arc::new(test_utils::uniform_grid(date, 20.0 + (year - 1991) as f32, 2, 2)),
                )
                .await;
        }

        let outcome = climatology_for(&state, key).await.unwrap();
        assert_eq!(outcome.contributing_years, vec![1991, 1992, 1993]);
        let grid = outcome.grid.unwrap();
        // mean of 20, 21, 22
        assert!((grid.values[0] - 21.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_leap_day_key_skips_non_leap_years() {
        let state = offline_state(1999, 2001);
        let key = DateKey::new(2, 29);

        // Only 2000 has a February 29; cache it so it contributes.
        let date = key.in_year(2000).unwrap();
        state
            .cache
            .insert(date, Arc::new(test_utils::uniform_grid(date, 10.0, 2, 2)))
            .await;

        let outcome = climatology_for(&state, key).await.unwrap();
        assert_eq!(outcome.contributing_years, vec![2000]);
        assert!(outcome.skipped_years.contains(&1999));
        assert!(outcome.skipped_years.contains(&2001));
    }

    #[tokio::test]
    async fn test_leap_day_pipeline_normalizes_and_notices() {
        let state = offline_state(1991, 1992);
        let today = state.today();
        let observed_date = key_date(2020, 2, 29);

        // Observed day is the real February 29; the baseline is built
        // from February 28 of the window years.
        state
            .cache
            .insert(
                observed_date,
                Arc::new(test_utils::uniform_grid(observed_date, 12.0, 2, 2)),
            )
            .await;
        for year in 1991..=1992 {
            let date = key_date(year, 2, 28);
            state
                .cache
                .insert(date, Arc::new(test_utils::uniform_grid(date, 10.0, 2, 2)))
                .await;
        }

        let day = DataDay::new(observed_date, today).unwrap();
        let outcome = anomaly_product(&state, day).await.unwrap();

        assert!(outcome.notices.iter().any(|n| n == LEAP_DAY_NOTICE));
        assert_eq!(outcome.climatology.contributing_years, vec![1991, 1992]);

        let anomaly_grid = outcome.anomaly.unwrap();
        assert!((anomaly_grid.values[0] - 2.0).abs() < 1e-6);
    }

    fn key_date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_fanout_matches_sequential_values() {
        let key = DateKey::new(7, 15);

        let build = |concurrency: usize| {
            let mut state = offline_state(1991, 1994);
            state.config.climatology.concurrency = concurrency;
            state
        };

        let mut results = Vec::new();
        for concurrency in [1usize, 4] {
            let state = build(concurrency);
            for year in 1991..=1994 {
                let date = key.in_year(year).unwrap();
                state
                    .cache
                    .insert(
                        date,
                        Arc::new(test_utils::ramp_grid(date, year as f32 * 0.1, 3, 3)),
                    )
                    .await;
            }
            let outcome = climatology_for(&state, key).await.unwrap();
            results.push(outcome.grid.unwrap().values);
        }

        // Bounded fan-out changes latency, never the output values.
        assert_eq!(results[0], results[1]);
    }
}
