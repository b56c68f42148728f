//! Shared application state.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};

use grid_cache::DailyGridCache;
use oisst_source::SstFetcher;

use crate::config::ServiceConfig;

/// State shared by all handlers: the fetcher (with its injected cache)
/// and the loaded configuration.
pub struct AppState {
    pub config: ServiceConfig,
    pub cache: Arc<DailyGridCache>,
    pub fetcher: SstFetcher,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let cache = Arc::new(DailyGridCache::new(config.cache.capacity));
        let fetcher = SstFetcher::new(
            config.source.to_source_config()?,
            cache.clone(),
            config.source.to_fetcher_config(),
        )?;

        Ok(Self {
            config,
            cache,
            fetcher,
        })
    }

    /// The reference "today" for coverage validation.
    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
