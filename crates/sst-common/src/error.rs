//! Error types for the SST dashboard services.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using SstError.
pub type SstResult<T> = Result<T, SstError>;

/// Primary error type for SST pipeline operations.
#[derive(Debug, Error)]
pub enum SstError {
    // === Input validation ===
    #[error("Date {date} is outside dataset coverage ({min} to {max})")]
    DateOutOfRange {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    // === Remote access ===
    #[error("Failed to fetch SST data for {date}: {detail}")]
    Fetch { date: NaiveDate, detail: String },

    #[error("No SST data available for {date} in the requested region")]
    NoData { date: NaiveDate },

    #[error("No climatology year yielded data for {month:02}-{day:02}")]
    ClimatologyUnavailable { month: u32, day: u32 },

    // === Data errors ===
    #[error("Grid coordinate axes do not match: {0}")]
    AxisMismatch(String),

    #[error("Failed to parse remote response: {0}")]
    Parse(String),

    #[error("Failed to decode NetCDF subset: {0}")]
    Decode(String),

    // === Rendering ===
    #[error("Rendering failed: {0}")]
    Render(String),

    // === Infrastructure ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SstError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SstError::DateOutOfRange { .. } | SstError::InvalidDate(_) => 400,

            SstError::NoData { .. } | SstError::ClimatologyUnavailable { .. } => 404,

            SstError::Fetch { .. } => 502,

            _ => 500,
        }
    }

    /// A short diagnostic hint for the user, where one exists.
    ///
    /// Fetch failures name the usual culprits: the network path
    /// (firewall/SSL) or missing NetCDF system libraries on the host.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            SstError::Fetch { .. } => Some(
                "The source publishes one file per year. If this persists, check \
                 firewall/SSL restrictions on the network path, or that the NetCDF \
                 system libraries are installed.",
            ),
            SstError::NoData { .. } => {
                Some("No data exists for the selected date. Try a different date.")
            }
            _ => None,
        }
    }

    /// Whether the failure is recoverable absence rather than a fault.
    ///
    /// The pipeline converts these to "unavailable" notices instead of
    /// failing the whole request.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            SstError::Fetch { .. }
                | SstError::NoData { .. }
                | SstError::ClimatologyUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for SstError {
    fn from(err: std::io::Error) -> Self {
        SstError::Internal(err.to_string())
    }
}
