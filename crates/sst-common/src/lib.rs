//! Common types shared across the SST dashboard workspace.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{SstError, SstResult};
pub use grid::Grid;
pub use time::{ClimatologyWindow, DataDay, DateKey};
