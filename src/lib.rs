pub mod change_filter;
pub mod config;
pub mod distance_matrix;
pub mod error;
pub mod invoke;
pub mod lifecycle;
pub mod object;
pub mod summary;
pub mod tracked_object;
pub mod tracker;

pub use change_filter::ChangeFilter;
pub use error::{Error, Result};
pub use summary::FrameSummary;
pub use tracker::*;
