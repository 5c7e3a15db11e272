//! Terminal summaries for RV runs, VPSDs and component fits.

pub mod format;

pub use format::*;
