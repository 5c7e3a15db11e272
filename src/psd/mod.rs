//! Periodograms and the velocity power spectral density (VPSD).
//!
//! Responsibilities:
//!
//! - define the periodogram engine seam and a default GLS implementation
//! - turn an RV series into a VPSD (full resolution and log-binned)

pub mod periodogram;
pub mod vpsd;

pub use periodogram::*;
pub use vpsd::*;
