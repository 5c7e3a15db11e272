//! `rv-spectra` library crate.
//!
//! Radial velocities from spectral time series by cross-correlation with a
//! weighted line mask, and velocity power spectral densities (VPSD) of the
//! resulting series with parametric component fits.
//!
//! The binary (`rvs`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the numeric stages are reusable on in-memory data

pub mod app;
pub mod ccf;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod psd;
pub mod report;
