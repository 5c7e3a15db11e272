//! VPSD component fitting.
//!
//! Responsibilities:
//!
//! - validate the component list against the registered shapes
//! - fit the composite model jointly to the VPSD
//! - report coefficients, standard errors and fit quality

pub mod fitter;

pub use fitter::*;
