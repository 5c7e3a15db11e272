//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - validated inputs (`SpectralTimeSeries`, `LineMask`, `VelocityGrid`)
//! - per-stage outputs (`CcfRecord`, `RvSeries`, `PeriodogramResult`, `Vpsd`)
//! - component specs and fit outputs (`VpsdComponent`, `FitResult`)
//! - run configurations (`RvConfig`, `VpsdConfig`, `SimulateConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
