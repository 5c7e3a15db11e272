//! Run configurations, resolved from CLI arguments by `app`.

use std::path::PathBuf;

use crate::domain::{FitTarget, VelocityGrid};

/// Where the line mask comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskSource {
    File(PathBuf),
    /// Closest spectral type among the `*.csv` masks in `dir`.
    Auto { dir: PathBuf, sptype: String },
}

/// `rvs rv`: spectra → RV/FWHM series.
#[derive(Debug, Clone)]
pub struct RvConfig {
    pub spectra_path: PathBuf,
    pub mask: MaskSource,
    /// Mask column holding line weights; unit weights when `None`.
    pub weight_column: Option<String>,
    pub criteria: Vec<String>,
    pub grid: VelocityGrid,
    pub parallel: bool,
    /// Drop failing epochs instead of aborting the run.
    pub skip_failed_epochs: bool,

    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// `rvs vpsd`: RV series → VPSD → optional component fit.
#[derive(Debug, Clone)]
pub struct VpsdConfig {
    pub rv_path: PathBuf,
    pub components_path: Option<PathBuf>,
    pub fit_target: FitTarget,

    pub oversampling: f64,
    pub f_min: Option<f64>,
    pub f_max: Option<f64>,

    pub export_vpsd: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
}

/// `rvs simulate`: synthetic spectra + matching mask.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub spectra_out: PathBuf,
    pub mask_out: PathBuf,
    pub seed: u64,

    pub epochs: usize,
    /// Mean spacing between epochs (days).
    pub cadence: f64,

    pub lines: usize,
    pub wave_min: f64,
    pub wave_max: f64,
    /// Pixel size (Å).
    pub pixel: f64,
    /// Gaussian σ of every line (Å).
    pub line_sigma: f64,
    pub line_depth: f64,

    /// Sinusoidal RV signal (km/s, days).
    pub rv_amplitude: f64,
    pub rv_period: f64,
    /// Extra Gaussian RV scatter (km/s).
    pub rv_jitter: f64,
    /// Per-pixel flux noise σ.
    pub noise: f64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            spectra_out: PathBuf::from("spectra.json"),
            mask_out: PathBuf::from("mask.csv"),
            seed: 42,
            epochs: 60,
            cadence: 1.0,
            lines: 25,
            wave_min: 5000.0,
            wave_max: 5050.0,
            pixel: 0.01,
            line_sigma: 0.08,
            line_depth: 0.6,
            rv_amplitude: 0.05,
            rv_period: 7.3,
            rv_jitter: 0.005,
            noise: 0.002,
        }
    }
}
