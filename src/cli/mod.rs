//! Command-line parsing for the `rvs` binary.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! numeric code: `app` turns these args into the plain config structs in
//! `domain` before anything runs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::FitTarget;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "rvs",
    version,
    about = "Radial velocities from spectra by CCF, and velocity power spectra"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write synthetic spectra (JSON) and a matching line mask (CSV).
    Simulate(SimulateArgs),
    /// Measure RV and FWHM per epoch by cross-correlating with a line mask.
    Rv(RvArgs),
    /// Build the VPSD of an RV series and optionally fit components to it.
    Vpsd(VpsdArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RvArgs {
    /// Spectra JSON file.
    #[arg(long, value_name = "JSON")]
    pub spectra: PathBuf,

    /// Line mask CSV. Mutually exclusive with `--sptype`.
    #[arg(long, value_name = "CSV", conflicts_with = "sptype")]
    pub mask: Option<PathBuf>,

    /// Pick the mask with the closest spectral type (e.g. G2, K1.5).
    #[arg(long)]
    pub sptype: Option<String>,

    /// Directory of `<SpType>_*.csv` masks used with `--sptype`
    /// (default: $RVS_MASK_DIR, then `masks`).
    #[arg(long, value_name = "DIR")]
    pub mask_dir: Option<PathBuf>,

    /// Mask column with line weights (unit weights when omitted).
    #[arg(long)]
    pub weight_column: Option<String>,

    /// Keep only lines whose `crit_<NAME>` column is true. Repeatable.
    #[arg(long = "crit", value_name = "NAME", value_delimiter = ',')]
    pub criteria: Vec<String>,

    /// First trial velocity (km/s).
    #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
    pub v_start: f64,

    /// Last trial velocity (km/s).
    #[arg(long, default_value_t = 20.0, allow_hyphen_values = true)]
    pub v_stop: f64,

    /// Velocity step (km/s).
    #[arg(long, default_value_t = 0.25)]
    pub v_step: f64,

    /// Process epochs in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Drop epochs whose CCF cannot be fitted instead of aborting.
    #[arg(long)]
    pub skip_failed: bool,

    /// Rows shown in the per-epoch table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the RV/FWHM series to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the full run (series, provenance, failures) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct VpsdArgs {
    /// RV CSV with `time`, `rv`|`vrad_val` and `rv_err`|`vrad_err` columns.
    #[arg(long, value_name = "CSV")]
    pub rv: PathBuf,

    /// Initial components JSON (`[{"name", "type", "coef"}]`) to fit.
    #[arg(long, value_name = "JSON")]
    pub components: Option<PathBuf>,

    /// Fit against the full-resolution or the log-binned VPSD.
    #[arg(long, value_enum, default_value_t = FitTarget::Full)]
    pub fit_target: FitTarget,

    /// Periodogram oversampling factor.
    #[arg(long, default_value_t = 10.0)]
    pub oversampling: f64,

    /// Lowest periodogram frequency (default: 1 / baseline).
    #[arg(long)]
    pub f_min: Option<f64>,

    /// Highest periodogram frequency (default: 0.5 / median spacing).
    #[arg(long)]
    pub f_max: Option<f64>,

    /// Export the VPSD to JSON.
    #[arg(long = "export-vpsd")]
    pub export_vpsd: Option<PathBuf>,

    /// Export the component fit (with the model sampled on its grid) to JSON.
    #[arg(long = "export-fit")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output spectra JSON.
    #[arg(long, default_value = "spectra.json")]
    pub out: PathBuf,

    /// Output mask CSV.
    #[arg(long, default_value = "mask.csv")]
    pub mask_out: PathBuf,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 60)]
    pub epochs: usize,

    /// Mean spacing between epochs (days).
    #[arg(long, default_value_t = 1.0)]
    pub cadence: f64,

    #[arg(long, default_value_t = 25)]
    pub lines: usize,

    /// Wavelength range (Å).
    #[arg(long, default_value_t = 5000.0)]
    pub wave_min: f64,

    #[arg(long, default_value_t = 5050.0)]
    pub wave_max: f64,

    /// Pixel size (Å).
    #[arg(long, default_value_t = 0.01)]
    pub pixel: f64,

    /// Gaussian σ of the lines (Å).
    #[arg(long, default_value_t = 0.08)]
    pub line_sigma: f64,

    /// Maximum line depth (0-1).
    #[arg(long, default_value_t = 0.6)]
    pub line_depth: f64,

    /// RV semi-amplitude (km/s).
    #[arg(long, default_value_t = 0.05)]
    pub rv_amplitude: f64,

    /// RV period (days).
    #[arg(long, default_value_t = 7.3)]
    pub rv_period: f64,

    /// Gaussian RV jitter (km/s).
    #[arg(long, default_value_t = 0.005)]
    pub jitter: f64,

    /// Per-pixel flux noise σ.
    #[arg(long, default_value_t = 0.002)]
    pub noise: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rv_accepts_negative_velocity_bounds() {
        let cli = Cli::try_parse_from([
            "rvs", "rv", "--spectra", "s.json", "--mask", "m.csv", "--v-start", "-10", "--v-stop", "10",
        ])
        .unwrap();
        let Command::Rv(args) = cli.command else {
            panic!("expected rv subcommand");
        };
        assert_eq!(args.v_start, -10.0);
        assert_eq!(args.v_step, 0.25);
        assert!(!args.skip_failed);
    }

    #[test]
    fn mask_and_sptype_conflict() {
        let res = Cli::try_parse_from([
            "rvs", "rv", "--spectra", "s.json", "--mask", "m.csv", "--sptype", "G2",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn criteria_split_on_commas() {
        let cli = Cli::try_parse_from([
            "rvs", "rv", "--spectra", "s.json", "--sptype", "K1", "--crit", "strong,clean", "--crit", "blend",
        ])
        .unwrap();
        let Command::Rv(args) = cli.command else {
            panic!("expected rv subcommand");
        };
        assert_eq!(args.criteria, vec!["strong", "clean", "blend"]);
    }

    #[test]
    fn vpsd_fit_target_value_enum() {
        let cli = Cli::try_parse_from(["rvs", "vpsd", "--rv", "rv.csv", "--fit-target", "binned"]).unwrap();
        let Command::Vpsd(args) = cli.command else {
            panic!("expected vpsd subcommand");
        };
        assert_eq!(args.fit_target, FitTarget::Binned);
        assert_eq!(args.oversampling, 10.0);
    }
}
