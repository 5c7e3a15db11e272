//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs the log subscriber
//! - parses CLI arguments into run configs
//! - runs the pipelines
//! - prints reports and writes optional exports

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::ccf::{CancelToken, ProgressObserver};
use crate::cli::{Cli, Command, RvArgs, SimulateArgs, VpsdArgs};
use crate::domain::{MaskSource, RvConfig, SimulateConfig, VelocityGrid, VpsdConfig};
use crate::error::{Result, RvError};

pub mod pipeline;

/// Environment variable naming the default mask directory for `--sptype`.
pub const MASK_DIR_ENV: &str = "RVS_MASK_DIR";

/// Entry point for the `rvs` binary.
pub fn run() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(RvError::resource(format!("failed to load .env: {e}"))),
    }
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Rv(args) => handle_rv(args),
        Command::Vpsd(args) => handle_vpsd(args),
    }
}

/// Logs go to stderr so stdout only carries reports.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Progress observer that reports through `tracing`, roughly every 10%.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_epoch_done(&self, epoch: usize, completed: usize, total: usize, ok: bool) {
        debug!(epoch, ok, "epoch finished");
        let step = (total / 10).max(1);
        if completed % step == 0 || completed == total {
            info!("processed {completed}/{total} epochs");
        }
    }
}

fn handle_rv(args: RvArgs) -> Result<()> {
    let config = rv_config_from_args(&args)?;
    let out = pipeline::run_rv(&config, &LogProgress, &CancelToken::new())?;

    println!("{}", crate::report::format_rv_summary(&out.run, out.total_epochs));
    println!("{}", crate::report::format_rv_table(&out.run, args.top));

    if let Some(path) = &config.export_csv {
        crate::io::write_rv_csv(path, &out.run)?;
        info!(path = %path.display(), "wrote RV CSV");
    }
    if let Some(path) = &config.export_json {
        crate::io::write_rv_json(path, &out.run)?;
        info!(path = %path.display(), "wrote RV JSON");
    }
    Ok(())
}

fn handle_vpsd(args: VpsdArgs) -> Result<()> {
    let config = vpsd_config_from_args(&args);
    let out = pipeline::run_vpsd(&config)?;

    println!("{}", crate::report::format_vpsd_summary(&out.vpsd));
    if let Some(fit) = &out.fit {
        println!("{}", crate::report::format_fit_summary(fit));
    }

    if let Some(path) = &config.export_vpsd {
        crate::io::write_vpsd_json(path, &out.vpsd)?;
        info!(path = %path.display(), "wrote VPSD JSON");
    }
    if let Some(path) = &config.export_fit {
        let fit = out
            .fit
            .as_ref()
            .ok_or_else(|| RvError::validation("--export-fit requires --components"))?;
        crate::io::write_fit_json(path, fit, &out.vpsd)?;
        info!(path = %path.display(), "wrote fit JSON");
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<()> {
    let config = simulate_config_from_args(&args);
    let sample = pipeline::run_simulate(&config)?;
    println!(
        "Wrote {} epochs to {} and {} mask lines to {}",
        sample.spectra.len(),
        config.spectra_out.display(),
        sample.mask.lines.len(),
        config.mask_out.display()
    );
    Ok(())
}

pub fn rv_config_from_args(args: &RvArgs) -> Result<RvConfig> {
    let mask = match (&args.mask, &args.sptype) {
        (Some(path), _) => MaskSource::File(path.clone()),
        (None, Some(sptype)) => MaskSource::Auto {
            dir: args
                .mask_dir
                .clone()
                .or_else(|| std::env::var_os(MASK_DIR_ENV).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("masks")),
            sptype: sptype.clone(),
        },
        (None, None) => return Err(RvError::validation("either --mask or --sptype is required")),
    };

    Ok(RvConfig {
        spectra_path: args.spectra.clone(),
        mask,
        weight_column: args.weight_column.clone(),
        criteria: args.criteria.clone(),
        grid: VelocityGrid::new(args.v_start, args.v_stop, args.v_step)?,
        parallel: args.parallel,
        skip_failed_epochs: args.skip_failed,
        export_csv: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

pub fn vpsd_config_from_args(args: &VpsdArgs) -> VpsdConfig {
    VpsdConfig {
        rv_path: args.rv.clone(),
        components_path: args.components.clone(),
        fit_target: args.fit_target,
        oversampling: args.oversampling,
        f_min: args.f_min,
        f_max: args.f_max,
        export_vpsd: args.export_vpsd.clone(),
        export_fit: args.export_fit.clone(),
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> SimulateConfig {
    SimulateConfig {
        spectra_out: args.out.clone(),
        mask_out: args.mask_out.clone(),
        seed: args.seed,
        epochs: args.epochs,
        cadence: args.cadence,
        lines: args.lines,
        wave_min: args.wave_min,
        wave_max: args.wave_max,
        pixel: args.pixel,
        line_sigma: args.line_sigma,
        line_depth: args.line_depth,
        rv_amplitude: args.rv_amplitude,
        rv_period: args.rv_period,
        rv_jitter: args.jitter,
        noise: args.noise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rv_args(extra: &[&str]) -> RvArgs {
        let mut argv = vec!["rvs", "rv", "--spectra", "s.json"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Rv(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn explicit_mask_dir_wins_for_sptype() {
        let config = rv_config_from_args(&rv_args(&["--sptype", "K2", "--mask-dir", "/data/masks"])).unwrap();
        assert_eq!(
            config.mask,
            MaskSource::Auto {
                dir: PathBuf::from("/data/masks"),
                sptype: "K2".to_string()
            }
        );
        assert_eq!(config.grid.len(), 161);
    }

    #[test]
    fn mask_source_is_required() {
        let err = rv_config_from_args(&rv_args(&[])).unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
    }

    #[test]
    fn degenerate_velocity_grid_is_domain_error() {
        let err = rv_config_from_args(&rv_args(&["--mask", "m.csv", "--v-step", "30"])).unwrap_err();
        assert!(matches!(err, RvError::Domain(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn simulate_defaults_match_config_defaults() {
        let args = match Cli::parse_from(["rvs", "simulate"]).command {
            Command::Simulate(args) => args,
            other => panic!("unexpected command {other:?}"),
        };
        let from_args = simulate_config_from_args(&args);
        let defaults = SimulateConfig::default();
        assert_eq!(from_args.epochs, defaults.epochs);
        assert_eq!(from_args.pixel, defaults.pixel);
        assert_eq!(from_args.rv_period, defaults.rv_period);
        assert_eq!(from_args.spectra_out, defaults.spectra_out);
    }
}
