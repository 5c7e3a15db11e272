//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the numeric stages stay free of presentation concerns
//! - output changes are localized

use crate::domain::{FitResult, FitTarget, RvRun, Vpsd};
use crate::math::median;

/// Summary of an RV run: provenance, series statistics and failed epochs.
pub fn format_rv_summary(run: &RvRun, total_epochs: usize) -> String {
    let mut out = String::new();
    let rv = &run.rv;

    out.push_str("=== rvs - CCF radial velocities ===\n");
    out.push_str(&format!(
        "Method: {} | mask: {} ({} lines)\n",
        rv.provenance.method,
        rv.provenance.mask.as_deref().unwrap_or("-"),
        rv.provenance.mask_lines.map_or("-".to_string(), |n| n.to_string()),
    ));
    if let Some([start, stop, step]) = rv.provenance.velocity_grid {
        out.push_str(&format!("Velocity grid: [{start}, {stop}] step {step} km/s\n"));
    }
    out.push_str(&format!("Epochs: {} of {total_epochs} measured\n", rv.len()));

    if !rv.is_empty() {
        let (lo, hi) = min_max(&rv.rv);
        out.push_str(&format!(
            "RV: mean={:.6} rms={:.6} range=[{:.6}, {:.6}] {}\n",
            mean(&rv.rv),
            rms_about_mean(&rv.rv),
            lo,
            hi,
            rv.rv_unit
        ));
        out.push_str(&format!(
            "RV error: median={:.6} {}\n",
            median(&rv.rv_err).unwrap_or(f64::NAN),
            rv.rv_unit
        ));
        out.push_str(&format!(
            "FWHM: median={:.4} {}\n",
            median(&run.fwhm.fwhm).unwrap_or(f64::NAN),
            run.fwhm.unit
        ));
    }

    if !run.failures.is_empty() {
        out.push_str(&format!("\nSkipped epochs ({}):\n", run.failures.len()));
        for f in &run.failures {
            out.push_str(&format!("  epoch {:>4}: {}\n", f.epoch, f.message));
        }
    }

    out
}

/// Per-epoch RV table, at most `max_rows` rows.
pub fn format_rv_table(run: &RvRun, max_rows: usize) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>14} {:>12} {:>12} {:>10}\n",
            "epoch", "time", "rv", "rv_err", "fwhm"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<14} {:-<12} {:-<12} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');

    let rv = &run.rv;
    for i in 0..rv.len().min(max_rows) {
        out.push_str(&format!(
            "{:>6} {:>14.5} {:>12.6} {:>12.6} {:>10.4}\n",
            rv.epoch[i],
            rv.time[i],
            rv.rv[i],
            rv.rv_err[i],
            run.fwhm.fwhm.get(i).copied().unwrap_or(f64::NAN),
        ));
    }
    if rv.len() > max_rows {
        out.push_str(&format!("... {} more\n", rv.len() - max_rows));
    }
    out
}

pub fn format_vpsd_summary(vpsd: &Vpsd) -> String {
    let mut out = String::new();
    out.push_str("=== rvs - velocity power spectral density ===\n");
    if let (Some(f0), Some(f1)) = (vpsd.frequency.first(), vpsd.frequency.last()) {
        out.push_str(&format!(
            "Frequencies: n={} | range=[{:.6e}, {:.6e}]\n",
            vpsd.frequency.len(),
            f0,
            f1
        ));
    }
    out.push_str(&format!("Window area: {:.6e}\n", vpsd.window_area));
    out.push_str(&format!("Log bins kept: {}\n", vpsd.freq_avg.len()));
    if let Some(i) = crate::math::argmax(&vpsd.density) {
        out.push_str(&format!(
            "Peak density: {:.6e} at f={:.6e} (period {:.4})\n",
            vpsd.density[i],
            vpsd.frequency[i],
            1.0 / vpsd.frequency[i]
        ));
    }
    out
}

pub fn format_fit_summary(fit: &FitResult) -> String {
    let mut out = String::new();
    let q = &fit.quality;
    let target = match fit.target {
        FitTarget::Full => "full-resolution",
        FitTarget::Binned => "binned",
    };
    out.push_str(&format!("\nComponent fit ({target} VPSD):\n"));
    out.push_str(&format!(
        "  n={} dof={} SSE={:.6e} RMSE={:.6e} BIC={:.3} iterations={}\n",
        q.n, q.dof, q.sse, q.rmse, q.bic, q.iterations
    ));
    for c in &fit.components {
        out.push_str(&format!(
            "- {:<16} {:<9} coef: {}\n",
            truncate(&c.name, 16),
            c.kind.display_name(),
            fmt_vec(&c.coef)
        ));
        if let Some(err) = &c.coef_err {
            out.push_str(&format!("  {:<16} {:<9} err : {}\n", "", "", fmt_vec(err)));
        }
    }
    out
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn rms_about_mean(v: &[f64]) -> f64 {
    let m = mean(v);
    (v.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / v.len() as f64).sqrt()
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ComponentKind, EpochFailure, FitQuality, FwhmSeries, RvProvenance, RvSeries,
        VpsdComponent,
    };
    use crate::error::ErrorKind;

    fn run() -> RvRun {
        RvRun {
            rv: RvSeries {
                epoch: vec![0, 2],
                time: vec![0.0, 2.0],
                rv: vec![0.01, -0.01],
                rv_err: vec![0.001, 0.003],
                time_unit: Some("d".into()),
                rv_unit: "km/s".into(),
                provenance: RvProvenance {
                    method: "CCF".into(),
                    mask: Some("G2_mask.csv".into()),
                    velocity_grid: Some([-20.0, 20.0, 0.25]),
                    mask_lines: Some(12),
                },
            },
            fwhm: FwhmSeries {
                epoch: vec![0, 2],
                time: vec![0.0, 2.0],
                fwhm: vec![7.0, 7.2],
                unit: "km/s".into(),
            },
            failures: vec![EpochFailure {
                epoch: 1,
                kind: ErrorKind::FitConvergence,
                message: "fit did not converge: no half-depth crossing".into(),
            }],
        }
    }

    #[test]
    fn rv_summary_mentions_mask_counts_and_failures() {
        let s = format_rv_summary(&run(), 3);
        assert!(s.contains("G2_mask.csv (12 lines)"));
        assert!(s.contains("Epochs: 2 of 3 measured"));
        assert!(s.contains("rms=0.010000"));
        assert!(s.contains("median=0.002000"));
        assert!(s.contains("epoch    1"));
    }

    #[test]
    fn rv_table_truncates() {
        let s = format_rv_table(&run(), 1);
        assert_eq!(s.lines().count(), 4);
        assert!(s.ends_with("... 1 more\n"));
    }

    #[test]
    fn fit_summary_lists_components_in_order() {
        let mut a = VpsdComponent::new("granulation-long-name", ComponentKind::Harvey, vec![1.0, 2.0, 3.0]);
        a.coef_err = Some(vec![0.1, 0.2, 0.3]);
        let fit = FitResult {
            components: vec![a, VpsdComponent::new("white", ComponentKind::Constant, vec![0.5])],
            target: FitTarget::Binned,
            quality: FitQuality {
                n: 40,
                dof: 36,
                sse: 1.0,
                rmse: 0.158,
                bic: 12.0,
                iterations: 9,
            },
        };
        let s = format_fit_summary(&fit);
        assert!(s.contains("(binned VPSD)"));
        let gran = s.find("granulation-lon.").unwrap();
        let white = s.find("white").unwrap();
        assert!(gran < white);
        assert!(s.contains("err : [1.000000e-1"));
    }
}
