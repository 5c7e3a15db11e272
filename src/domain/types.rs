//! Shared domain types.
//!
//! Inputs are validated when they are constructed, so the numeric stages can
//! assume well-formed arrays. Results are plain serializable records so they
//! can be exported to JSON/CSV or reloaded for later stages.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result, RvError};

/// Declared units of a spectral time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralUnits {
    pub time_unit: Option<String>,
    pub wave_unit: Option<String>,
    pub flux_unit: Option<String>,
}

/// One observed spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub time: f64,
    /// Wavelengths, strictly increasing.
    pub wave: Vec<f64>,
    pub flux_val: Vec<f64>,
    pub flux_err: Vec<f64>,
}

/// Validated spectra for all epochs.
///
/// Constructed through [`SpectralTimeSeries::new`] or from [`RawSpectra`];
/// both paths reject missing arrays, mismatched shapes and unsorted grids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralTimeSeries {
    epochs: Vec<Epoch>,
    units: SpectralUnits,
}

impl SpectralTimeSeries {
    pub fn new(epochs: Vec<Epoch>, units: SpectralUnits) -> Result<Self> {
        if epochs.is_empty() {
            return Err(RvError::validation("spectral time series has no epochs"));
        }
        for (i, epoch) in epochs.iter().enumerate() {
            validate_epoch(i, epoch)?;
        }
        Ok(Self { epochs, units })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn units(&self) -> &SpectralUnits {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Wavelength range covered by every epoch (intersection of the grids).
    ///
    /// Returns `None` when the epochs do not overlap at all.
    pub fn wave_overlap(&self) -> Option<(f64, f64)> {
        let lo = self
            .epochs
            .iter()
            .map(|e| e.wave[0])
            .fold(f64::NEG_INFINITY, f64::max);
        let hi = self
            .epochs
            .iter()
            .map(|e| e.wave[e.wave.len() - 1])
            .fold(f64::INFINITY, f64::min);
        (lo < hi).then_some((lo, hi))
    }
}

fn validate_epoch(index: usize, epoch: &Epoch) -> Result<()> {
    let n = epoch.wave.len();
    if n < 2 {
        return Err(RvError::validation(format!(
            "epoch {index}: wavelength grid needs at least 2 pixels, got {n}"
        )));
    }
    if epoch.flux_val.len() != n || epoch.flux_err.len() != n {
        return Err(RvError::validation(format!(
            "epoch {index}: array shapes differ (wave={n}, flux_val={}, flux_err={})",
            epoch.flux_val.len(),
            epoch.flux_err.len()
        )));
    }
    if !epoch.time.is_finite() {
        return Err(RvError::validation(format!("epoch {index}: time is not finite")));
    }
    let finite = epoch
        .wave
        .iter()
        .chain(&epoch.flux_val)
        .chain(&epoch.flux_err)
        .all(|v| v.is_finite());
    if !finite {
        return Err(RvError::validation(format!(
            "epoch {index}: spectrum contains non-finite values"
        )));
    }
    if let Some(i) = epoch.wave.windows(2).position(|w| w[1] <= w[0]) {
        return Err(RvError::validation(format!(
            "epoch {index}: wavelengths must be strictly increasing (pixel {})",
            i + 1
        )));
    }
    Ok(())
}

/// On-disk form of a spectral time series: every field optional so that
/// missing data is reported as a validation error rather than a parse error.
///
/// A top-level `wave` applies to every epoch that does not carry its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSpectra {
    #[serde(default)]
    pub time_unit: Option<String>,
    #[serde(default)]
    pub wave_unit: Option<String>,
    #[serde(default)]
    pub flux_unit: Option<String>,
    #[serde(default)]
    pub wave: Option<Vec<f64>>,
    #[serde(default)]
    pub epochs: Vec<RawEpoch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEpoch {
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub wave: Option<Vec<f64>>,
    #[serde(default)]
    pub flux_val: Option<Vec<f64>>,
    #[serde(default)]
    pub flux_err: Option<Vec<f64>>,
}

impl TryFrom<RawSpectra> for SpectralTimeSeries {
    type Error = RvError;

    fn try_from(raw: RawSpectra) -> Result<Self> {
        let shared_wave = raw.wave;
        let mut epochs = Vec::with_capacity(raw.epochs.len());
        for (i, e) in raw.epochs.into_iter().enumerate() {
            let missing = |field: &str| {
                RvError::validation(format!("epoch {i}: missing required array '{field}'"))
            };
            let time = e.time.ok_or_else(|| missing("time"))?;
            let wave = match e.wave {
                Some(w) => w,
                None => shared_wave.clone().ok_or_else(|| missing("wave"))?,
            };
            let flux_val = e.flux_val.ok_or_else(|| missing("flux_val"))?;
            let flux_err = e.flux_err.ok_or_else(|| missing("flux_err"))?;
            epochs.push(Epoch {
                time,
                wave,
                flux_val,
                flux_err,
            });
        }
        let units = SpectralUnits {
            time_unit: raw.time_unit,
            wave_unit: raw.wave_unit,
            flux_unit: raw.flux_unit,
        };
        SpectralTimeSeries::new(epochs, units)
    }
}

/// A single mask line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskLine {
    /// Rest-frame central wavelength.
    pub wave: f64,
    pub weight: f64,
}

/// Weighted line mask (criteria already applied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMask {
    /// Identifier for provenance (usually the file name).
    pub id: String,
    pub lines: Vec<MaskLine>,
}

/// Evenly spaced trial velocities in km/s.
///
/// Deserialization goes through [`VelocityGrid::new`]; a stored `values`
/// array is ignored and rebuilt from `start/stop/step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVelocityGrid")]
pub struct VelocityGrid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawVelocityGrid {
    start: f64,
    stop: f64,
    step: f64,
}

impl TryFrom<RawVelocityGrid> for VelocityGrid {
    type Error = RvError;

    fn try_from(raw: RawVelocityGrid) -> Result<Self> {
        VelocityGrid::new(raw.start, raw.stop, raw.step)
    }
}

/// Minimum grid length needed by the CCF initial-guess heuristic.
pub const MIN_VELOCITY_POINTS: usize = 5;

/// Upper bound on the grid length.
pub const MAX_VELOCITY_POINTS: usize = 1_000_000;

impl VelocityGrid {
    /// Build the grid `start, start+step, ...` up to (and including) `stop`
    /// when `stop` lies on the lattice.
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(RvError::domain("velocity grid bounds must be finite"));
        }
        if step <= 0.0 || stop <= start {
            return Err(RvError::domain(format!(
                "degenerate velocity grid [{start}, {stop}, {step}]"
            )));
        }
        let count = ((stop + step / 2.0 - start) / step).ceil();
        if !count.is_finite() || count > MAX_VELOCITY_POINTS as f64 {
            return Err(RvError::domain(format!(
                "velocity grid [{start}, {stop}, {step}] exceeds {MAX_VELOCITY_POINTS} points"
            )));
        }
        let n = count as usize;
        if n < MIN_VELOCITY_POINTS {
            return Err(RvError::domain(format!(
                "velocity grid [{start}, {stop}, {step}] has {n} points, need at least {MIN_VELOCITY_POINTS}"
            )));
        }
        let values = (0..n).map(|i| start + i as f64 * step).collect();
        Ok(Self {
            start,
            stop,
            step,
            values,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(self.start)
    }

    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(self.start)
    }
}

impl Default for VelocityGrid {
    fn default() -> Self {
        let values = (0..161).map(|i| -20.0 + i as f64 * 0.25).collect();
        Self {
            start: -20.0,
            stop: 20.0,
            step: 0.25,
            values,
        }
    }
}

/// Cross-correlation function of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcfRecord {
    pub velocity: Vec<f64>,
    pub value: Vec<f64>,
    pub error: Vec<f64>,
}

/// Fitted line-profile parameters of one CCF, plus the propagated RV error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CcfMoments {
    pub continuum: f64,
    pub depth: f64,
    pub rv: f64,
    pub fwhm: f64,
    pub rv_err: f64,
}

/// Where an RV series came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RvProvenance {
    pub method: String,
    pub mask: Option<String>,
    /// `[start, stop, step]` in km/s.
    pub velocity_grid: Option<[f64; 3]>,
    pub mask_lines: Option<usize>,
}

/// Radial-velocity time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RvSeries {
    /// Source epoch index of every sample.
    pub epoch: Vec<usize>,
    pub time: Vec<f64>,
    pub rv: Vec<f64>,
    pub rv_err: Vec<f64>,
    pub time_unit: Option<String>,
    pub rv_unit: String,
    pub provenance: RvProvenance,
}

impl RvSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// CCF widths, index-aligned with the [`RvSeries`] of the same run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FwhmSeries {
    pub epoch: Vec<usize>,
    pub time: Vec<f64>,
    pub fwhm: Vec<f64>,
    pub unit: String,
}

/// An epoch dropped under the skip policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochFailure {
    pub epoch: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// Output of the per-epoch CCF stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RvRun {
    pub rv: RvSeries,
    pub fwhm: FwhmSeries,
    pub failures: Vec<EpochFailure>,
}

/// Output of the periodogram engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodogramResult {
    pub frequency: Vec<f64>,
    pub power: Vec<f64>,
    pub phase: Vec<f64>,
    pub window_frequency: Vec<f64>,
    pub window_power: Vec<f64>,
    pub window_area: f64,
}

/// Velocity power spectral density.
///
/// The `*_avg` arrays hold the log-binned averages with empty bins removed;
/// `bin_lo`/`bin_hi` are the edges of each retained bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vpsd {
    pub frequency: Vec<f64>,
    pub power: Vec<f64>,
    pub density: Vec<f64>,
    pub phase: Vec<f64>,
    pub freq_avg: Vec<f64>,
    pub power_avg: Vec<f64>,
    pub density_avg: Vec<f64>,
    pub bin_lo: Vec<f64>,
    pub bin_hi: Vec<f64>,
    pub window_area: f64,
}

/// PSD component shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Constant,
    Lorentz,
    Harvey,
}

impl ComponentKind {
    /// Registered component types.
    pub const ALL: [ComponentKind; 3] = [
        ComponentKind::Constant,
        ComponentKind::Lorentz,
        ComponentKind::Harvey,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ComponentKind::Constant => "Constant",
            ComponentKind::Lorentz => "Lorentz",
            ComponentKind::Harvey => "Harvey",
        }
    }

    /// Number of coefficients the shape takes.
    pub fn coef_len(self) -> usize {
        match self {
            ComponentKind::Constant => 1,
            ComponentKind::Lorentz | ComponentKind::Harvey => 3,
        }
    }

    /// Case-insensitive lookup in the registry.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.display_name().eq_ignore_ascii_case(name.trim()))
    }
}

/// A named component with (initial or fitted) coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpsdComponent {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub coef: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coef_err: Option<Vec<f64>>,
}

impl VpsdComponent {
    pub fn new(name: impl Into<String>, kind: ComponentKind, coef: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind,
            coef,
            coef_err: None,
        }
    }
}

/// Which VPSD arrays the component fit runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitTarget {
    #[default]
    Full,
    Binned,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    pub dof: usize,
    pub sse: f64,
    pub rmse: f64,
    pub bic: f64,
    pub iterations: usize,
}

/// Result of a joint component fit. Components keep their input order and
/// carry `coef_err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub components: Vec<VpsdComponent>,
    pub target: FitTarget,
    pub quality: FitQuality,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(n: usize) -> Epoch {
        Epoch {
            time: 0.0,
            wave: (0..n).map(|i| 5000.0 + i as f64).collect(),
            flux_val: vec![1.0; n],
            flux_err: vec![0.01; n],
        }
    }

    #[test]
    fn velocity_grid_includes_stop() {
        let g = VelocityGrid::new(-20.0, 20.0, 0.25).unwrap();
        assert_eq!(g.len(), 161);
        assert!((g.max() - 20.0).abs() < 1e-12);
        assert_eq!(g, VelocityGrid::default());
    }

    #[test]
    fn velocity_grid_rejects_degenerate_inputs() {
        assert!(matches!(VelocityGrid::new(1.0, 1.0, 0.1), Err(RvError::Domain(_))));
        assert!(matches!(VelocityGrid::new(-1.0, 1.0, 0.0), Err(RvError::Domain(_))));
        assert!(matches!(VelocityGrid::new(0.0, 1.0, 0.5), Err(RvError::Domain(_))));
        assert!(VelocityGrid::new(0.0, 1.0, 0.25).is_ok());
    }

    #[test]
    fn velocity_grid_rejects_oversized_grids() {
        assert!(matches!(VelocityGrid::new(-1e300, 1e300, 1e-300), Err(RvError::Domain(_))));
        assert!(matches!(VelocityGrid::new(-20.0, 20.0, 1e-6), Err(RvError::Domain(_))));
        assert!(VelocityGrid::new(-20.0, 20.0, 1e-4).is_ok());
    }

    #[test]
    fn velocity_grid_deserializes_through_validation() {
        let g: VelocityGrid =
            serde_json::from_str(r#"{"start":-20,"stop":20,"step":0.25,"values":[1,2]}"#).unwrap();
        assert_eq!(g.len(), 161);
        assert_eq!(g, VelocityGrid::default());

        let empty = serde_json::from_str::<VelocityGrid>(r#"{"start":1,"stop":1,"step":0.25,"values":[]}"#);
        assert!(empty.is_err());

        let round = serde_json::to_string(&VelocityGrid::default()).unwrap();
        assert_eq!(serde_json::from_str::<VelocityGrid>(&round).unwrap(), VelocityGrid::default());
    }

    #[test]
    fn spectra_reject_shape_mismatch_with_epoch_index() {
        let mut bad = epoch(10);
        bad.flux_err.pop();
        let err = SpectralTimeSeries::new(vec![epoch(10), bad], SpectralUnits::default())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("epoch 1"), "{msg}");
        assert!(msg.contains("flux_err=9"), "{msg}");
    }

    #[test]
    fn raw_spectra_missing_flux_err_is_validation_error() {
        let raw = RawSpectra {
            wave: Some(vec![1.0, 2.0, 3.0]),
            epochs: vec![RawEpoch {
                time: Some(0.0),
                wave: None,
                flux_val: Some(vec![1.0, 1.0, 1.0]),
                flux_err: None,
            }],
            ..RawSpectra::default()
        };
        let err = SpectralTimeSeries::try_from(raw).unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
        assert!(err.to_string().contains("flux_err"));
    }

    #[test]
    fn wave_overlap_is_intersection() {
        let a = epoch(10);
        let mut b = epoch(10);
        for w in &mut b.wave {
            *w += 3.0;
        }
        let s = SpectralTimeSeries::new(vec![a, b], SpectralUnits::default()).unwrap();
        assert_eq!(s.wave_overlap(), Some((5003.0, 5009.0)));
    }

    #[test]
    fn component_registry_lookup() {
        assert_eq!(ComponentKind::from_name("harvey"), Some(ComponentKind::Harvey));
        assert_eq!(ComponentKind::from_name(" LORENTZ "), Some(ComponentKind::Lorentz));
        assert_eq!(ComponentKind::from_name("gauss"), None);
        assert_eq!(ComponentKind::Constant.coef_len(), 1);
    }
}
