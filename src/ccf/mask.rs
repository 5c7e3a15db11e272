//! Line masks: CSV parsing, criteria selection, overlap filtering and
//! spectral-type based lookup in a mask repository.
//!
//! Mask CSV schema:
//! - `wave` (required): rest-frame line centre
//! - any numeric column selected as the weight via [`MaskOptions::weight_column`]
//! - `crit_<name>` columns holding `0/1` or `true/false`; every requested
//!   criterion must hold for a line to be kept

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::debug;

use crate::domain::{LineMask, MaskLine, VelocityGrid};
use crate::error::{Result, RvError};
use crate::math::shift_one;

/// Prefix of boolean criteria columns.
pub const CRITERIA_PREFIX: &str = "crit_";

/// How to read a mask file.
#[derive(Debug, Clone, Default)]
pub struct MaskOptions {
    /// Column holding line weights; unit weights when `None`.
    pub weight_column: Option<String>,
    /// Criteria names (without the `crit_` prefix), AND-combined.
    pub criteria: Vec<String>,
}

/// Read a mask CSV from disk. The mask id is the file name.
pub fn read_mask(path: &Path, opts: &MaskOptions) -> Result<LineMask> {
    let file = File::open(path)
        .map_err(|e| RvError::resource(format!("failed to open mask '{}': {e}", path.display())))?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_mask(file, &id, opts)
}

/// Parse a mask CSV from any reader.
pub fn parse_mask<R: Read>(reader: R, id: &str, opts: &MaskOptions) -> Result<LineMask> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| RvError::validation(format!("mask '{id}': failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let column = |name: &str| -> Result<usize> {
        header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| RvError::validation(format!("mask '{id}': missing column '{name}'")))
    };

    let wave_idx = column("wave")?;
    let weight_idx = opts.weight_column.as_deref().map(column).transpose()?;
    let crit_idx = opts
        .criteria
        .iter()
        .map(|c| column(&format!("{CRITERIA_PREFIX}{c}")).map(|i| (c.as_str(), i)))
        .collect::<Result<Vec<_>>>()?;

    let mut lines = Vec::new();
    let mut rows = 0usize;
    for (idx, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = record
            .map_err(|e| RvError::validation(format!("mask '{id}' line {line}: CSV parse error: {e}")))?;
        rows += 1;

        let wave = parse_f64(&record, wave_idx)
            .filter(|w| *w > 0.0)
            .ok_or_else(|| RvError::validation(format!("mask '{id}' line {line}: invalid 'wave' value")))?;
        let weight = match weight_idx {
            Some(i) => parse_f64(&record, i).filter(|w| *w >= 0.0).ok_or_else(|| {
                RvError::validation(format!("mask '{id}' line {line}: invalid weight value"))
            })?,
            None => 1.0,
        };

        let mut keep = true;
        for &(name, i) in &crit_idx {
            let flag = parse_flag(record.get(i).unwrap_or("")).ok_or_else(|| {
                RvError::validation(format!(
                    "mask '{id}' line {line}: criterion '{CRITERIA_PREFIX}{name}' is not boolean"
                ))
            })?;
            keep &= flag;
        }
        if keep {
            lines.push(MaskLine { wave, weight });
        }
    }

    debug!(mask = id, rows, kept = lines.len(), "parsed line mask");
    Ok(LineMask {
        id: id.to_string(),
        lines,
    })
}

/// Keep lines whose shifted centre stays inside `overlap` at both grid
/// extremes, then renormalize the weights to sum to 1.
pub fn filter_mask(mask: &LineMask, overlap: (f64, f64), grid: &VelocityGrid) -> Result<LineMask> {
    let (lo, hi) = overlap;
    let (v_min, v_max) = (grid.min(), grid.max());

    let kept: Vec<MaskLine> = mask
        .lines
        .iter()
        .copied()
        .filter(|l| shift_one(l.wave, v_min) > lo && shift_one(l.wave, v_max) < hi)
        .collect();

    if kept.is_empty() {
        return Err(RvError::domain(format!(
            "mask '{}' has no lines inside the spectral overlap [{lo}, {hi}] for velocities [{v_min}, {v_max}] km/s",
            mask.id
        )));
    }
    let total: f64 = kept.iter().map(|l| l.weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(RvError::domain(format!(
            "mask '{}' weights of the {} lines in range sum to {total}",
            mask.id,
            kept.len()
        )));
    }

    Ok(LineMask {
        id: mask.id.clone(),
        lines: kept
            .into_iter()
            .map(|l| MaskLine {
                wave: l.wave,
                weight: l.weight / total,
            })
            .collect(),
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (normalize_header_name(h), i))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_f64(record: &StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        other => other.parse::<f64>().ok().map(|v| v != 0.0),
    }
}

/// A mask available in a repository, keyed by spectral type.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskEntry {
    pub sptype: String,
    pub path: PathBuf,
}

/// Source of candidate masks for auto-selection.
pub trait MaskRepository {
    fn entries(&self) -> Result<Vec<MaskEntry>>;
}

/// Maps a spectral-type string to a number so types can be compared.
pub trait SpectralTypeComparator {
    fn to_number(&self, sptype: &str) -> Option<f64>;
}

/// Masks stored as `<SPTYPE>_<anything>.csv` in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryMaskRepository {
    dir: PathBuf,
}

impl DirectoryMaskRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MaskRepository for DirectoryMaskRepository {
    fn entries(&self) -> Result<Vec<MaskEntry>> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|e| {
            RvError::resource(format!("failed to list mask directory '{}': {e}", self.dir.display()))
        })?;

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| RvError::resource(format!("mask directory entry: {e}")))?;
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let sptype = name.split('_').next().unwrap_or(name).trim_end_matches(".csv");
            let sptype = sptype.to_string();
            entries.push(MaskEntry { sptype, path });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// MK classification as a number: letter index (O..M → 0..6) × 10 plus the
/// numeric subclass, e.g. `G2V` → 42, `K1.5` → 51.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct MkSpectralTypeNumber;

const MK_SEQUENCE: &str = "OBAFGKM";

impl SpectralTypeComparator for MkSpectralTypeNumber {
    fn to_number(&self, sptype: &str) -> Option<f64> {
        let s = sptype.trim();
        let letter = s.chars().next()?.to_ascii_uppercase();
        let class = MK_SEQUENCE.find(letter)? as f64;
        let digits: String = s[letter.len_utf8()..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let subclass = if digits.is_empty() {
            0.0
        } else {
            digits.parse::<f64>().ok()?
        };
        Some(class * 10.0 + subclass)
    }
}

/// Pick the mask whose spectral type is numerically closest to `target`.
pub fn select_mask(
    repo: &dyn MaskRepository,
    comparator: &dyn SpectralTypeComparator,
    target: &str,
) -> Result<MaskEntry> {
    let target_num = comparator
        .to_number(target)
        .ok_or_else(|| RvError::resource(format!("unrecognized spectral type '{target}'")))?;

    let mut best: Option<(f64, MaskEntry)> = None;
    for entry in repo.entries()? {
        let Some(num) = comparator.to_number(&entry.sptype) else {
            debug!(sptype = %entry.sptype, "skipping mask with unrecognized spectral type");
            continue;
        };
        let dist = (num - target_num).abs();
        if best.as_ref().is_none_or(|(d, _)| dist < *d) {
            best = Some((dist, entry));
        }
    }

    best.map(|(_, e)| e)
        .ok_or_else(|| RvError::resource(format!("no mask available for spectral type '{target}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASK_CSV: &str = "\
wave,depth,crit_strong,crit_clean
5000.0,0.5,1,1
5001.0,0.3,1,0
5002.0,0.2,0,1
5003.0,0.4,true,true
";

    #[test]
    fn parse_applies_weight_column_and_and_combined_criteria() {
        let opts = MaskOptions {
            weight_column: Some("depth".into()),
            criteria: vec!["strong".into(), "clean".into()],
        };
        let mask = parse_mask(MASK_CSV.as_bytes(), "test.csv", &opts).unwrap();
        let waves: Vec<f64> = mask.lines.iter().map(|l| l.wave).collect();
        assert_eq!(waves, vec![5000.0, 5003.0]);
        assert_eq!(mask.lines[1].weight, 0.4);
    }

    #[test]
    fn parse_without_options_uses_unit_weights() {
        let mask = parse_mask(MASK_CSV.as_bytes(), "test.csv", &MaskOptions::default()).unwrap();
        assert_eq!(mask.lines.len(), 4);
        assert!(mask.lines.iter().all(|l| l.weight == 1.0));
    }

    #[test]
    fn parse_reports_missing_columns() {
        let opts = MaskOptions {
            weight_column: None,
            criteria: vec!["blended".into()],
        };
        let err = parse_mask(MASK_CSV.as_bytes(), "test.csv", &opts).unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
        assert!(err.to_string().contains("crit_blended"));

        let err = parse_mask("lambda\n5000\n".as_bytes(), "x.csv", &MaskOptions::default()).unwrap_err();
        assert!(err.to_string().contains("'wave'"));
    }

    #[test]
    fn filter_normalizes_weights_to_one() {
        let mask = parse_mask(MASK_CSV.as_bytes(), "test.csv", &MaskOptions {
            weight_column: Some("depth".into()),
            criteria: vec![],
        })
        .unwrap();
        let grid = VelocityGrid::new(-20.0, 20.0, 0.25).unwrap();
        // 5003 shifted by +20 km/s ~ 5003.33, outside the upper edge.
        let filtered = filter_mask(&mask, (4999.0, 5003.2), &grid).unwrap();
        assert_eq!(filtered.lines.len(), 3);
        let total: f64 = filtered.lines.iter().map(|l| l.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((filtered.lines[0].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn filter_with_no_lines_in_range_is_domain_error() {
        let mask = parse_mask(MASK_CSV.as_bytes(), "test.csv", &MaskOptions::default()).unwrap();
        let grid = VelocityGrid::default();
        let err = filter_mask(&mask, (6000.0, 7000.0), &grid).unwrap_err();
        assert!(matches!(err, RvError::Domain(_)));
    }

    #[test]
    fn mk_numbers() {
        let mk = MkSpectralTypeNumber;
        assert_eq!(mk.to_number("G2V"), Some(42.0));
        assert_eq!(mk.to_number("k1.5"), Some(51.5));
        assert_eq!(mk.to_number("M"), Some(60.0));
        assert_eq!(mk.to_number("X5"), None);
        assert_eq!(mk.to_number(""), None);
    }

    struct FixedRepo(Vec<&'static str>);

    impl MaskRepository for FixedRepo {
        fn entries(&self) -> Result<Vec<MaskEntry>> {
            Ok(self
                .0
                .iter()
                .map(|s| MaskEntry {
                    sptype: s.to_string(),
                    path: PathBuf::from(format!("{s}_mask.csv")),
                })
                .collect())
        }
    }

    #[test]
    fn select_mask_picks_closest_type() {
        let repo = FixedRepo(vec!["F9", "G2", "K2", "M2"]);
        let pick = select_mask(&repo, &MkSpectralTypeNumber, "G8V").unwrap();
        assert_eq!(pick.sptype, "K2");
        let pick = select_mask(&repo, &MkSpectralTypeNumber, "G0").unwrap();
        assert_eq!(pick.sptype, "F9");
    }

    #[test]
    fn select_mask_failures_are_resource_errors() {
        let empty = FixedRepo(vec![]);
        assert!(matches!(
            select_mask(&empty, &MkSpectralTypeNumber, "G2"),
            Err(RvError::Resource(_))
        ));
        let repo = FixedRepo(vec!["G2"]);
        assert!(matches!(
            select_mask(&repo, &MkSpectralTypeNumber, "Q7"),
            Err(RvError::Resource(_))
        ));
    }
}
