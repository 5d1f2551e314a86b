//! Profile ingest.
//!
//! This module turns the text formats pulsar folding tools emit into a plain
//! `Vec<f64>` of bin intensities plus whatever metadata the format carries.
//!
//! Supported formats:
//! - **bestprof** (PRESTO): `# key = value` header, one `bin value` line per bin
//! - **ascii** (psrchive `pdv`-style): one header line, intensity in column 4
//! - **csv**: header row with an intensity column
//!
//! Every failure is reported with exit code 2 and, for data lines, the
//! 1-based line number.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::domain::{LoadedProfile, ProfileFormat};
use crate::error::AppError;

/// MJD of the Unix epoch (1970-01-01T00:00:00Z).
const MJD_UNIX_EPOCH: f64 = 40587.0;

/// Accepted names (after normalization) for the CSV intensity column.
const CSV_INTENSITY_COLUMNS: [&str; 4] = ["intensity", "flux", "i", "value"];

/// Load a profile from disk, picking the format from `format` or the file extension.
pub fn load_profile(path: &Path, format: Option<ProfileFormat>) -> Result<LoadedProfile, AppError> {
    let format = match format {
        Some(f) => f,
        None => detect_format(path)?,
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read profile '{}': {e}", path.display())))?;

    let mut loaded = match format {
        ProfileFormat::Bestprof => parse_bestprof(&text)?,
        ProfileFormat::Ascii => parse_ascii(&text)?,
        ProfileFormat::Csv => parse_csv(&text)?,
    };
    loaded.source = path.to_path_buf();

    if loaded.samples.is_empty() {
        return Err(AppError::new(2, format!("Profile '{}' contains no bins.", path.display())));
    }
    Ok(loaded)
}

/// Guess the format from the file extension.
pub fn detect_format(path: &Path) -> Result<ProfileFormat, AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "bestprof" => Ok(ProfileFormat::Bestprof),
        "csv" => Ok(ProfileFormat::Csv),
        "txt" | "ascii" | "dat" | "pdv" => Ok(ProfileFormat::Ascii),
        _ => Err(AppError::new(
            2,
            format!(
                "Cannot infer the profile format of '{}'; pass --format bestprof|ascii|csv.",
                path.display()
            ),
        )),
    }
}

fn empty_profile(format: ProfileFormat) -> LoadedProfile {
    LoadedProfile {
        source: Default::default(),
        format,
        name: None,
        samples: Vec::new(),
        period_ms: None,
        period_error_ms: None,
        obs_start: None,
    }
}

/// Parse a PRESTO `.bestprof` file. The profile minimum is subtracted.
pub fn parse_bestprof(text: &str) -> Result<LoadedProfile, AppError> {
    let mut out = empty_profile(ProfileFormat::Bestprof);
    let mut header: HashMap<String, String> = HashMap::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            if let Some((key, value)) = rest.split_once('=') {
                header.insert(normalize_header_key(key), value.trim().to_string());
            }
            continue;
        }
        let last = trimmed
            .split_whitespace()
            .last()
            .ok_or_else(|| AppError::new(2, format!("bestprof line {line_no}: empty data line")))?;
        out.samples.push(parse_sample(last, line_no)?);
    }

    if let Some(candidate) = header.get("candidate") {
        out.name = Some(pulsar_name(candidate));
    }
    let epoch = header.get("epoch_topo").or_else(|| header.get("epoch_bary"));
    out.obs_start = epoch.and_then(|v| v.parse::<f64>().ok()).and_then(mjd_to_utc);

    let period = header.get("p_topo").or_else(|| header.get("p_bary"));
    if let Some(period) = period {
        let (value, error) = parse_value_with_error(period);
        out.period_ms = value;
        out.period_error_ms = error;
    }

    if let Some(min) = crate::math::min(&out.samples) {
        for v in out.samples.iter_mut() {
            *v -= min;
        }
    }
    Ok(out)
}

/// Parse psrchive-style text: skip the first line, read the fourth column.
pub fn parse_ascii(text: &str) -> Result<LoadedProfile, AppError> {
    let mut out = empty_profile(ProfileFormat::Ascii);
    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let field = line.split_whitespace().nth(3).ok_or_else(|| {
            AppError::new(2, format!("ascii line {line_no}: expected at least 4 columns"))
        })?;
        out.samples.push(parse_sample(field, line_no)?);
    }
    Ok(out)
}

/// Parse a CSV profile with a header row.
pub fn parse_csv(text: &str) -> Result<LoadedProfile, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let column = CSV_INTENSITY_COLUMNS
        .iter()
        .find_map(|name| header_map.get(*name).copied())
        .ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "CSV profile needs one of the columns: {}.",
                    CSV_INTENSITY_COLUMNS.join(", ")
                ),
            )
        })?;

    let mut out = empty_profile(ProfileFormat::Csv);
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, lines are 1-based.
        let line_no = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV line {line_no}: parse error: {e}")))?;
        let field = record
            .get(column)
            .ok_or_else(|| AppError::new(2, format!("CSV line {line_no}: missing intensity column")))?;
        out.samples.push(parse_sample(field, line_no)?);
    }
    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// `"P_topo (ms)"` -> `"p_topo"`.
fn normalize_header_key(key: &str) -> String {
    let key = key.trim();
    let key = key.split_once('(').map_or(key, |(k, _)| k);
    key.trim().to_ascii_lowercase()
}

fn parse_sample(field: &str, line_no: usize) -> Result<f64, AppError> {
    let v: f64 = field
        .trim()
        .parse()
        .map_err(|_| AppError::new(2, format!("line {line_no}: '{field}' is not a number")))?;
    if !v.is_finite() {
        return Err(AppError::new(2, format!("line {line_no}: '{field}' is not finite")));
    }
    Ok(v)
}

/// `"5.7575  +/- 1.2e-05"` -> `(Some(5.7575), Some(1.2e-05))`.
fn parse_value_with_error(s: &str) -> (Option<f64>, Option<f64>) {
    match s.split_once("+/-") {
        Some((v, e)) => (v.trim().parse().ok(), e.trim().parse().ok()),
        None => (s.trim().parse().ok(), None),
    }
}

/// `"PSR_0437-4715"` -> `"J0437-4715"`.
fn pulsar_name(candidate: &str) -> String {
    let tail = candidate.rsplit('_').next().unwrap_or(candidate).trim();
    if tail.starts_with('J') || tail.starts_with('B') {
        tail.to_string()
    } else {
        format!("J{tail}")
    }
}

/// Convert a UTC Modified Julian Date to a timestamp.
pub fn mjd_to_utc(mjd: f64) -> Option<DateTime<Utc>> {
    if !mjd.is_finite() {
        return None;
    }
    let seconds = (mjd - MJD_UNIX_EPOCH) * 86_400.0;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;

    const BESTPROF: &str = "\
# Input file       =  1117643248_PSR_J0437-4715.fits
# Candidate        =  PSR_0437-4715
# Telescope        =  MWA
# Epoch_topo       =  58000.5
# Epoch_bary (MJD) =  N/A
# T_sample         =  0.0001
# Data Folded      =  60000
# P_topo (ms)      =  5.7575  +/- 1.2e-05
######################################################
   0  10.0
   1  12.0
   2  30.0
   3  11.0
";

    #[test]
    fn bestprof_header_and_profile() {
        let p = parse_bestprof(BESTPROF).unwrap();
        assert_eq!(p.samples, vec![0.0, 2.0, 20.0, 1.0]);
        assert_eq!(p.name.as_deref(), Some("J0437-4715"));
        assert_eq!(p.period_ms, Some(5.7575));
        assert_eq!(p.period_error_ms, Some(1.2e-05));
        let start = p.obs_start.unwrap();
        assert_eq!((start.year(), start.month(), start.day(), start.hour()), (2017, 9, 4, 12));
    }

    #[test]
    fn bestprof_bad_data_line_reports_line_number() {
        let text = format!("{BESTPROF}   4  oops\n");
        let err = parse_bestprof(&text).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 14"), "{err}");
    }

    #[test]
    fn ascii_reads_fourth_column() {
        let text = "File: x.ar Src: J0000 Nsub: 1 Nch: 1 Npol: 4 Nbin: 3\n0 0 0 1.5 0 0 0\n0 0 1 2.5 0 0 0\n0 0 2 -0.5 0 0 0\n";
        let p = parse_ascii(text).unwrap();
        assert_eq!(p.samples, vec![1.5, 2.5, -0.5]);
        assert!(parse_ascii("header\n0 0 0\n").is_err());
    }

    #[test]
    fn csv_finds_intensity_column_with_bom() {
        let text = "\u{feff}Bin,Flux\n0,1.0\n1,3.5\n";
        let p = parse_csv(text).unwrap();
        assert_eq!(p.samples, vec![1.0, 3.5]);
        assert!(parse_csv("bin,phase\n0,0.1\n").is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(detect_format(Path::new("a.bestprof")).unwrap(), ProfileFormat::Bestprof);
        assert_eq!(detect_format(Path::new("a.CSV")).unwrap(), ProfileFormat::Csv);
        assert_eq!(detect_format(Path::new("a.txt")).unwrap(), ProfileFormat::Ascii);
        assert!(detect_format(Path::new("a.fits")).is_err());
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".bestprof").tempfile().unwrap();
        file.write_all(BESTPROF.as_bytes()).unwrap();
        let p = load_profile(file.path(), None).unwrap();
        assert_eq!(p.format, ProfileFormat::Bestprof);
        assert_eq!(p.source, file.path());
        assert_eq!(p.samples.len(), 4);
    }

    #[test]
    fn mjd_epoch_conversion() {
        let t = mjd_to_utc(40587.0).unwrap();
        assert_eq!(t.timestamp(), 0);
        assert!(mjd_to_utc(f64::NAN).is_none());
    }
}
