use std::path::Path;

use encoding_rs::WINDOWS_1252;

use crate::acquisition::AcquisitionSystem;
use crate::error::{HypcardError, Result};

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// Numeric type a status-log field coerces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
}

/// Declarative extraction rule for one status-log field.
///
/// A line belongs to a field when it contains `label` as a substring. The
/// value is the text between the first occurrence of `delimiter` and
/// `trim_tail` characters stripped off the line end (the unit suffix),
/// whitespace-trimmed, then coerced per `kind` and divided by `divisor`.
///
/// The vendor log has no grammar beyond this rule, so the whole format
/// lives in [`STATUS_FIELDS`] as data; a variant log is a different table
/// passed to [`parse_status_log_with_fields`], not a code change.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical field name used in error messages.
    pub name: &'static str,
    /// Substring that selects the line.
    pub label: &'static str,
    /// Text preceding the value, usually `":"`.
    pub delimiter: &'static str,
    /// Unit-suffix characters stripped from the line end.
    pub trim_tail: usize,
    /// Target numeric type.
    pub kind: FieldKind,
    /// Unit-normalization divisor applied to floats (1.0 for none).
    pub divisor: f64,
    /// Absent required fields abort the parse; optional ones default.
    pub required: bool,
}

/// Extraction table for the AttoLight status log.
///
/// Tail counts match the unit suffixes the vendor software writes, e.g.
/// `" pixel"` after resolutions and `" l/mm"` after the groove density.
/// `Signal Amplification` is the one field keyed on `":x"` because its value
/// shares the line with a multiplier prefix. `Channels` is the one optional
/// field; when absent, the detector default from the acquisition system
/// applies.
pub const STATUS_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "Horizontal Binning",
        label: "Horizontal Binning:",
        delimiter: ":",
        trim_tail: 0,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Resolution_X",
        label: "Resolution_X",
        delimiter: ":",
        trim_tail: 6,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Resolution_Y",
        label: "Resolution_Y",
        delimiter: ":",
        trim_tail: 6,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Real Magnification",
        label: "Real Magnification",
        delimiter: ":",
        trim_tail: 0,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Grating - Groove Density",
        label: "Grating - Groove Density:",
        delimiter: ":",
        trim_tail: 5,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Central wavelength",
        label: "Central wavelength:",
        delimiter: ":",
        trim_tail: 3,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Channels",
        label: "Channels:",
        delimiter: ":",
        trim_tail: 0,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: false,
    },
    FieldSpec {
        name: "Signal Amplification",
        label: "Signal Amplification:",
        delimiter: ":x",
        trim_tail: 0,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Readout Rate",
        label: "Readout Rate (horizontal pixel shift):",
        delimiter: ":",
        trim_tail: 3,
        kind: FieldKind::Integer,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Exposure Time",
        label: "Exposure Time:",
        delimiter: ":",
        trim_tail: 2,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "HYP Dwelltime",
        label: "HYP Dwelltime:",
        delimiter: ":",
        trim_tail: 3,
        kind: FieldKind::Float,
        // milliseconds in the log, seconds in the parameters
        divisor: 1000.0,
        required: true,
    },
    FieldSpec {
        name: "Beam Energy",
        label: "Beam Energy:",
        delimiter: ":",
        trim_tail: 2,
        kind: FieldKind::Float,
        // volts in the log, kilovolts in the parameters
        divisor: 1000.0,
        required: true,
    },
    FieldSpec {
        name: "Gun Lens",
        label: "Gun Lens:",
        delimiter: ":",
        trim_tail: 2,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Objective Lens",
        label: "Objective Lens:",
        delimiter: ":",
        trim_tail: 2,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Aperture",
        label: "Aperture:",
        delimiter: ":",
        trim_tail: 3,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
    FieldSpec {
        name: "Aperture Chamber Pressure",
        label: "Aperture Chamber Pressure:",
        delimiter: ":",
        trim_tail: 5,
        kind: FieldKind::Float,
        divisor: 1.0,
        required: true,
    },
];

// ---------------------------------------------------------------------------
// InstrumentParameters
// ---------------------------------------------------------------------------

/// Typed instrument settings recovered from one status log.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentParameters {
    /// Hardware pixel-combination factor on the detector.
    pub binning: usize,
    /// Scan pixels in x.
    pub resolution_x: usize,
    /// Scan pixels in y.
    pub resolution_y: usize,
    /// Field of view, in instrument magnification units.
    pub field_of_view: f64,
    /// Grating groove density, grooves/mm.
    pub grating: f64,
    /// Spectrometer center wavelength, nm.
    pub central_wavelength_nm: f64,
    /// Detector channels before binning.
    pub total_channels: usize,
    /// Detector channels after binning; the cube's spectral length.
    pub effective_channel_count: usize,
    /// CCD signal amplification.
    pub amplification: i64,
    /// CCD readout rate, Hz.
    pub readout_rate_hz: i64,
    /// CCD exposure time, s.
    pub exposure_time_s: f64,
    /// Scan dwell time, s (normalized from ms).
    pub dwell_time_s: f64,
    /// Beam acceleration voltage, kV (normalized from V).
    pub beam_voltage_kv: f64,
    /// Gun lens current, A.
    pub gun_lens_amps: f64,
    /// Objective lens current, A.
    pub objective_lens_amps: f64,
    /// Aperture diameter, um.
    pub aperture_um: f64,
    /// Aperture chamber pressure, Torr.
    pub chamber_pressure_torr: f64,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FieldValue {
    Integer(i64),
    Float(f64),
}

/// Parse a status log with the standard field table.
pub fn parse_status_log(path: &Path, system: &AcquisitionSystem) -> Result<InstrumentParameters> {
    parse_status_log_with_fields(path, system, STATUS_FIELDS)
}

/// Parse a status log with a caller-supplied field table.
///
/// The table may change labels, delimiters, and tails, but must keep the
/// canonical field names; those are the join keys for assembling
/// [`InstrumentParameters`].
pub fn parse_status_log_with_fields(
    path: &Path,
    system: &AcquisitionSystem,
    fields: &[FieldSpec],
) -> Result<InstrumentParameters> {
    let bytes = std::fs::read(path)?;
    // The vendor software writes Windows-1252, not UTF-8. Free-text lines
    // (operator names, sample notes) routinely carry non-ASCII bytes.
    let (text, _, _) = WINDOWS_1252.decode(&bytes);

    let mut values: Vec<(&'static str, FieldValue)> = Vec::new();
    for line in text.lines() {
        for spec in fields {
            if !line.contains(spec.label) {
                continue;
            }
            let value = coerce_field(line, spec)?;
            // A repeated label overwrites, keeping the last occurrence.
            if let Some(slot) = values.iter_mut().find(|(name, _)| *name == spec.name) {
                slot.1 = value;
            } else {
                values.push((spec.name, value));
            }
        }
    }

    assemble(&values, system)
}

/// Extract and coerce one field value from its line.
fn coerce_field(line: &str, spec: &FieldSpec) -> Result<FieldValue> {
    let span = extract_span(line, spec)
        .ok_or_else(|| HypcardError::malformed(spec.name, line.trim()))?;
    let span = span.trim();
    match spec.kind {
        FieldKind::Integer => span
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| HypcardError::malformed(spec.name, span)),
        FieldKind::Float => span
            .parse::<f64>()
            .map(|v| FieldValue::Float(v / spec.divisor))
            .map_err(|_| HypcardError::malformed(spec.name, span)),
    }
}

/// The raw value span: between the delimiter and the trailing unit suffix.
fn extract_span<'a>(line: &'a str, spec: &FieldSpec) -> Option<&'a str> {
    let at = line.find(spec.delimiter)?;
    let start = at + spec.delimiter.len();
    let end = line.len().checked_sub(spec.trim_tail)?;
    if end < start {
        return None;
    }
    // `get` rejects non-boundary indices from multibyte unit suffixes.
    line.get(start..end)
}

fn assemble(
    values: &[(&'static str, FieldValue)],
    system: &AcquisitionSystem,
) -> Result<InstrumentParameters> {
    let int = |name: &'static str| -> Result<i64> {
        match values.iter().find(|(n, _)| *n == name) {
            Some((_, FieldValue::Integer(i))) => Ok(*i),
            Some((_, FieldValue::Float(v))) => Ok(*v as i64),
            None => Err(HypcardError::MissingField(name)),
        }
    };
    let float = |name: &'static str| -> Result<f64> {
        match values.iter().find(|(n, _)| *n == name) {
            Some((_, FieldValue::Float(v))) => Ok(*v),
            Some((_, FieldValue::Integer(i))) => Ok(*i as f64),
            None => Err(HypcardError::MissingField(name)),
        }
    };
    let positive = |name: &'static str, value: i64| -> Result<usize> {
        usize::try_from(value)
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| HypcardError::malformed(name, value.to_string()))
    };

    let binning = positive("Horizontal Binning", int("Horizontal Binning")?)?;
    let resolution_x = positive("Resolution_X", int("Resolution_X")?)?;
    let resolution_y = positive("Resolution_Y", int("Resolution_Y")?)?;

    // Absence of `Channels` is the one silent default: the detector channel
    // count from the acquisition system. Every other absence is fatal.
    let total_channels = match values.iter().find(|(n, _)| *n == "Channels") {
        Some((_, FieldValue::Integer(i))) => positive("Channels", *i)?,
        Some((_, FieldValue::Float(v))) => positive("Channels", *v as i64)?,
        None => system.default_channel_count,
    };

    if total_channels % binning != 0 {
        log::warn!(
            "binning {} does not divide {} channels evenly; truncating",
            binning,
            total_channels
        );
    }
    let effective_channel_count = total_channels / binning;

    Ok(InstrumentParameters {
        binning,
        resolution_x,
        resolution_y,
        field_of_view: float("Real Magnification")?,
        grating: float("Grating - Groove Density")?,
        central_wavelength_nm: float("Central wavelength")?,
        total_channels,
        effective_channel_count,
        amplification: int("Signal Amplification")?,
        readout_rate_hz: int("Readout Rate")?,
        exposure_time_s: float("Exposure Time")?,
        dwell_time_s: float("HYP Dwelltime")?,
        beam_voltage_kv: float("Beam Energy")?,
        gun_lens_amps: float("Gun Lens")?,
        objective_lens_amps: float("Objective Lens")?,
        aperture_um: float("Aperture")?,
        chamber_pressure_torr: float("Aperture Chamber Pressure")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionRegistry;
    use crate::acquisition::DEFAULT_ACQUISITION_SYSTEM;
    use std::io::Write;

    const FULL_LOG: &str = "\
AttoLight status report
Horizontal Binning: 2
Resolution_X: 64 pixel
Resolution_Y: 32 pixel
Real Magnification: 488.28125
Grating - Groove Density: 150 l/mm
Central wavelength: 650 nm
Channels: 1024
Signal Amplification:x2
Readout Rate (horizontal pixel shift): 1000000 Hz
Exposure Time: 0.05 s
HYP Dwelltime: 1.5 ms
Beam Energy: 6000 V
Gun Lens: 1.2 A
Objective Lens: 0.5 A
Aperture: 100 um
Aperture Chamber Pressure: 0.0001 Torr
";

    fn write_log(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MicroscopeStatus.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        (dir, path)
    }

    fn default_system() -> AcquisitionSystem {
        AcquisitionRegistry::builtin()
            .lookup(DEFAULT_ACQUISITION_SYSTEM)
            .unwrap()
            .clone()
    }

    #[test]
    fn parses_full_log() {
        let (_dir, path) = write_log(FULL_LOG.as_bytes());
        let p = parse_status_log(&path, &default_system()).unwrap();

        assert_eq!(p.binning, 2);
        assert_eq!(p.resolution_x, 64);
        assert_eq!(p.resolution_y, 32);
        assert_eq!(p.field_of_view, 488.28125);
        assert_eq!(p.grating, 150.0);
        assert_eq!(p.central_wavelength_nm, 650.0);
        assert_eq!(p.total_channels, 1024);
        assert_eq!(p.effective_channel_count, 512);
        assert_eq!(p.amplification, 2);
        assert_eq!(p.readout_rate_hz, 1_000_000);
        assert_eq!(p.exposure_time_s, 0.05);
        assert_eq!(p.dwell_time_s, 0.0015);
        assert_eq!(p.beam_voltage_kv, 6.0);
        assert_eq!(p.gun_lens_amps, 1.2);
        assert_eq!(p.objective_lens_amps, 0.5);
        assert_eq!(p.aperture_um, 100.0);
        assert_eq!(p.chamber_pressure_torr, 0.0001);
    }

    #[test]
    fn missing_channels_defaults_from_system() {
        let log = FULL_LOG.replace("Channels: 1024\n", "");
        let (_dir, path) = write_log(log.as_bytes());
        let p = parse_status_log(&path, &default_system()).unwrap();
        assert_eq!(p.total_channels, 1024);
        assert_eq!(p.effective_channel_count, 512);
    }

    #[test]
    fn missing_required_field_is_fatal() {
        let log = FULL_LOG.replace("Resolution_X: 64 pixel\n", "");
        let (_dir, path) = write_log(log.as_bytes());
        let err = parse_status_log(&path, &default_system()).unwrap_err();
        assert!(matches!(err, HypcardError::MissingField("Resolution_X")));
    }

    #[test]
    fn malformed_value_is_fatal() {
        let log = FULL_LOG.replace("Central wavelength: 650 nm", "Central wavelength: oops nm");
        let (_dir, path) = write_log(log.as_bytes());
        let err = parse_status_log(&path, &default_system()).unwrap_err();
        assert!(matches!(
            err,
            HypcardError::MalformedField { field: "Central wavelength", .. }
        ));
    }

    #[test]
    fn windows_1252_free_text_does_not_break_parsing() {
        // 0xB5 is the micro sign, 0xFC is u-umlaut; neither is valid UTF-8.
        let mut log = Vec::new();
        log.extend_from_slice(b"Operator: M\xFCller (5 \xB5m steps)\n");
        log.extend_from_slice(FULL_LOG.as_bytes());
        let (_dir, path) = write_log(&log);
        let p = parse_status_log(&path, &default_system()).unwrap();
        assert_eq!(p.resolution_x, 64);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let log = FULL_LOG.replace('\n', "\r\n");
        let (_dir, path) = write_log(log.as_bytes());
        let p = parse_status_log(&path, &default_system()).unwrap();
        assert_eq!(p.resolution_y, 32);
        assert_eq!(p.aperture_um, 100.0);
    }

    #[test]
    fn uneven_binning_truncates() {
        let log = FULL_LOG.replace("Channels: 1024", "Channels: 1023");
        let (_dir, path) = write_log(log.as_bytes());
        let p = parse_status_log(&path, &default_system()).unwrap();
        assert_eq!(p.effective_channel_count, 511);
    }

    #[test]
    fn custom_field_table() {
        // A variant log that writes resolutions without the " pixel" suffix.
        let mut fields = STATUS_FIELDS.to_vec();
        for spec in &mut fields {
            if spec.name == "Resolution_X" || spec.name == "Resolution_Y" {
                spec.trim_tail = 0;
            }
        }
        let log = FULL_LOG
            .replace("Resolution_X: 64 pixel", "Resolution_X: 64")
            .replace("Resolution_Y: 32 pixel", "Resolution_Y: 32");
        let (_dir, path) = write_log(log.as_bytes());
        let p = parse_status_log_with_fields(&path, &default_system(), &fields).unwrap();
        assert_eq!(p.resolution_x, 64);
        assert_eq!(p.resolution_y, 32);
    }
}
