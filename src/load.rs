use std::path::Path;

use crate::acquisition::{AcquisitionRegistry, DEFAULT_ACQUISITION_SYSTEM};
use crate::background::locate_background;
use crate::calibrate::{calibrate_navigation_axes, calibrate_signal_axis};
use crate::cube::{decode_cube, expected_byte_len, BackgroundSpectrum, DataCube};
use crate::error::{HypcardError, Result};
use crate::status::{parse_status_log, InstrumentParameters};

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Characters the vendor software appends to capture folder names
/// (timestamp block plus capture id).
pub const TITLE_SUFFIX_LEN: usize = 37;

/// Load a capture with the built-in registry and the default system.
///
/// `path` points at the `HYPCard.bin` file; the status log and any
/// background file are looked up in the same folder. With `lazy` the
/// samples stay on disk until first access; axes, metadata, and background
/// come out identical either way.
pub fn load_hypcard(path: impl AsRef<Path>, lazy: bool) -> Result<DataCube> {
    load_hypcard_from(
        path,
        lazy,
        DEFAULT_ACQUISITION_SYSTEM,
        &AcquisitionRegistry::builtin(),
    )
}

/// Load a capture taken with a named acquisition system.
pub fn load_hypcard_from(
    path: impl AsRef<Path>,
    lazy: bool,
    acquisition_system: &str,
    registry: &AcquisitionRegistry,
) -> Result<DataCube> {
    let path = std::fs::canonicalize(path.as_ref())?;
    let folder = path
        .parent()
        .ok_or_else(|| HypcardError::FormatMismatch("capture file has no parent folder".into()))?;

    let system = registry.lookup(acquisition_system)?;
    let params = parse_status_log(&folder.join(&system.metadata_file_name), system)?;
    log::info!(
        "loading {}: {} x {} scan, {} channels",
        path.display(),
        params.resolution_x,
        params.resolution_y,
        params.effective_channel_count
    );

    let mut cube = if lazy {
        // Deferred decode still fails atomically on a short file; only the
        // sample conversion is postponed.
        let expected = expected_byte_len(&params)?;
        let actual = std::fs::metadata(&path)?.len();
        if actual < expected {
            return Err(HypcardError::TruncatedFile { expected, actual });
        }
        DataCube::deferred(path.clone(), &params)
    } else {
        DataCube::from_array(decode_cube(&path, &params)?)
    };

    store_metadata(&mut cube, &params, &system.name);
    cube.metadata
        .set_item("General.title", experiment_title(folder, &system.name));

    // The trace is validated against the spectral length here; the pairing
    // with wavelength values waits until the signal axis is calibrated.
    let background_counts = locate_background(folder, params.effective_channel_count);

    calibrate_navigation_axes(&mut cube, system, params.field_of_view, params.resolution_x);
    calibrate_signal_axis(&mut cube, params.central_wavelength_nm);

    if let Some(counts) = background_counts {
        cube.background = Some(BackgroundSpectrum {
            wavelength: cube.signal_axis().values(),
            counts,
        });
    }

    Ok(cube)
}

// ---------------------------------------------------------------------------
// Metadata envelope
// ---------------------------------------------------------------------------

/// Write every instrument parameter into the cube's metadata tree, under the
/// key paths of the vendor export convention.
fn store_metadata(cube: &mut DataCube, params: &InstrumentParameters, system_name: &str) {
    let md = &mut cube.metadata;
    md.set_item("Acquisition_instrument.Spectrometer.grating", params.grating);
    md.set_item(
        "Acquisition_instrument.Spectrometer.central_wavelength_nm",
        params.central_wavelength_nm,
    );
    md.set_item("Acquisition_instrument.SEM.resolution_x", params.resolution_x);
    md.set_item("Acquisition_instrument.SEM.resolution_y", params.resolution_y);
    md.set_item("Acquisition_instrument.SEM.FOV", params.field_of_view);
    md.set_item(
        "Acquisition_instrument.SEM.dwell_time_scan_s",
        params.dwell_time_s,
    );
    md.set_item(
        "Acquisition_instrument.SEM.beam_acc_voltage_kv",
        params.beam_voltage_kv,
    );
    md.set_item("Acquisition_instrument.SEM.gun_lens_amps", params.gun_lens_amps);
    md.set_item(
        "Acquisition_instrument.SEM.obj_lens_amps",
        params.objective_lens_amps,
    );
    md.set_item("Acquisition_instrument.SEM.aperture_um", params.aperture_um);
    md.set_item(
        "Acquisition_instrument.SEM.chamber_pressure_torr",
        params.chamber_pressure_torr,
    );
    md.set_item("Acquisition_instrument.CCD.binning", params.binning);
    md.set_item(
        "Acquisition_instrument.CCD.total_channels",
        params.total_channels,
    );
    md.set_item(
        "Acquisition_instrument.CCD.channels",
        params.effective_channel_count,
    );
    md.set_item(
        "Acquisition_instrument.CCD.amplification",
        params.amplification,
    );
    md.set_item(
        "Acquisition_instrument.CCD.readout_rate_hz",
        params.readout_rate_hz,
    );
    md.set_item(
        "Acquisition_instrument.CCD.exposure_time_s",
        params.exposure_time_s,
    );
    md.set_item("Acquisition_instrument.acquisition_system", system_name);
}

/// Human-readable experiment title from the capture folder name.
///
/// Folders written by the default system carry a fixed-length generated
/// suffix, stripped off when the name is long enough to hold it. Other
/// systems, and names too short for the convention, pass through verbatim.
fn experiment_title(folder: &Path, system_name: &str) -> String {
    let name = folder
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if system_name != DEFAULT_ACQUISITION_SYSTEM {
        return name;
    }
    let chars: Vec<char> = name.chars().collect();
    if chars.len() >= TITLE_SUFFIX_LEN {
        chars[..chars.len() - TITLE_SUFFIX_LEN].iter().collect()
    } else {
        name
    }
}
