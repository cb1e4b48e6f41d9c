use crate::acquisition::AcquisitionSystem;
use crate::cube::DataCube;

// ---------------------------------------------------------------------------
// Signal axis (wavelength)
// ---------------------------------------------------------------------------

/// Half-width of the spectrometer window around the center wavelength, nm.
///
/// The vendor export assumes the dispersion is linear over a fixed
/// center +/- 273 nm span regardless of grating. Reference exports confirm
/// the convention (center 650 -> 377..925, center 750 -> 478..1024). This is
/// a documented approximation of the instrument; per-device calibration data
/// would be needed to do better, so the constant is kept as-is.
pub const WAVELENGTH_HALF_WINDOW_NM: f64 = 273.0;

/// Write the wavelength scale onto the cube's spectral axis.
///
/// offset = center - 273, scale = 546 / channel count. Runs once per load,
/// after the metadata envelope is populated.
pub fn calibrate_signal_axis(cube: &mut DataCube, central_wavelength_nm: f64) {
    let start = central_wavelength_nm - WAVELENGTH_HALF_WINDOW_NM;
    let end = central_wavelength_nm + WAVELENGTH_HALF_WINDOW_NM;

    let axis = &mut cube.axes[2];
    axis.name = "Wavelength".to_string();
    axis.units = "nm".to_string();
    axis.scale = (end - start) / axis.size as f64;
    axis.offset = start;
}

// ---------------------------------------------------------------------------
// Navigation axes (scan position)
// ---------------------------------------------------------------------------

/// Write the spatial scale onto both navigation axes.
///
/// scale = cal_factor_x_axis / (field_of_view * resolution_x), converted
/// from micrometers to nm. Both axes receive the same scale: the instrument
/// scans square pixels, and the vendor convention derives the scale from
/// resolution_x alone even for non-square scans.
pub fn calibrate_navigation_axes(
    cube: &mut DataCube,
    system: &AcquisitionSystem,
    field_of_view: f64,
    resolution_x: usize,
) {
    let calax = system.cal_factor_x_axis / (field_of_view * resolution_x as f64);
    let scale_nm = calax * 1000.0;

    if cube.axes[0].size != cube.axes[1].size {
        log::warn!(
            "non-square scan ({} x {}): spatial scale still derived from resolution_x",
            cube.axes[1].size,
            cube.axes[0].size
        );
    }

    for (axis, name) in cube.axes[..2].iter_mut().zip(["x", "y"]) {
        axis.name = name.to_string();
        axis.units = "nm".to_string();
        axis.scale = scale_nm;
        axis.offset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{AcquisitionRegistry, DEFAULT_ACQUISITION_SYSTEM};
    use ndarray::Array3;

    fn cube(ny: usize, nx: usize, channels: usize) -> DataCube {
        DataCube::from_array(Array3::zeros((ny, nx, channels)))
    }

    #[test]
    fn signal_axis_reference_values() {
        let mut cube = cube(2, 2, 1024);
        calibrate_signal_axis(&mut cube, 650.0);

        let axis = cube.signal_axis();
        assert_eq!(axis.name, "Wavelength");
        assert_eq!(axis.units, "nm");
        assert_eq!(axis.offset, 377.0);
        assert_eq!(axis.scale, 546.0 / 1024.0);

        let values = axis.values();
        assert_eq!(values[0], 377.0);
        assert!((values[1023] - (377.0 + 546.0 * 1023.0 / 1024.0)).abs() < 1e-9);
    }

    #[test]
    fn signal_axis_tracks_center() {
        let mut cube = cube(1, 1, 512);
        calibrate_signal_axis(&mut cube, 750.0);
        assert_eq!(cube.signal_axis().offset, 477.0);
        assert_eq!(cube.signal_axis().scale, 546.0 / 512.0);
    }

    #[test]
    fn navigation_axes_share_one_scale() {
        let system = AcquisitionRegistry::builtin()
            .lookup(DEFAULT_ACQUISITION_SYSTEM)
            .unwrap()
            .clone();
        let mut cube = cube(32, 64, 8);
        calibrate_navigation_axes(&mut cube, &system, 488.28125, 64);

        // 131072 / (488.28125 * 64) = 4.194304 um, times 1000 for nm.
        let expected = 4194.304;
        for (axis, name) in cube.axes[..2].iter().zip(["x", "y"]) {
            assert_eq!(axis.name, name);
            assert_eq!(axis.units, "nm");
            assert!((axis.scale - expected).abs() < 1e-9);
            assert_eq!(axis.offset, 0.0);
        }
        // The signal axis is untouched.
        assert_eq!(cube.axes[2].name, "");
    }
}
