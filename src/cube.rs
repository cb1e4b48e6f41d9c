use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use ndarray::{Array3, ShapeBuilder};

use crate::error::{HypcardError, Result};
use crate::metadata::Metadata;
use crate::status::InstrumentParameters;

// ---------------------------------------------------------------------------
// Axis descriptors
// ---------------------------------------------------------------------------

/// Linear scale attached to one cube axis: value(i) = offset + scale * i.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisDescriptor {
    pub name: String,
    pub units: String,
    pub scale: f64,
    pub offset: f64,
    /// Number of points along the axis.
    pub size: usize,
}

impl AxisDescriptor {
    /// A fresh index axis, before calibration.
    pub fn uncalibrated(size: usize) -> Self {
        Self {
            name: String::new(),
            units: String::new(),
            scale: 1.0,
            offset: 0.0,
            size,
        }
    }

    /// Materialize the axis values.
    pub fn values(&self) -> Vec<f64> {
        (0..self.size)
            .map(|i| self.offset + self.scale * i as f64)
            .collect()
    }
}

/// Background trace paired with the cube's wavelength axis.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSpectrum {
    /// Wavelength values, one per spectral channel.
    pub wavelength: Vec<f64>,
    /// Background counts, same length as `wavelength`.
    pub counts: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Binary decoding
// ---------------------------------------------------------------------------

/// Bytes per sample in the capture stream (little-endian i32).
const SAMPLE_BYTES: usize = 4;

/// Sample count implied by the instrument parameters.
fn expected_samples(channels: usize, nx: usize, ny: usize) -> Result<usize> {
    channels
        .checked_mul(nx)
        .and_then(|n| n.checked_mul(ny))
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            HypcardError::FormatMismatch(format!(
                "cube dimensions {channels} x {nx} x {ny} do not form a valid sample count"
            ))
        })
}

/// Byte length the capture file must hold for these parameters.
pub fn expected_byte_len(params: &InstrumentParameters) -> Result<u64> {
    let samples = expected_samples(
        params.effective_channel_count,
        params.resolution_x,
        params.resolution_y,
    )?;
    Ok(samples as u64 * SAMPLE_BYTES as u64)
}

/// Decode a capture file into the oriented cube.
///
/// Reads exactly `effective_channel_count * resolution_x * resolution_y`
/// little-endian i32 samples from offset 0 and converts them to f64. A short
/// file is [`HypcardError::TruncatedFile`]; trailing padding after the
/// expected count is ignored.
pub fn decode_cube(path: &Path, params: &InstrumentParameters) -> Result<Array3<f64>> {
    decode_cube_dims(
        path,
        params.effective_channel_count,
        params.resolution_x,
        params.resolution_y,
    )
}

fn decode_cube_dims(path: &Path, channels: usize, nx: usize, ny: usize) -> Result<Array3<f64>> {
    let samples = expected_samples(channels, nx, ny)?;
    let expected = samples * SAMPLE_BYTES;

    let mut file = std::fs::File::open(path)?;
    let actual_len = file.metadata()?.len();
    if actual_len < expected as u64 {
        return Err(HypcardError::TruncatedFile {
            expected: expected as u64,
            actual: actual_len,
        });
    }

    let mut bytes = vec![0u8; expected];
    file.read_exact(&mut bytes)?;
    drop(file);

    let values: Vec<f64> = bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|chunk| LittleEndian::read_i32(chunk) as f64)
        .collect();

    // Samples are column-major with channel fastest: shape [channel, x, y]
    // in Fortran order.
    let raw = Array3::from_shape_vec((channels, nx, ny).f(), values)
        .map_err(|e| HypcardError::FormatMismatch(e.to_string()))?;

    Ok(orient_cube(raw))
}

/// Reorient a freshly decoded `[channel, x, y]` cube to the output
/// convention `[y, x, channel]`.
///
/// Two fixed steps, in this order: swap the spatial axes, then move the
/// spectral axis to the end. The permutation encodes the source instrument's
/// scan orientation; changing either step mislabels the spatial axes.
pub fn orient_cube(raw: Array3<f64>) -> Array3<f64> {
    let mut cube = raw;
    cube.swap_axes(1, 2);
    let cube = cube.permuted_axes([1, 2, 0]);
    // Own a contiguous copy so the cube no longer references the decode
    // buffer's layout.
    cube.as_standard_layout().to_owned()
}

// ---------------------------------------------------------------------------
// DataCube
// ---------------------------------------------------------------------------

/// Cube sample storage, either decoded or still on disk.
#[derive(Debug, Clone)]
enum CubeStorage {
    Loaded(Array3<f64>),
    /// Deferred decode; the file length was validated at load time.
    OnDisk(PathBuf),
}

/// A calibrated hyperspectral cube: two spatial axes and one spectral axis.
///
/// Shape is `[resolution_y, resolution_x, channels]`. With deferred storage
/// the samples stay on disk until first access; axes and metadata are always
/// populated eagerly, so calibration results do not depend on the storage
/// mode.
#[derive(Debug, Clone)]
pub struct DataCube {
    storage: CubeStorage,
    shape: (usize, usize, usize),
    /// Axis descriptors in array order: two navigation axes, then signal.
    pub axes: [AxisDescriptor; 3],
    /// Provenance metadata, populated once during load.
    pub metadata: Metadata,
    /// Optional background trace, when a companion file was found.
    pub background: Option<BackgroundSpectrum>,
}

impl DataCube {
    /// Wrap an already decoded array.
    pub fn from_array(data: Array3<f64>) -> Self {
        let dims = data.dim();
        Self {
            storage: CubeStorage::Loaded(data),
            shape: dims,
            axes: [
                AxisDescriptor::uncalibrated(dims.0),
                AxisDescriptor::uncalibrated(dims.1),
                AxisDescriptor::uncalibrated(dims.2),
            ],
            metadata: Metadata::new(),
            background: None,
        }
    }

    /// Defer decoding of `path`, which must already be length-checked.
    pub fn deferred(path: PathBuf, params: &InstrumentParameters) -> Self {
        let shape = (
            params.resolution_y,
            params.resolution_x,
            params.effective_channel_count,
        );
        Self {
            storage: CubeStorage::OnDisk(path),
            shape,
            axes: [
                AxisDescriptor::uncalibrated(shape.0),
                AxisDescriptor::uncalibrated(shape.1),
                AxisDescriptor::uncalibrated(shape.2),
            ],
            metadata: Metadata::new(),
            background: None,
        }
    }

    /// Cube shape as `(resolution_y, resolution_x, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// The spectral axis descriptor.
    pub fn signal_axis(&self) -> &AxisDescriptor {
        &self.axes[2]
    }

    /// Whether the samples are decoded in memory.
    pub fn is_materialized(&self) -> bool {
        matches!(self.storage, CubeStorage::Loaded(_))
    }

    /// Decode deferred samples now. A no-op for in-memory cubes.
    pub fn materialize(&mut self) -> Result<()> {
        if let CubeStorage::OnDisk(path) = &self.storage {
            let (ny, nx, channels) = self.shape;
            let data = decode_cube_dims(path, channels, nx, ny)?;
            self.storage = CubeStorage::Loaded(data);
        }
        Ok(())
    }

    /// The samples, decoding them first if still deferred.
    pub fn data(&mut self) -> Result<&Array3<f64>> {
        self.materialize()?;
        match &self.storage {
            CubeStorage::Loaded(data) => Ok(data),
            CubeStorage::OnDisk(_) => unreachable!("materialize replaces deferred storage"),
        }
    }

    /// The samples, if already decoded.
    pub fn data_if_materialized(&self) -> Option<&Array3<f64>> {
        match &self.storage {
            CubeStorage::Loaded(data) => Some(data),
            CubeStorage::OnDisk(_) => None,
        }
    }
}
