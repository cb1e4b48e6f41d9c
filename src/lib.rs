//! Reader and calibrator for AttoLight SEM-CL hyperspectral captures.
//!
//! A capture folder holds a raw binary cube (`HYPCard.bin`), a status log
//! written by the acquisition software (`MicroscopeStatus.txt`), and
//! sometimes a background trace (`Background*.txt`). [`load_hypcard`] turns
//! the folder into one calibrated [`DataCube`].
//!
//! ```text
//!  MicroscopeStatus.txt        HYPCard.bin          Background*.txt
//!        │                         │                      │
//!        ▼                         ▼                      ▼
//!  ┌───────────┐            ┌───────────┐          ┌────────────┐
//!  │  status    │ params →  │   cube     │          │ background │
//!  └───────────┘            └───────────┘          └────────────┘
//!        │                         │                      │
//!        └────────────┬────────────┘                      │
//!                     ▼                                   │
//!              ┌────────────┐      axes, metadata         │
//!              │ calibrate   │ ───────────────────┐       │
//!              └────────────┘                     ▼       ▼
//!                                            ┌─────────────────┐
//!                                            │    DataCube      │
//!                                            └─────────────────┘
//! ```
//!
//! The acquisition-system constants used for calibration live in an
//! injectable [`AcquisitionRegistry`]; the status-log format is a
//! declarative [`status::FieldSpec`] table rather than code.

pub mod acquisition;
pub mod background;
pub mod calibrate;
pub mod cube;
pub mod error;
pub mod load;
pub mod metadata;
pub mod status;

pub use acquisition::{AcquisitionRegistry, AcquisitionSystem, DEFAULT_ACQUISITION_SYSTEM};
pub use background::{locate_background, locate_background_with_pattern};
pub use calibrate::{calibrate_navigation_axes, calibrate_signal_axis};
pub use cube::{decode_cube, AxisDescriptor, BackgroundSpectrum, DataCube};
pub use error::{HypcardError, Result};
pub use load::{load_hypcard, load_hypcard_from};
pub use metadata::{Metadata, MetadataValue};
pub use status::{
    parse_status_log, parse_status_log_with_fields, FieldKind, FieldSpec, InstrumentParameters,
    STATUS_FIELDS,
};
