use std::collections::BTreeMap;

use crate::error::{HypcardError, Result};

// ---------------------------------------------------------------------------
// Acquisition system constants
// ---------------------------------------------------------------------------

/// Name of the acquisition system assumed when none is given.
pub const DEFAULT_ACQUISITION_SYSTEM: &str = "cambridge_attolight";

/// Fixed constants for one named acquisition system.
///
/// These are instrument properties, not per-capture settings: the status-log
/// filename the vendor software writes, the detector channel count assumed
/// when the log omits it, and the factor used to calibrate the scanning axes.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSystem {
    /// Registry key, e.g. `cambridge_attolight`.
    pub name: String,
    /// Companion status-log filename next to the capture.
    pub metadata_file_name: String,
    /// Detector channels assumed when the log has no `Channels:` line.
    pub default_channel_count: usize,
    /// Scanning-axis calibration factor, in micrometer units.
    pub cal_factor_x_axis: f64,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Read-only table of known acquisition systems.
///
/// The table is injected rather than global so tests can register synthetic
/// instruments. [`AcquisitionRegistry::builtin`] holds the systems this crate
/// ships with; shared by reference across concurrent loads.
#[derive(Debug, Clone)]
pub struct AcquisitionRegistry {
    systems: BTreeMap<String, AcquisitionSystem>,
}

impl AcquisitionRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            systems: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in systems registered.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(AcquisitionSystem {
            name: DEFAULT_ACQUISITION_SYSTEM.to_string(),
            metadata_file_name: "MicroscopeStatus.txt".to_string(),
            default_channel_count: 1024,
            cal_factor_x_axis: 131_072.0,
        });
        registry
    }

    /// Register a system, replacing any entry with the same name.
    pub fn register(&mut self, system: AcquisitionSystem) {
        self.systems.insert(system.name.clone(), system);
    }

    /// Look up a system by name.
    pub fn lookup(&self, name: &str) -> Result<&AcquisitionSystem> {
        self.systems
            .get(name)
            .ok_or_else(|| HypcardError::UnknownAcquisitionSystem(name.to_string()))
    }

    /// Names of all registered systems.
    pub fn names(&self) -> Vec<&str> {
        self.systems.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for AcquisitionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_default_system() {
        let registry = AcquisitionRegistry::builtin();
        let system = registry.lookup(DEFAULT_ACQUISITION_SYSTEM).unwrap();
        assert_eq!(system.metadata_file_name, "MicroscopeStatus.txt");
        assert_eq!(system.default_channel_count, 1024);
        assert_eq!(system.cal_factor_x_axis, 131_072.0);
    }

    #[test]
    fn unknown_system_is_an_error() {
        let registry = AcquisitionRegistry::builtin();
        let err = registry.lookup("garage_build").unwrap_err();
        assert!(matches!(
            err,
            crate::error::HypcardError::UnknownAcquisitionSystem(name) if name == "garage_build"
        ));
    }

    #[test]
    fn injected_system_overrides() {
        let mut registry = AcquisitionRegistry::builtin();
        registry.register(AcquisitionSystem {
            name: "bench_rig".to_string(),
            metadata_file_name: "Status.txt".to_string(),
            default_channel_count: 512,
            cal_factor_x_axis: 42.0,
        });
        assert_eq!(registry.lookup("bench_rig").unwrap().default_channel_count, 512);
        assert_eq!(registry.names().len(), 2);
    }
}
