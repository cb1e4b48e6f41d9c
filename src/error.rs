use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors raised while loading a HYPCard capture.
///
/// Every variant aborts the whole load; there is no partial cube. The only
/// recoverable condition, a missing or malformed background file, never
/// surfaces here (see [`crate::background`]).
#[derive(Error, Debug)]
pub enum HypcardError {
    /// The requested acquisition system is not in the registry.
    #[error("unknown acquisition system: '{0}'")]
    UnknownAcquisitionSystem(String),

    /// A required status-log field was absent.
    #[error("status log is missing required field '{0}'")]
    MissingField(&'static str),

    /// A status-log field was present but its value could not be coerced.
    #[error("status log field '{field}' has malformed value '{value}'")]
    MalformedField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw text that failed to parse.
        value: String,
    },

    /// The binary capture holds fewer samples than the status log promises.
    #[error("truncated capture: expected {expected} bytes, found {actual}")]
    TruncatedFile {
        /// Byte count implied by channels * resolution_x * resolution_y.
        expected: u64,
        /// Byte count actually available.
        actual: u64,
    },

    /// The binary layout cannot be assembled into a cube.
    #[error("capture layout mismatch: {0}")]
    FormatMismatch(String),

    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HypcardError {
    /// Create a malformed-field error from the raw text span.
    pub fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            value: value.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HypcardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let e = HypcardError::MissingField("Resolution_X");
        assert_eq!(
            e.to_string(),
            "status log is missing required field 'Resolution_X'"
        );
    }

    #[test]
    fn display_truncated() {
        let e = HypcardError::TruncatedFile {
            expected: 4096,
            actual: 4095,
        };
        assert_eq!(
            e.to_string(),
            "truncated capture: expected 4096 bytes, found 4095"
        );
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: HypcardError = io.into();
        assert!(matches!(e, HypcardError::Io(_)));
    }
}
