//! Error types for vmlaunch

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias using vmlaunch Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vmlaunch operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required host information source does not exist
    #[error("not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Reading a host information source failed for another reason
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required label is missing or the content is malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The CPU does not advertise a required feature flag
    #[error("CPU does not have required flag {flag:?} ({description})")]
    MissingCpuFlag { flag: String, description: String },

    /// The CPU info block lacks a required attribute
    #[error("CPU does not have required attribute {attribute:?} ({description})")]
    MissingCpuAttribute {
        attribute: String,
        description: String,
    },

    /// No capability policy exists for this CPU vendor
    #[error("unsupported CPU vendor: {0:?}")]
    UnsupportedCpuVendor(String),

    /// A required kernel module is not loaded
    #[error("kernel module {module:?} ({description}) not found")]
    MissingKernelModule { module: String, description: String },

    /// A kernel module parameter holds an unexpected value
    #[error(
        "kernel module {module:?} parameter {parameter:?} has value {actual:?} (expected {expected:?})"
    )]
    ModuleParameter {
        module: String,
        parameter: String,
        expected: String,
        actual: String,
    },

    /// The hypervisor process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The hypervisor process exited unsuccessfully
    #[error("hypervisor exited with {status}")]
    Exited { status: ExitStatus, stderr: String },

    /// Strict pre-flight validation found invalid items
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// KVM device preflight errors
    #[error("KVM error: {0}")]
    Kvm(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map an I/O error on `path` to `NotFound` or `ReadFailed`.
    pub(crate) fn from_read(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::ReadFailed { path, source: err }
        }
    }

    /// True if this error means a required source was absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Captured standard error of a failed launch, or "" for any other error.
    pub fn stderr(&self) -> &str {
        match self {
            Error::Exited { stderr, .. } => stderr,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        let err = Error::from_read(
            "/nonexistent",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());

        let err = Error::from_read(
            "/proc/cpuinfo",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
        assert!(matches!(err, Error::ReadFailed { .. }));
    }

    #[test]
    fn test_stderr_only_for_exited() {
        let err = Error::Config("bad".into());
        assert_eq!(err.stderr(), "");
    }

    #[test]
    fn test_invalid_config_lists_every_item() {
        let err = Error::InvalidConfig(vec!["device #0".into(), "rtc".into()]);
        assert_eq!(err.to_string(), "invalid configuration: device #0; rtc");
    }
}
