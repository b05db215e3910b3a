// Error types for ProbeRun
//
// Structured errors for configuration loading and process startup. Probe
// failures never use these types: probes report problems as Message values
// so a broken service cannot crash its worker.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a worker or the whole process
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No usable configuration was found (process exits with code 2)
    #[error("no configuration found in {dir}")]
    NoConfig { dir: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_read_error_message() {
        let err = MonitorError::ConfigRead {
            path: PathBuf::from("/config/web.yaml"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/config/web.yaml"));
        assert!(msg.contains("failed to read"));
    }

    #[test]
    fn test_no_config_error_message() {
        let err = MonitorError::NoConfig {
            dir: PathBuf::from("/config"),
        };
        assert!(err.to_string().contains("no configuration found"));
    }

    #[test]
    fn test_error_source_preserved() {
        use std::error::Error;

        let err = MonitorError::ConfigRead {
            path: PathBuf::from("a.yaml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
    }
}
