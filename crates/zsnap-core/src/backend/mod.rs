//! Storage backend seam.
//!
//! The core never talks to ZFS directly. Everything it needs from the storage
//! layer goes through [`StorageBackend`]: two listings read once per run and
//! two side-effecting calls per snapshot.

pub mod memory;
pub mod zfs;

/// A backend command that could not be run or exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to execute command '{command}':\n{output}")]
pub struct BackendError {
    /// The command line as attempted.
    pub command: String,
    /// Captured output, or the I/O error text when the command never ran.
    pub output: String,
}

impl BackendError {
    pub fn new(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
        }
    }
}

/// Operations zsnap needs from the storage layer.
pub trait StorageBackend {
    /// Raw volume listing, one record per line. The first tab-separated field
    /// of each line is the volume name.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the listing cannot be produced.
    fn list_volumes(&self) -> Result<Vec<String>, BackendError>;

    /// Raw snapshot listing, one record per line. The first tab-separated
    /// field of each line is a `VOLUME@SUFFIX` snapshot name.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the listing cannot be produced.
    fn list_snapshots(&self) -> Result<Vec<String>, BackendError>;

    /// Create the snapshot `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend refuses or fails.
    fn create_snapshot(&self, name: &str) -> Result<(), BackendError>;

    /// Destroy the snapshot `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend refuses or fails.
    fn destroy_snapshot(&self, name: &str) -> Result<(), BackendError>;
}

/// First tab-separated field of a listing line, trimmed.
#[must_use]
pub fn record_name(line: &str) -> &str {
    line.split('\t').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_name_takes_first_field() {
        assert_eq!(record_name("tank\t250591104\t5701016504448\t249751872\t/tank"), "tank");
        assert_eq!(
            record_name("tank@zsnap_2010-06-15_12:30_0100\t0\t-\t249751872\t-"),
            "tank@zsnap_2010-06-15_12:30_0100"
        );
        assert_eq!(record_name("pool/home"), "pool/home");
        assert_eq!(record_name("  \n"), "");
    }

    #[test]
    fn error_message_carries_command_and_output() {
        let err = BackendError::new("zfs snapshot tank@x", "permission denied");
        assert_eq!(
            err.to_string(),
            "unable to execute command 'zfs snapshot tank@x':\npermission denied"
        );
    }
}
