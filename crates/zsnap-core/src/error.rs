use std::fmt;

use crate::backend::BackendError;
use crate::name::NameError;
use crate::retention::RetentionError;

/// Machine-readable error codes surfaced in logs and JSON reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRetentionArgument,
    InvalidGroupName,
    ConfigParseError,
    VolumeNotFound,
    SnapshotNotTracked,
    ForeignSnapshot,
    InvalidSnapshotName,
    InvalidVolumeName,
    BackendCommandFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidRetentionArgument => "E1001",
            Self::InvalidGroupName => "E1002",
            Self::ConfigParseError => "E1003",
            Self::VolumeNotFound => "E2001",
            Self::SnapshotNotTracked => "E2002",
            Self::ForeignSnapshot => "E2003",
            Self::InvalidSnapshotName => "E3001",
            Self::InvalidVolumeName => "E3002",
            Self::BackendCommandFailed => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidRetentionArgument => "Invalid retention argument",
            Self::InvalidGroupName => "Invalid group name",
            Self::ConfigParseError => "Config file parse error",
            Self::VolumeNotFound => "Volume not found",
            Self::SnapshotNotTracked => "Snapshot not tracked by group",
            Self::ForeignSnapshot => "Snapshot belongs to another group",
            Self::InvalidSnapshotName => "Snapshot name not recognized",
            Self::InvalidVolumeName => "Invalid volume name",
            Self::BackendCommandFailed => "Backend command failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidRetentionArgument => {
                Some("Retention offsets must be non-negative and stay within the calendar.")
            }
            Self::InvalidGroupName => Some("Group names may only contain A-Z, a-z, 0-9 and '-'."),
            Self::ConfigParseError => Some("Fix syntax in the zsnap config.toml and retry."),
            Self::VolumeNotFound => Some("Check the volume name against `zfs list`."),
            Self::SnapshotNotTracked | Self::ForeignSnapshot | Self::InvalidSnapshotName => None,
            Self::InvalidVolumeName => Some("Volume names must be non-empty and contain no '@'."),
            Self::BackendCommandFailed => {
                Some("Run the reported command by hand to see the full failure.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by entity and orchestration operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Retention(#[from] RetentionError),

    #[error("volume '{0}' not found")]
    VolumeNotFound(String),

    #[error("snapshot '{0}' is not tracked by this group")]
    SnapshotNotTracked(String),

    #[error("snapshot '{snapshot}' does not belong to group '{group}'")]
    ForeignSnapshot { snapshot: String, group: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Name(err) => err.code(),
            Self::Retention(_) => ErrorCode::InvalidRetentionArgument,
            Self::VolumeNotFound(_) => ErrorCode::VolumeNotFound,
            Self::SnapshotNotTracked(_) => ErrorCode::SnapshotNotTracked,
            Self::ForeignSnapshot { .. } => ErrorCode::ForeignSnapshot,
            Self::Backend(_) => ErrorCode::BackendCommandFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode};
    use crate::backend::BackendError;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::InvalidRetentionArgument,
            ErrorCode::InvalidGroupName,
            ErrorCode::ConfigParseError,
            ErrorCode::VolumeNotFound,
            ErrorCode::SnapshotNotTracked,
            ErrorCode::ForeignSnapshot,
            ErrorCode::InvalidSnapshotName,
            ErrorCode::InvalidVolumeName,
            ErrorCode::BackendCommandFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::VolumeNotFound.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn backend_errors_map_to_backend_code() {
        let err = Error::from(BackendError::new("zfs destroy tank@x", "dataset is busy"));
        assert_eq!(err.code(), ErrorCode::BackendCommandFailed);
        assert!(err.to_string().contains("zfs destroy tank@x"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn not_found_names_the_volume() {
        let err = Error::VolumeNotFound("idonotexist".into());
        assert_eq!(err.to_string(), "volume 'idonotexist' not found");
        assert_eq!(err.code(), ErrorCode::VolumeNotFound);
    }
}
