use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ExecMode;
use crate::backend::{BackendError, StorageBackend};
use crate::name::{GroupName, NameError, NameFormat, SnapshotName};
use crate::retention::Dated;

/// Lifecycle of a snapshot within one run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    /// Built locally, not yet known to the backend.
    Pending,
    /// Exists on the backend.
    Active,
    /// Removed from the backend (or would have been, in simulate mode).
    Destroyed,
}

impl SnapshotState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time snapshot of one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    name: SnapshotName,
    state: SnapshotState,
}

impl Snapshot {
    /// A fresh snapshot stamped with `now`, truncated to the minute.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidVolume`] for an unusable volume name.
    pub fn pending<Tz: TimeZone>(
        volume: &str,
        group: Option<GroupName>,
        now: &DateTime<Tz>,
    ) -> Result<Self, NameError> {
        Ok(Self {
            name: SnapshotName::new(volume, group, now)?,
            state: SnapshotState::Pending,
        })
    }

    /// A snapshot reported by the backend listing.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidFormat`] when `name` is not a zsnap name.
    pub fn from_name(name: &str) -> Result<Self, NameError> {
        Ok(Self {
            name: SnapshotName::decode(name)?,
            state: SnapshotState::Active,
        })
    }

    /// Backend name, in the format revision the snapshot was created with.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.encode()
    }

    #[must_use]
    pub fn volume(&self) -> &str {
        self.name.volume()
    }

    #[must_use]
    pub const fn group(&self) -> Option<&GroupName> {
        self.name.group()
    }

    #[must_use]
    pub const fn time(&self) -> DateTime<FixedOffset> {
        self.name.time()
    }

    #[must_use]
    pub const fn format(&self) -> NameFormat {
        self.name.format()
    }

    #[must_use]
    pub const fn state(&self) -> SnapshotState {
        self.state
    }

    pub(crate) fn create(
        &mut self,
        backend: &dyn StorageBackend,
        mode: ExecMode,
    ) -> Result<(), BackendError> {
        debug_assert_eq!(self.state, SnapshotState::Pending);
        let name = self.name();
        if mode.is_simulate() {
            info!(snapshot = %name, "would create snapshot");
        } else {
            info!(snapshot = %name, "creating snapshot");
            backend.create_snapshot(&name)?;
        }
        self.state = SnapshotState::Active;
        Ok(())
    }

    pub(crate) fn destroy(
        &mut self,
        backend: &dyn StorageBackend,
        mode: ExecMode,
    ) -> Result<(), BackendError> {
        debug_assert_eq!(self.state, SnapshotState::Active);
        let name = self.name();
        if mode.is_simulate() {
            info!(snapshot = %name, "would destroy snapshot");
        } else {
            info!(snapshot = %name, "destroying snapshot");
            backend.destroy_snapshot(&name)?;
        }
        self.state = SnapshotState::Destroyed;
        Ok(())
    }
}

impl Dated for Snapshot {
    fn created_at(&self) -> DateTime<FixedOffset> {
        self.time()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.name, f)
    }
}
