use std::fmt;

use super::{ExecMode, Snapshot};
use crate::backend::StorageBackend;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::name::GroupName;
use crate::retention::Expiry;

/// Snapshots of one volume sharing a group name (or none, for the default
/// group). Membership is unique by encoded snapshot name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    volume: String,
    name: Option<GroupName>,
    snapshots: Vec<Snapshot>,
}

impl Group {
    pub(crate) fn new(volume: impl Into<String>, name: Option<GroupName>) -> Self {
        Self {
            volume: volume.into(),
            name,
            snapshots: Vec::new(),
        }
    }

    #[must_use]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// `None` for the default group.
    #[must_use]
    pub const fn name(&self) -> Option<&GroupName> {
        self.name.as_ref()
    }

    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Attach an existing snapshot. Returns `false` when a snapshot with the
    /// same name is already a member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignSnapshot`] when the snapshot's volume or group
    /// differs from this group's.
    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> Result<bool> {
        if snapshot.volume() != self.volume || snapshot.group() != self.name.as_ref() {
            return Err(Error::ForeignSnapshot {
                snapshot: snapshot.name(),
                group: self.to_string(),
            });
        }
        if self.contains(&snapshot.name()) {
            return Ok(false);
        }
        self.snapshots.push(snapshot);
        Ok(true)
    }

    /// Create a snapshot stamped with the clock's current minute and attach
    /// it once the backend accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when the backend refuses; nothing is
    /// attached in that case.
    pub fn create_snapshot(
        &mut self,
        backend: &dyn StorageBackend,
        clock: &dyn Clock,
        mode: ExecMode,
    ) -> Result<&Snapshot> {
        let mut snapshot = Snapshot::pending(&self.volume, self.name.clone(), &clock.now())?;
        snapshot.create(backend, mode)?;

        let index = match self.position(&snapshot.name()) {
            Some(index) => {
                self.snapshots[index] = snapshot;
                index
            }
            None => {
                self.snapshots.push(snapshot);
                self.snapshots.len() - 1
            }
        };
        Ok(&self.snapshots[index])
    }

    /// Destroy the member snapshot `name` and detach it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotNotTracked`] for an unknown name and
    /// [`Error::Backend`] when the backend refuses. A refused snapshot stays
    /// attached.
    pub fn destroy_snapshot(
        &mut self,
        name: &str,
        backend: &dyn StorageBackend,
        mode: ExecMode,
    ) -> Result<Snapshot> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::SnapshotNotTracked(name.to_string()))?;
        self.snapshots[index].destroy(backend, mode)?;
        Ok(self.snapshots.remove(index))
    }

    /// Names of member snapshots selected by `expiry`.
    #[must_use]
    pub fn expired(&self, expiry: Expiry) -> Vec<String> {
        expiry
            .select(&self.snapshots)
            .into_iter()
            .map(Snapshot::name)
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.snapshots.iter().position(|s| s.name() == name)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{name}", self.volume),
            None => f.write_str(&self.volume),
        }
    }
}
