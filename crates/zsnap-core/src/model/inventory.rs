//! Per-run view of the backend: every volume and every zsnap snapshot.

use tracing::debug;

use super::{Snapshot, Volume};
use crate::backend::{StorageBackend, record_name};
use crate::error::{Error, Result};

/// Volumes and their decoded snapshots, loaded once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    volumes: Vec<Volume>,
}

impl Inventory {
    /// Query both backend listings and build the inventory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when either listing fails.
    pub fn load(backend: &dyn StorageBackend) -> Result<Self> {
        let volumes = backend.list_volumes()?;
        let snapshots = backend.list_snapshots()?;
        let inventory = Self::from_listings(&volumes, &snapshots);
        debug!(
            volumes = inventory.volumes.len(),
            snapshots = inventory.snapshot_count(),
            "inventory loaded"
        );
        Ok(inventory)
    }

    /// Build an inventory from raw listing lines.
    ///
    /// Snapshot names that do not decode, or whose volume is not listed, are
    /// skipped.
    pub fn from_listings<V, S>(volume_lines: &[V], snapshot_lines: &[S]) -> Self
    where
        V: AsRef<str>,
        S: AsRef<str>,
    {
        let mut inventory = Self::default();

        for line in volume_lines {
            let name = record_name(line.as_ref());
            if name.is_empty() || inventory.get(name).is_some() {
                continue;
            }
            match Volume::new(name) {
                Ok(volume) => inventory.volumes.push(volume),
                Err(err) => debug!(volume = name, %err, "skipping volume"),
            }
        }

        for line in snapshot_lines {
            let name = record_name(line.as_ref());
            let snapshot = match Snapshot::from_name(name) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    debug!(snapshot = name, %err, "skipping snapshot");
                    continue;
                }
            };
            let Some(volume) = inventory.get_mut(snapshot.volume()) else {
                debug!(snapshot = name, "skipping snapshot of unknown volume");
                continue;
            };
            if let Err(err) = volume.add_snapshot(snapshot) {
                debug!(snapshot = name, %err, "skipping snapshot");
            }
        }

        inventory
    }

    #[must_use]
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|volume| volume.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Volume> {
        self.volumes.iter_mut().find(|volume| volume.name() == name)
    }

    /// Volumes named in `names`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeNotFound`] for the first unknown name; no
    /// partial result is returned.
    pub fn find_by_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Volume>> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| Error::VolumeNotFound(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Mutable counterpart of [`Inventory::find_by_names`]. A volume named
    /// twice is returned once, at its first position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeNotFound`] for the first unknown name.
    pub fn select_mut<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<&mut Volume>> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let index = self
                .volumes
                .iter()
                .position(|volume| volume.name() == name)
                .ok_or_else(|| Error::VolumeNotFound(name.to_string()))?;
            if !indices.contains(&index) {
                indices.push(index);
            }
        }

        let mut slots: Vec<Option<&mut Volume>> = self.volumes.iter_mut().map(Some).collect();
        Ok(indices
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect())
    }

    fn snapshot_count(&self) -> usize {
        self.volumes.iter().map(|volume| volume.snapshots().count()).sum()
    }
}
