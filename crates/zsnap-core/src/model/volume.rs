use super::{Group, Snapshot};
use crate::error::{Error, Result};
use crate::name::{GroupName, NameError, validate_volume_name};

/// A managed volume and its snapshot groups.
///
/// Groups are created on first access; the default (unnamed) group exists at
/// most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    name: String,
    groups: Vec<Group>,
}

impl Volume {
    /// # Errors
    ///
    /// Returns [`NameError::InvalidVolume`] for an empty name or one
    /// containing `@`.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_volume_name(&name)?;
        Ok(Self {
            name,
            groups: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Groups materialized so far.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: Option<&GroupName>) -> Option<&Group> {
        self.groups.iter().find(|group| group.name() == name)
    }

    /// The group called `name` (`None` for the default group), created empty
    /// when absent.
    pub fn group_mut(&mut self, name: Option<&GroupName>) -> &mut Group {
        let index = if let Some(index) = self.groups.iter().position(|g| g.name() == name) {
            index
        } else {
            self.groups.push(Group::new(self.name.clone(), name.cloned()));
            self.groups.len() - 1
        };
        &mut self.groups[index]
    }

    pub fn default_group(&mut self) -> &mut Group {
        self.group_mut(None)
    }

    /// Every snapshot of the volume across all groups.
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.groups.iter().flat_map(|group| group.snapshots().iter())
    }

    /// File a listed snapshot under its group. Returns `false` for a
    /// duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignSnapshot`] when the snapshot names another
    /// volume.
    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> Result<bool> {
        if snapshot.volume() != self.name {
            return Err(Error::ForeignSnapshot {
                snapshot: snapshot.name(),
                group: self.name.clone(),
            });
        }
        let group = snapshot.group().cloned();
        self.group_mut(group.as_ref()).add_snapshot(snapshot)
    }
}
