//! In-memory backend for tests and dry reasoning about runs.

use std::cell::RefCell;
use std::collections::HashSet;

use super::{BackendError, StorageBackend, record_name};

/// A side-effecting call received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Destroy(String),
}

/// [`StorageBackend`] holding volumes and snapshots in memory.
///
/// Every create/destroy attempt is recorded, including failed ones. Names
/// registered with [`MemoryBackend::failing_on`] fail both operations.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    volumes: Vec<String>,
    snapshots: RefCell<Vec<String>>,
    calls: RefCell<Vec<Call>>,
    failing: HashSet<String>,
    failing_listings: bool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_volumes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volumes.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_snapshots<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snapshots
            .borrow_mut()
            .extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn failing_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    #[must_use]
    pub fn failing_listings(mut self) -> Self {
        self.failing_listings = true;
        self
    }

    /// All create/destroy attempts so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Snapshot names currently present.
    #[must_use]
    pub fn snapshot_names(&self) -> Vec<String> {
        self.snapshots
            .borrow()
            .iter()
            .map(|line| record_name(line).to_string())
            .collect()
    }

    fn check(&self, command: &str, name: &str) -> Result<(), BackendError> {
        if self.failing.contains(name) {
            return Err(BackendError::new(
                format!("zfs {command} {name}"),
                format!("cannot {command} '{name}': simulated failure"),
            ));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn list_volumes(&self) -> Result<Vec<String>, BackendError> {
        if self.failing_listings {
            return Err(BackendError::new("zfs list -Hp", "simulated failure"));
        }
        Ok(self.volumes.clone())
    }

    fn list_snapshots(&self) -> Result<Vec<String>, BackendError> {
        if self.failing_listings {
            return Err(BackendError::new("zfs list -Hpt snapshot", "simulated failure"));
        }
        Ok(self.snapshots.borrow().clone())
    }

    fn create_snapshot(&self, name: &str) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(Call::Create(name.to_string()));
        self.check("snapshot", name)?;
        self.snapshots.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn destroy_snapshot(&self, name: &str) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(Call::Destroy(name.to_string()));
        self.check("destroy", name)?;
        let mut snapshots = self.snapshots.borrow_mut();
        let before = snapshots.len();
        snapshots.retain(|line| record_name(line) != name);
        if snapshots.len() == before {
            return Err(BackendError::new(
                format!("zfs destroy {name}"),
                "could not find any snapshots to destroy; check snapshot names.",
            ));
        }
        Ok(())
    }
}
