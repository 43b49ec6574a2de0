//! Entities a run works on: volumes own groups, groups own snapshots.
//!
//! The whole tree is rebuilt from backend listings on every run (see
//! [`inventory::Inventory::load`]) and discarded afterwards.

pub mod group;
pub mod inventory;
pub mod snapshot;
pub mod volume;

pub use group::Group;
pub use inventory::Inventory;
pub use snapshot::{Snapshot, SnapshotState};
pub use volume::Volume;

/// Whether side-effecting backend calls are actually made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecMode {
    #[default]
    Live,
    /// Log would-be creates and destroys, never call the backend for them.
    Simulate,
}

impl ExecMode {
    #[must_use]
    pub const fn from_simulate(simulate: bool) -> Self {
        if simulate { Self::Simulate } else { Self::Live }
    }

    #[must_use]
    pub const fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }
}

#[cfg(test)]
mod tests {
    use super::ExecMode;

    #[test]
    fn exec_mode_from_flag() {
        assert_eq!(ExecMode::from_simulate(true), ExecMode::Simulate);
        assert_eq!(ExecMode::from_simulate(false), ExecMode::Live);
        assert!(ExecMode::Simulate.is_simulate());
        assert!(!ExecMode::default().is_simulate());
    }
}
