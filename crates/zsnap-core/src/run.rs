//! One zsnap invocation: resolve volumes, create, then apply retention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::backend::StorageBackend;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ExecMode, Inventory};
use crate::name::GroupName;
use crate::retention::Retention;

/// What to do when a single create or destroy fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log, record the failure, and carry on with the remaining work.
    #[default]
    Continue,
    /// Stop the run at the first failure.
    Abort,
}

impl FailurePolicy {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure policy '{0}' (expected 'continue' or 'abort')")]
pub struct ParsePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Inputs of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Create one snapshot in each target group.
    pub create: bool,
    /// Target group; `None` selects the default group.
    pub group: Option<GroupName>,
    /// Target volumes; empty means every listed volume.
    pub volumes: Vec<String>,
    /// Destroy expired snapshots in each target group.
    pub retention: Option<Retention>,
    pub mode: ExecMode,
    pub on_error: FailurePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Destroy,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
        })
    }
}

/// A create or destroy that failed under [`FailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub action: Action,
    /// Group label for creates, snapshot name for destroys.
    pub target: String,
    pub code: String,
    pub message: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub simulated: bool,
    pub volumes: Vec<String>,
    pub created: Vec<String>,
    pub destroyed: Vec<String>,
    pub failures: Vec<Failure>,
}

impl RunReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives runs against a backend. The inventory is loaded on first use and
/// reused by later runs of the same runner.
pub struct Runner<'a> {
    backend: &'a dyn StorageBackend,
    clock: &'a dyn Clock,
    inventory: Option<Inventory>,
}

impl<'a> Runner<'a> {
    pub fn new(backend: &'a dyn StorageBackend, clock: &'a dyn Clock) -> Self {
        Self {
            backend,
            clock,
            inventory: None,
        }
    }

    /// The inventory, loading it from the backend when needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when a listing fails.
    pub fn inventory(&mut self) -> Result<&Inventory> {
        self.loaded().map(|inventory| &*inventory)
    }

    /// Execute one run.
    ///
    /// Argument and volume resolution errors are returned before any snapshot
    /// is created or destroyed. Snapshots are created in every target group
    /// before retention is applied to any of them. Per-snapshot failures
    /// follow [`RunOptions::on_error`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retention`] for invalid retention arguments,
    /// [`Error::Backend`] when a listing fails, [`Error::VolumeNotFound`] for
    /// an unknown target volume, and the first per-snapshot error under
    /// [`FailurePolicy::Abort`].
    pub fn run(&mut self, options: &RunOptions) -> Result<RunReport> {
        let backend = self.backend;
        let clock = self.clock;
        let mode = options.mode;
        let now = clock.now();

        let expiry = options
            .retention
            .map(|retention| retention.resolve(now))
            .transpose()?;

        let inventory = self.loaded()?;
        let names: Vec<String> = if options.volumes.is_empty() {
            inventory
                .volumes()
                .iter()
                .map(|volume| volume.name().to_string())
                .collect()
        } else {
            options.volumes.clone()
        };
        let mut volumes = inventory.select_mut(&names)?;
        debug!(volumes = volumes.len(), simulate = mode.is_simulate(), "run starting");

        let mut report = RunReport {
            simulated: mode.is_simulate(),
            volumes: volumes.iter().map(|v| v.name().to_string()).collect(),
            ..RunReport::default()
        };

        if options.create {
            for volume in &mut volumes {
                let group = volume.group_mut(options.group.as_ref());
                let label = group.to_string();
                match group.create_snapshot(backend, clock, mode) {
                    Ok(snapshot) => report.created.push(snapshot.name()),
                    Err(err) => record(&mut report, options.on_error, Action::Create, &label, err)?,
                }
            }
        }

        if let Some(expiry) = expiry {
            for volume in &mut volumes {
                let group = volume.group_mut(options.group.as_ref());
                let expired = group.expired(expiry);
                debug!(group = %group, expired = expired.len(), "retention applied");
                for name in expired {
                    match group.destroy_snapshot(&name, backend, mode) {
                        Ok(snapshot) => report.destroyed.push(snapshot.name()),
                        Err(err) => {
                            record(&mut report, options.on_error, Action::Destroy, &name, err)?;
                        }
                    }
                }
            }
        }

        info!(
            created = report.created.len(),
            destroyed = report.destroyed.len(),
            failures = report.failures.len(),
            "run finished"
        );
        Ok(report)
    }

    fn loaded(&mut self) -> Result<&mut Inventory> {
        let inventory = match self.inventory.take() {
            Some(inventory) => inventory,
            None => Inventory::load(self.backend)?,
        };
        Ok(self.inventory.insert(inventory))
    }
}

fn record(
    report: &mut RunReport,
    policy: FailurePolicy,
    action: Action,
    target: &str,
    err: Error,
) -> Result<()> {
    if policy == FailurePolicy::Abort {
        return Err(err);
    }
    error!(code = %err.code(), %action, subject = target, "{err}");
    report.failures.push(Failure {
        action,
        target: target.to_string(),
        code: err.code().code().to_string(),
        message: err.to_string(),
    });
    Ok(())
}
