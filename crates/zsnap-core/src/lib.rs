//! zsnap-core library.
//!
//! Snapshot lifecycle management for ZFS-style volumes: a name codec that
//! embeds creation time in snapshot names, a retention calculator, the
//! volume/group/snapshot entities, and a [`run::Runner`] that creates and
//! retires snapshots through a [`backend::StorageBackend`].
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`Result`] with [`Error`]; each
//!   variant maps to a stable [`ErrorCode`]. Config loading uses `anyhow`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).
//!   Creates and destroys log at `info`, skipped listing entries at `debug`.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod name;
pub mod retention;
pub mod run;

pub use error::{Error, ErrorCode, Result};
