#![doc = "light-sync-core: change detection and synchronisation of pages and rules with a Light server."]

//! This crate holds the collector, the sync engine and the optional sinks.
//! It knows nothing about HTTP, configuration files or the process exit code;
//! the `light-sync` binary crate wires those in.
//!
//! # Usage
//! [`collect::collect`] the artifacts of one kind, then hand them with a
//! [`remote::RemoteSink`] to [`synchronise::synchronise`]. The returned
//! [`synchronise::SyncReport`] feeds [`sql`] and [`docstore`].

pub mod artifact;
pub mod collect;
pub mod docstore;
pub mod error;
pub mod java;
pub mod remote;
pub mod sql;
pub mod synchronise;

pub use artifact::{Artifact, ArtifactKind, ChangeRecord, ChangeStatus};
pub use error::{CollectError, SinkError, SyncError};
pub use synchronise::{synchronise, SyncOptions, SyncReport};
