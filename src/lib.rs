//! Mirrors a local directory tree to a remote host over ssh, batching
//! filesystem events into ordered, retry-safe sync operations.

#![allow(clippy::enum_variant_names)]

pub mod application;
pub mod archive;
pub mod cli;
pub mod config;
pub mod ext;
pub mod filesystem;
pub mod modification;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod watcher;
