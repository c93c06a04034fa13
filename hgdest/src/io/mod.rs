//! Side-effecting operations: subprocesses, filesystem, configuration.

pub mod config;
pub mod credential;
pub mod hg;
pub mod hgrc;
pub mod manifest;
pub mod process;
pub mod reconcile;
pub mod registry;
pub mod repository;
pub mod snapshot;
