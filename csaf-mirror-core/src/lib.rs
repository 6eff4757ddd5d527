#![doc = "csaf-mirror-core: core synchronisation engine for csaf-mirror."]

//! This crate contains all the state, policy and failure-handling logic for
//! mirroring remotely published CSAF advisory directories into a local cache:
//! the transport contract, metadata store, change log parser, fetch
//! strategies, sync orchestrator and dataset catalog.
//!
//! The CLI crate is glue only; add new behaviour as submodules below.

pub mod catalog;
pub mod changelog;
pub mod config;
pub mod discovery;
pub mod download;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod sync;
