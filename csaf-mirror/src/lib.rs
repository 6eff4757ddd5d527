//! CLI crate for csaf-mirror.
//!
//! All sync policy, cache state and failure handling live in
//! `csaf-mirror-core`; this crate is argument parsing, output formatting and
//! command routing only.

pub mod cli;
