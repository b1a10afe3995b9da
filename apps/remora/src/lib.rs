//! # Remora
//!
//! The Remora host library: registry client, site configuration, the
//! component kit, the HTTP host and the CLI.
//!
//! The runtime itself (registry state, compiler, loader, scope graph) lives
//! in `remora-core`; this crate adds everything that touches the network or
//! the process environment.

pub mod api;
pub mod cli;
pub mod config;
pub mod kit;
pub mod pages;
pub mod registry_client;
