//! # Noosphere
//!
//! Command-line front end for the Noosphere graph store.
//!
//! The library half exposes configuration and command execution so they can
//! be driven from tests without spawning the binary.

pub mod cli;
pub mod config;
