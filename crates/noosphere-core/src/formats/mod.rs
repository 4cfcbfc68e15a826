//! # Persistence Formats
//!
//! The single-document JSON format written by the durable file backend.
//!
//! File I/O lives in the store backends; this module only converts between
//! bytes and the in-memory document.

mod document;

pub use document::*;
