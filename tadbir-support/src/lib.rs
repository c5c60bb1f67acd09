//! # Tadbir Support
//!
//! Shared utilities for the Tadbir DI framework.
//!
//! This crate provides:
//! - Text rendering for resolution diagnostics (cycle paths, short type
//!   names, "did you mean?" suggestions)

pub mod rendering;
