//! # Configuration Module
//!
//! Centralizes the engine's fixed constants. The branching factor and the
//! on-disk framing sizes are part of the file format: files written by a
//! build with different values are not compatible, so none of these are
//! runtime knobs.
//!
//! Import constants from this module rather than redefining them locally:
//!
//! ```ignore
//! use crate::config::{NODE_CAPACITY, CACHE_CAPACITY};
//! ```

pub mod constants;

pub use constants::*;
