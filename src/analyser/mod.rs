//! The core of capture feature extraction.
//! Decode frames into fixed-width records, then derive per-destination timing and burst features.
pub mod burst;
pub mod containers;
pub mod core;
pub mod decoder;
pub mod error;
pub mod record;
pub mod temporal;
pub mod utils;
