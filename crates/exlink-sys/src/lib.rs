//! # exlink-sys
//!
//! Raw ABI mirror of the native exchange-connectivity engine
//! (`libopenlimits_sharp`). This crate contains no logic of its own:
//!
//! - **Wire types** (`types`) — `#[repr(C)]` records matching the engine's
//!   struct layout bit-for-bit, plus the result-tag constants
//! - **Entry points** (`ffi`) — `unsafe extern "C"` declarations for every
//!   engine call, including the callback-driven streaming surface
//!
//! All safety reasoning (string ownership, buffer clamping, tagged-result
//! decoding) lives in the `exlink` crate; nothing here should be called
//! without going through those wrappers.

pub mod ffi;
pub mod types;

pub use ffi::*;
pub use types::*;
