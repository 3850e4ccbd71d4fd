//! Unified glucose.raw_event.v1 schema
//!
//! This module defines the input schema the host exports glucose readings and
//! meal/insulin log entries in, one record per line (NDJSON) or as a JSON array.

mod adapter;
mod raw_event;

pub use adapter::*;
pub use raw_event::*;
