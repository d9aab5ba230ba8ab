//! Providers Module - External Data Sources

pub mod registry;

pub use registry::*;
