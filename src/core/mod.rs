//! Core Module - Pipeline building blocks
//!
//! Normalization, resume diffing, retry, row flattening and batched writes.
//! Nothing in here touches the network directly.

pub mod batch;
pub mod flatten;
pub mod normalize;
pub mod resume;
pub mod retry;

pub use batch::*;
pub use flatten::*;
pub use normalize::*;
pub use resume::*;
pub use retry::*;
