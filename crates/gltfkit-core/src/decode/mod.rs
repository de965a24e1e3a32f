//! Turning stored bytes into element data.

pub mod accessor;
pub mod cache;
pub mod filter;
pub mod meshopt;

pub use accessor::{normalize, AccessorData, ViewBytes};
pub use cache::DecodeCache;
