//! Small shared utilities

pub mod index_pool;

pub use index_pool::{IndexPool, IndexPoolError};
