//! Block compression of orientation batches.
pub mod block;
