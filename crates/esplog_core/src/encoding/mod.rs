//! Entropy coding: the Laplace variance model and the range coder it feeds.
pub mod laplace;
pub mod range_coder;
