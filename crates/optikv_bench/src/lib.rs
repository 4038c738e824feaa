//! Shared helpers for the OptiKV benchmarks.

pub mod utils;
