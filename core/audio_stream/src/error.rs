use thiserror::Error;

/// Errors reported by stream pool edits. A failed edit leaves the pool untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PoolError {
    #[error("pool index {index} out of range (count is {count})")]
    OutOfRange { index: usize, count: usize },

    #[error("invalid pool weight {0}, weights must be finite and non-negative")]
    InvalidWeight(f32),
}
