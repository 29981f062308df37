use thiserror::Error;

/// Errors returned by table operations.
///
/// Every error is raised before the table is mutated, so a failed call
/// leaves contents, `size` and `capacity` exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("node with key {0:?} already exists; use update to change its value")]
    DuplicateKey(String),
    #[error("no node with key {0:?} exists in the table")]
    KeyNotFound(String),
    #[error("capacity must be greater than 0 (got {0})")]
    InvalidCapacity(usize),
}

pub type Result<T> = core::result::Result<T, StoreError>;
