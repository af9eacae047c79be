//! Library error type.
//!
//! The matching core only fails on bad input or bad configuration. Storage and
//! CLI layers wrap these with `anyhow` context.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input that is not valid text (non-UTF-8 bytes or paths).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
