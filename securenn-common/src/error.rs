use thiserror::Error;

/// An Error enum capturing the errors produced by this crate.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Config Error
    #[error("Invalid configuration: {0}")]
    Config(String),
}
