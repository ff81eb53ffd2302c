pub mod error;
pub mod execution;
pub mod network;
pub mod prelude;
pub mod protocol;
pub mod shares;

pub use error::Error;
