//! Domain layer for the cmsdev harness
//!
//! Models, port traits and the error taxonomy. Nothing in here talks to the
//! cluster or the filesystem directly.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ConfigurationError, DigestFormatError, DispatchError, ExecError, HarnessError, HarnessResult,
    LookupError, TransferError,
};
