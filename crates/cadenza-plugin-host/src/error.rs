use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or managing plugin instances.
///
/// Nothing in this crate is fatal to the host process; every failure
/// degrades the single affected instance.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("plugin binary not found at {0}")]
    MissingBinary(PathBuf),
    #[error("failed to load plugin library {path}: {reason}")]
    LibraryOpen { path: PathBuf, reason: String },
    #[error("failed to load plugin library: {0}")]
    LibraryLoad(#[from] libloading::Error),
    #[error("symbol {symbol} not found in {path}")]
    MissingSymbol { path: PathBuf, symbol: String },
    #[error("invalid plugin state: {0}")]
    InvalidState(String),
}
