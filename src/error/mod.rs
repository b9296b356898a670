use thiserror::Error;

use crate::directory::DirectoryError;
use crate::notification::StoreError;
use crate::push::{GatewayError, RpcError};

/// Crate-level error for dispatch operations.
///
/// Only `InvalidTarget` and `ResolutionEmpty` abort a whole dispatch call;
/// per-recipient failures are collected into the report instead.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("target resolved to zero recipients")]
    ResolutionEmpty,

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("recipient lookup failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("primary channel failed: {0}")]
    PrimaryChannel(#[from] RpcError),

    #[error("push gateway degraded: {0}")]
    GatewayDegraded(#[from] GatewayError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DispatchError::InvalidTarget("explicit id list is empty".to_string());
        assert!(format!("{}", err).contains("invalid target"));

        let err = DispatchError::ResolutionEmpty;
        assert!(format!("{}", err).contains("zero recipients"));
    }
}
