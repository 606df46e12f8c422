//! Core ledger engine for shipledger.
//!
//! This crate owns the authoritative [`Ledger`]: the Lifecycle Engine that
//! validates and applies `create` and `transfer` against the shipment store,
//! the Query Interface over committed records, the injectable [`Clock`] used
//! for transfer timestamps, and the single-writer store lock.

pub mod clock;
pub mod concurrency;
pub mod ledger;
pub mod lifecycle;
pub mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use ledger::{Ledger, NewShipment, TransferReceipt, TransferRequest};
pub use lifecycle::{is_backward_move, validate_new_shipment};
pub use query::{ShipmentFilter, TransferHistory};

pub use shipledger_store::{
    Identity, IntegrityReport, Shipment, ShipmentId, ShipmentState, StoreError, Transfer,
    TransferId,
};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const UNITS_NOT_POSITIVE: &str = "units must be greater than 0";
pub const WEIGHT_NOT_POSITIVE: &str = "weight must be greater than 0";
pub const WEIGHT_NOT_FINITE: &str = "weight must be a finite number";
pub const SHIPMENT_NOT_FOUND: &str = "shipment does not exist";
pub const NOT_CURRENT_OWNER: &str = "only the current owner can perform this action";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Authorization(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    pub(crate) fn shipment_not_found() -> Self {
        CoreError::NotFound(SHIPMENT_NOT_FOUND.to_owned())
    }

    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Authorization(_) => ErrorKind::Authorization,
            CoreError::Store(_) => ErrorKind::Store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "AuthorizationError")]
    Authorization,
    #[serde(rename = "StoreError")]
    Store,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Authorization => "AuthorizationError",
            ErrorKind::Store => "StoreError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_display_fixed_message() {
        let e = CoreError::Validation(UNITS_NOT_POSITIVE.to_owned());
        assert_eq!(e.to_string(), "units must be greater than 0");
        assert_eq!(e.kind(), ErrorKind::Validation);

        let e = CoreError::shipment_not_found();
        assert_eq!(e.to_string(), "shipment does not exist");
        assert_eq!(e.kind(), ErrorKind::NotFound);

        let e = CoreError::Authorization(NOT_CURRENT_OWNER.to_owned());
        assert_eq!(
            e.to_string(),
            "only the current owner can perform this action"
        );
        assert_eq!(e.kind().as_str(), "AuthorizationError");
    }

    #[test]
    fn store_errors_map_to_store_kind() {
        let e = CoreError::from(StoreError::LockFailed("busy".to_owned()));
        assert_eq!(e.kind(), ErrorKind::Store);
        assert!(e.to_string().starts_with("store error:"));
    }

    #[test]
    fn error_kind_serializes_with_suffix() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"NotFoundError\"");
    }
}
