pub mod completions;
pub mod create;
pub mod history;
pub mod list;
pub mod next_id;
pub mod show;
pub mod transfer;
pub mod verify;

use shipledger_core::{CoreError, ErrorKind, Identity, Ledger, ShipmentState};
use std::path::Path;
use thiserror::Error;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION: u8 = 2;
pub const EXIT_NOT_FOUND: u8 = 3;
pub const EXIT_AUTHORIZATION: u8 = 4;
pub const EXIT_STORE_ERROR: u8 = 5;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Ledger(#[from] CoreError),
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Ledger(e) => match e.kind() {
                ErrorKind::Validation => EXIT_VALIDATION,
                ErrorKind::NotFound => EXIT_NOT_FOUND,
                ErrorKind::Authorization => EXIT_AUTHORIZATION,
                ErrorKind::Store => EXIT_STORE_ERROR,
            },
            CliError::Usage(_) | CliError::Output(_) => EXIT_FAILURE,
        }
    }
}

pub fn open_ledger(store: &Path) -> Result<Ledger, CliError> {
    Ok(Ledger::open(store.to_path_buf())?)
}

/// The identity mutations are performed as.
pub fn require_identity(identity: Option<&str>) -> Result<Identity, CliError> {
    match identity {
        Some(id) if !id.is_empty() => Ok(Identity::from(id)),
        _ => Err(CliError::Usage(
            "no caller identity: pass --as <identity> or set SHIPLEDGER_IDENTITY".to_owned(),
        )),
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Output(format!("JSON serialization failed: {e}")))
}

pub fn colorize_state(state: ShipmentState) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        ShipmentState::Created => Style::new().yellow().apply_to(text).to_string(),
        ShipmentState::InTransit => Style::new().cyan().bold().apply_to(text).to_string(),
        ShipmentState::Stored => Style::new().blue().apply_to(text).to_string(),
        ShipmentState::Delivered => Style::new().green().apply_to(text).to_string(),
    }
}

/// Unix seconds as a UTC timestamp, or the raw number if out of range.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map_or_else(
            || secs.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}
