use super::{json_pretty, CliError, EXIT_STORE_ERROR, EXIT_SUCCESS};
use shipledger_core::CoreError;
use shipledger_store::{verify_store_integrity, StoreLayout};

/// Check the store on disk without opening the ledger, so a store that
/// fails to load can still be diagnosed.
pub fn run(layout: &StoreLayout, json: bool) -> Result<u8, CliError> {
    let report = verify_store_integrity(layout).map_err(CoreError::from)?;

    if json {
        let failures: Vec<_> = report
            .failed
            .iter()
            .map(|f| serde_json::json!({ "record": f.record, "reason": f.reason }))
            .collect();
        let payload = serde_json::json!({
            "shipments_checked": report.shipments_checked,
            "shipments_passed": report.shipments_passed,
            "transfers_checked": report.transfers_checked,
            "failed": failures,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "ledger integrity: {}/{} shipments passed, {} transfers checked",
            report.shipments_passed, report.shipments_checked, report.transfers_checked
        );
        for f in &report.failed {
            println!("  FAIL {}: {}", f.record, f.reason);
        }
    }

    if report.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_STORE_ERROR)
    }
}
