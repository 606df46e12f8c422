use super::{json_pretty, CliError, EXIT_SUCCESS};
use shipledger_core::Ledger;

pub fn run(ledger: &Ledger, json: bool) -> Result<u8, CliError> {
    let shipment = ledger.next_shipment_id();
    let transfer = ledger.next_transfer_id();
    if json {
        let payload = serde_json::json!({
            "next_shipment_id": shipment,
            "next_transfer_id": transfer,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("next shipment id: {shipment}");
        println!("next transfer id: {transfer}");
    }
    Ok(EXIT_SUCCESS)
}
