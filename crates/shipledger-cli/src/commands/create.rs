use super::{json_pretty, require_identity, CliError, EXIT_SUCCESS};
use shipledger_core::{Ledger, NewShipment};

pub fn run(
    ledger: &mut Ledger,
    input: NewShipment,
    identity: Option<&str>,
    json: bool,
) -> Result<u8, CliError> {
    let caller = require_identity(identity)?;
    let id = ledger.create(input, &caller)?;
    let shipment = ledger.shipment(id)?;

    if json {
        let payload = serde_json::json!({
            "id": shipment.id,
            "current_owner": shipment.current_owner,
            "delivery_date": shipment.delivery_date,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("created shipment {id} owned by {}", shipment.current_owner);
    }
    Ok(EXIT_SUCCESS)
}
