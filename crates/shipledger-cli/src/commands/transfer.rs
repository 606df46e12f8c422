use super::{colorize_state, json_pretty, require_identity, CliError, EXIT_SUCCESS};
use shipledger_core::{Ledger, TransferRequest};

pub fn run(
    ledger: &mut Ledger,
    request: TransferRequest,
    identity: Option<&str>,
    json: bool,
) -> Result<u8, CliError> {
    let caller = require_identity(identity)?;
    let receipt = ledger.transfer(request, &caller)?;

    if json {
        println!("{}", json_pretty(&receipt)?);
    } else {
        println!(
            "transfer {}: shipment {} now {} with {}",
            receipt.transfer_id,
            receipt.shipment_id,
            colorize_state(receipt.new_state),
            receipt.new_owner
        );
    }
    Ok(EXIT_SUCCESS)
}
