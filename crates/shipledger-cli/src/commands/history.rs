use super::{colorize_state, format_timestamp, json_pretty, CliError, EXIT_SUCCESS};
use shipledger_core::{Ledger, ShipmentId};

pub fn run(ledger: &Ledger, id: ShipmentId, json: bool) -> Result<u8, CliError> {
    let history = ledger.transfers(id)?;
    if json {
        println!("{}", json_pretty(&history.as_slice())?);
    } else if history.len() == 0 {
        println!("shipment {id} has no transfers");
    } else {
        println!(
            "{:<6} {:<24} {:<12} {:<16} {:<16} NOTES",
            "ID", "TIME", "STATE", "OWNER", "LOCATION"
        );
        for t in history {
            println!(
                "{:<6} {:<24} {:<12} {:<16} {:<16} {}",
                t.id.get(),
                format_timestamp(t.timestamp),
                colorize_state(t.new_state),
                t.new_owner.as_str(),
                t.location,
                t.transfer_notes
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
