use super::{colorize_state, json_pretty, CliError, EXIT_SUCCESS};
use shipledger_core::{Identity, Ledger, Shipment, ShipmentFilter};

pub fn run(
    ledger: &Ledger,
    owner: Option<&str>,
    participant: Option<&str>,
    json: bool,
) -> Result<u8, CliError> {
    let filter = ShipmentFilter {
        owner: owner.map(Identity::from),
        participant: participant.map(Identity::from),
    };
    let shipments: Vec<&Shipment> = ledger.list_shipments(&filter);

    if json {
        println!("{}", json_pretty(&shipments)?);
    } else if shipments.is_empty() {
        println!("no shipments found");
    } else {
        println!(
            "{:<6} {:<20} {:<12} {:<16} {:<9} DESTINATION",
            "ID", "NAME", "STATE", "OWNER", "TRANSFERS"
        );
        for s in &shipments {
            println!(
                "{:<6} {:<20} {:<12} {:<16} {:<9} {}",
                s.id.get(),
                s.name,
                colorize_state(s.state),
                s.current_owner.as_str(),
                s.transfer_count(),
                s.destination
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
