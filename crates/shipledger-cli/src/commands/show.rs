use super::{colorize_state, format_timestamp, json_pretty, CliError, EXIT_SUCCESS};
use shipledger_core::{Ledger, ShipmentId};

pub fn run(ledger: &Ledger, id: ShipmentId, json: bool) -> Result<u8, CliError> {
    let s = ledger.shipment(id)?;
    if json {
        println!("{}", json_pretty(s)?);
    } else {
        println!("id:            {}", s.id);
        println!("name:          {}", s.name);
        println!("description:   {}", s.description);
        println!("origin:        {}", s.origin);
        println!("destination:   {}", s.destination);
        println!("delivery_date: {}", s.delivery_date);
        println!("units:         {}", s.units);
        println!("weight:        {}", s.weight);
        println!("state:         {}", colorize_state(s.state));
        println!("owner:         {}", s.current_owner);
        println!("creator:       {}", s.creator);
        println!("created_at:    {}", format_timestamp(s.created_at));
        println!("transfers:     {}", s.transfer_count());
        if let Some(at) = s.delivered_at() {
            println!("delivered_at:  {}", format_timestamp(at));
        }
    }
    Ok(EXIT_SUCCESS)
}
