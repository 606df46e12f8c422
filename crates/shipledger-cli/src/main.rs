mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{open_ledger, CliError};
use shipledger_core::{
    install_signal_handler, Identity, NewShipment, ShipmentId, ShipmentState, TransferRequest,
};
use shipledger_store::StoreLayout;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shipledger",
    version,
    about = "Append-only custody ledger for shipments"
)]
struct Cli {
    /// Path to the ledger store directory.
    #[arg(long, default_value = "~/.local/share/shipledger")]
    store: String,

    /// Identity to act as for create and transfer.
    #[arg(long = "as", global = true, env = "SHIPLEDGER_IDENTITY")]
    identity: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record a new shipment owned by the caller.
    Create {
        /// Product name.
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// Expected delivery date, stored verbatim.
        #[arg(long)]
        delivery_date: String,
        /// Number of units; must be greater than 0.
        #[arg(long, allow_hyphen_values = true)]
        units: i64,
        /// Total weight; must be greater than 0.
        #[arg(long, allow_hyphen_values = true)]
        weight: f64,
    },
    /// Hand a shipment to a new owner. Only the current owner may do this.
    Transfer {
        /// Shipment ID.
        id: ShipmentId,
        /// Identity receiving custody.
        #[arg(long)]
        to: String,
        /// New state: created, in_transit, stored, delivered (or 0-3).
        #[arg(long)]
        state: ShipmentState,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Show a shipment.
    Show {
        /// Shipment ID.
        id: ShipmentId,
    },
    /// Show the transfer history of a shipment, oldest first.
    History {
        /// Shipment ID.
        id: ShipmentId,
    },
    /// List shipments.
    List {
        /// Only shipments currently owned by this identity.
        #[arg(long)]
        owner: Option<String>,
        /// Only shipments this identity has created or held.
        #[arg(long)]
        participant: Option<String>,
    },
    /// Show the ids the next create and transfer will receive.
    NextId,
    /// Verify ledger integrity on disk.
    Verify,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn run(cli: Cli) -> Result<u8, CliError> {
    let store_path = expand_tilde(&cli.store);
    let json = cli.json;
    let identity = cli.identity.as_deref();

    match cli.command {
        Commands::Create {
            name,
            description,
            origin,
            destination,
            delivery_date,
            units,
            weight,
        } => commands::create::run(
            &mut open_ledger(&store_path)?,
            NewShipment {
                name,
                description,
                origin,
                destination,
                delivery_date,
                units,
                weight,
            },
            identity,
            json,
        ),
        Commands::Transfer {
            id,
            to,
            state,
            location,
            notes,
        } => commands::transfer::run(
            &mut open_ledger(&store_path)?,
            TransferRequest {
                shipment_id: id,
                new_owner: Identity::from(to),
                new_state: state,
                location,
                notes,
            },
            identity,
            json,
        ),
        Commands::Show { id } => commands::show::run(&open_ledger(&store_path)?, id, json),
        Commands::History { id } => commands::history::run(&open_ledger(&store_path)?, id, json),
        Commands::List { owner, participant } => commands::list::run(
            &open_ledger(&store_path)?,
            owner.as_deref(),
            participant.as_deref(),
            json,
        ),
        Commands::NextId => commands::next_id::run(&open_ledger(&store_path)?, json),
        Commands::Verify => commands::verify::run(&StoreLayout::new(store_path), json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHIPLEDGER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
