use clap::Parser;
use shipledger_core::install_signal_handler;
use shipledger_server::{AppState, ServerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "shipledger-server", about = "JSON API over a shipledger ledger")]
struct Cli {
    /// TOML file with server settings; flags take precedence over it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind [default: 0.0.0.0].
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on [default: 3001].
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the ledger [default: ./shipledger-data].
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Require `Authorization: Bearer <token>` on every /api request.
    #[arg(long, env = "SHIPLEDGER_AUTH_TOKEN")]
    auth_token: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, shipledger_server::ServerError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(token) = self.auth_token {
            config.auth_token = Some(token);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    install_signal_handler();

    let addr = config.addr();
    info!("starting shipledger-server on {addr}");
    info!("data directory: {}", config.data_dir.display());
    if config.auth_token.is_none() {
        warn!("no auth token configured: {} is trusted as sent", shipledger_server::IDENTITY_HEADER);
    }

    let state = match AppState::open(&config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("failed to open ledger: {e}");
            return ExitCode::FAILURE;
        }
    };

    match shipledger_server::run_server(&state, &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shipledger-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "port = 8080\nauth_token = \"from-file\"\n").unwrap();

        let config = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9090",
            "--auth-token",
            "from-flag",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.auth_token.as_deref(), Some("from-flag"));
    }

    #[test]
    fn empty_token_flag_is_rejected() {
        let err = parse(&["--auth-token", ""]).into_config().unwrap_err();
        assert!(err.to_string().contains("auth_token must not be empty"));
    }
}
