mod backend;
mod cli;
mod controller;
mod location;
mod view;

use std::path::Path;

use roomchat_client::{ChatClient, MemoryDatabase};
use roomchat_common::RoomchatError;
use roomchat_config::{BackendKind, LogLevel, RoomchatConfig};
use roomchat_platform::LinkCopier;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backend::Backend;
use controller::{Controller, Exit};
use location::Location;
use view::TerminalView;

fn init_logging(level: LogLevel) {
    let default_directive = format!("roomchat={}", level.as_directive());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &cli::Args) -> Result<RoomchatConfig, RoomchatError> {
    let config = roomchat_config::load_config(args.config.as_deref().map(Path::new))?;
    roomchat_config::validation::validate(&config)?;
    Ok(config)
}

/// One iteration per location: a reload drops the store connection, the
/// identity and the session, then starts again at the new location.
async fn run(args: cli::Args, config: RoomchatConfig) -> Result<(), RoomchatError> {
    let offline = args.offline || config.backend.kind == BackendKind::Memory;
    let memory = MemoryDatabase::new();
    let mut location = Location::parse(args.url.as_deref().unwrap_or(&config.ui.base_url));
    let mut view = TerminalView::stdio();
    view.print_help();

    loop {
        let backend = Backend::start(&config, offline, &memory)?;
        let client = ChatClient::new(backend.store(), backend.identity(), &mut rand::thread_rng());
        let controller = Controller::new(
            client,
            &mut view,
            LinkCopier::detect(),
            location.clone(),
            &config.ui,
        );
        let exit = controller.run().await;
        backend.shutdown().await;

        match exit {
            Exit::Quit => return Ok(()),
            Exit::Reload(next) => {
                info!(location = %next, "Reloading");
                location = next;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("roomchat: {e}");
            std::process::exit(1);
        }
    };
    init_logging(config.logging.level);
    info!(offline = args.offline, "roomchat starting");

    if let Err(e) = run(args, config).await {
        error!(error = %e, "roomchat exited with an error");
        eprintln!("roomchat: {e}");
        std::process::exit(1);
    }
}
