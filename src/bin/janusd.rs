use clap::Parser;
use janus_gateway_core::cli::Args;
use janus_gateway_core::logging;
use janus_gateway_core::supervisor::{self, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();

    let supervisor = match Supervisor::bootstrap(&args) {
        Ok(supervisor) => supervisor,
        Err(err) => janus_gateway_core::fatal!("Failed to start: {:#}", err),
    };

    let (shutdown_tx, shutdown_rx) = supervisor::shutdown_channel();
    tokio::spawn(supervisor::wait_for_ctrl_c(shutdown_tx));

    supervisor.run(&args, shutdown_rx).await
}
