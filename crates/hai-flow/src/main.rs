//! hai-flow: terminal driver for the multi-step mint, bridge, stake and
//! auction flows.

mod cli;
mod contracts;
mod wizard;

use clap::Parser;
use hai_flow_adapters::FlowAdapterConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let command = cli::Args::parse().command;

    tracing::info!(?command, "starting hai-flow");

    let wizard = wizard::Wizard::from_config(FlowAdapterConfig::from_env())?;
    wizard.run(command).await
}
