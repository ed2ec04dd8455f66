//! `scanpost` -- scan QR codes from a camera and submit them to a persistence endpoint.

mod cli;
mod commands;
mod error;
mod logging;
mod metrics_server;
mod output;

use clap::Parser;

use scanpost_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Run(args) => {
            let config = commands::run::load_config(&cli.config, &args).await?;
            logging::init_tracing(&config.general, cli.log_level.as_deref())?;
            tracing::info!(config = %cli.config.display(), "scanpost starting");

            if config.metrics.enabled {
                metrics_server::install_metrics_recorder(&config.metrics)?;
            }

            commands::run::execute(&config, &writer).await
        }
        Commands::Config(args) => {
            // config 명령은 설정 파일의 [general] 대신 기본 로깅 설정을 사용
            let general = GeneralConfig {
                log_level: "warn".to_owned(),
                log_format: "pretty".to_owned(),
                ..GeneralConfig::default()
            };
            logging::init_tracing(&general, cli.log_level.as_deref())?;

            commands::config::execute(args, &cli.config, &writer).await
        }
    }
}
