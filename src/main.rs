use clap::Parser;
use kv_loadbench::cli::Cli;
use kv_loadbench::config::messages;
use kv_loadbench::controller::Controller;
use kv_loadbench::error::{ErrorContext, Result};
use kv_loadbench::store::MemcacheConnector;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.to_config()?;
    let connector = MemcacheConnector::new(config.protocol, config.io_timeout);
    let controller = Controller::new(config, connector)?;

    let report = controller.run()?;
    println!("{}", report);

    if let Some(path) = &cli.json {
        report
            .write_json(path)
            .with_context(messages::REPORT_WRITE_FAILED)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
